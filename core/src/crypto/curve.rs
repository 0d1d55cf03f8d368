//! Grumpkin curve arithmetic
//!
//! Grumpkin is the short Weierstrass curve `y² = x³ − 17` over the BN254
//! scalar field. Its group order is the BN254 base field modulus, so
//! coordinates are [`FieldElement`]s and multipliers are [`Scalar`]s.
//!
//! The group law comes from `ark-ec` through [`GrumpkinConfig`]. The public
//! API works on affine [`Point`]s; arithmetic runs in projective coordinates
//! and normalizes once per operation.

use std::fmt;

use ark_bn254::{Fq, Fr};
use ark_ec::models::{short_weierstrass::SWCurveConfig, CurveConfig};
use ark_ec::short_weierstrass::{Affine, Projective};
use ark_ec::{AffineRepr, CurveGroup, Group};
use ark_ff::{Field, MontFp, Zero};

use crate::crypto::field::{FieldElement, Scalar, FIELD_BYTES};
use crate::error::{Result, ShieldError};

/// Length of a compressed point encoding: 1 prefix byte + 32-byte x
pub const COMPRESSED_POINT_BYTES: usize = 1 + FIELD_BYTES;

/// Generator x-coordinate
pub const GENERATOR_X: Fr = Fr::ONE;

/// Generator y-coordinate, `sqrt(-16)`
pub const GENERATOR_Y: Fr = MontFp!("17631683881184975370165255887551781615748388533673675138860");

const PREFIX_EVEN: u8 = 0x02;
const PREFIX_ODD: u8 = 0x03;

/// Grumpkin parameters: base field BN254 `Fr`, scalar field BN254 `Fq`
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GrumpkinConfig;

pub type GrumpkinAffine = Affine<GrumpkinConfig>;
pub type GrumpkinProjective = Projective<GrumpkinConfig>;

impl CurveConfig for GrumpkinConfig {
    type BaseField = Fr;
    type ScalarField = Fq;

    /// Prime order, cofactor 1
    const COFACTOR: &'static [u64] = &[0x1];
    const COFACTOR_INV: Fq = Fq::ONE;
}

impl SWCurveConfig for GrumpkinConfig {
    const COEFF_A: Fr = Fr::ZERO;
    const COEFF_B: Fr = MontFp!("-17");
    const GENERATOR: GrumpkinAffine = GrumpkinAffine::new_unchecked(GENERATOR_X, GENERATOR_Y);

    #[inline(always)]
    fn mul_by_a(_: Self::BaseField) -> Self::BaseField {
        Self::BaseField::zero()
    }
}

/// A point on Grumpkin, or the point at infinity
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point(pub(crate) GrumpkinAffine);

impl Point {
    /// The fixed generator `G`
    pub fn generator() -> Self {
        Point(GrumpkinConfig::GENERATOR)
    }

    pub fn infinity() -> Self {
        Point(GrumpkinAffine::identity())
    }

    /// Build a point from coordinates, rejecting anything off the curve
    pub fn from_affine(x: FieldElement, y: FieldElement) -> Result<Self> {
        let point = GrumpkinAffine::new_unchecked(x.inner(), y.inner());
        if !point.is_on_curve() {
            return Err(ShieldError::invalid_point(format!(
                "({}, {}) does not satisfy y^2 = x^3 - 17",
                x, y
            )));
        }
        Ok(Point(point))
    }

    pub fn is_infinity(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_on_curve(&self) -> bool {
        self.0.is_on_curve()
    }

    /// The x-coordinate, `None` at infinity
    pub fn x(&self) -> Option<FieldElement> {
        self.0.xy().map(|(x, _)| FieldElement(*x))
    }

    pub fn y(&self) -> Option<FieldElement> {
        self.0.xy().map(|(_, y)| FieldElement(*y))
    }

    /// Reject infinity and off-curve points before they enter key derivation
    pub fn validate_public_key(&self) -> Result<()> {
        if self.is_infinity() {
            return Err(ShieldError::invalid_point("point at infinity is not a valid public key"));
        }
        if !self.is_on_curve() {
            return Err(ShieldError::invalid_point("public key is not on the curve"));
        }
        Ok(())
    }

    pub fn negate(&self) -> Self {
        Point(-self.0)
    }

    pub fn double(&self) -> Self {
        Self::from_group(self.0.into_group().double())
    }

    pub fn add(&self, other: &Point) -> Self {
        Self::from_group(self.0 + other.0)
    }

    /// `k · self`
    pub fn mul(&self, k: &Scalar) -> Self {
        Self::from_group(self.0 * k.0)
    }

    /// `k · G`, the only way a private scalar becomes a public point
    pub fn mul_generator(k: &Scalar) -> Self {
        Self::from_group(GrumpkinConfig::GENERATOR * k.0)
    }

    fn from_group(point: GrumpkinProjective) -> Self {
        Point(point.into_affine())
    }

    /// 33-byte compressed encoding
    ///
    /// `0x02`/`0x03` for even/odd canonical `y`, then big-endian `x`.
    /// Infinity encodes as 33 zero bytes.
    pub fn encode_compressed(&self) -> [u8; COMPRESSED_POINT_BYTES] {
        let mut out = [0u8; COMPRESSED_POINT_BYTES];
        if let (Some(x), Some(y)) = (self.x(), self.y()) {
            out[0] = if y.is_odd() { PREFIX_ODD } else { PREFIX_EVEN };
            out[1..].copy_from_slice(&x.to_be_bytes());
        }
        out
    }

    /// Decode a compressed point, failing with `InvalidPoint` on any defect
    pub fn decode_compressed(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMPRESSED_POINT_BYTES {
            return Err(ShieldError::invalid_point(format!(
                "compressed point must be {} bytes, got {}",
                COMPRESSED_POINT_BYTES,
                bytes.len()
            )));
        }

        let prefix = bytes[0];
        if prefix == 0x00 {
            if bytes[1..].iter().all(|&b| b == 0) {
                return Ok(Point::infinity());
            }
            return Err(ShieldError::invalid_point("non-zero payload with infinity prefix"));
        }
        if prefix != PREFIX_EVEN && prefix != PREFIX_ODD {
            return Err(ShieldError::invalid_point(format!("unknown prefix 0x{:02x}", prefix)));
        }

        let x = FieldElement::from_be_slice(&bytes[1..])
            .map_err(|_| ShieldError::invalid_point("x-coordinate is not a canonical field element"))?;

        let (smaller, larger) = GrumpkinAffine::get_ys_from_x_unchecked(x.inner())
            .ok_or_else(|| ShieldError::invalid_point(format!("no curve point with x = {}", x)))?;
        let want_odd = prefix == PREFIX_ODD;
        let y = if FieldElement(smaller).is_odd() == want_odd { smaller } else { larger };

        Point::from_affine(x, FieldElement(y))
    }
}

impl Default for Point {
    fn default() -> Self {
        Point::infinity()
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.x(), self.y()) {
            (Some(x), Some(y)) => write!(f, "Point({}, {})", x, y),
            _ => f.write_str("Point::Infinity"),
        }
    }
}
