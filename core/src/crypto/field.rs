//! Field elements and curve scalars
//!
//! Two distinct integer domains are in play and they are kept as distinct types:
//!
//! - [`FieldElement`]: the BN254 scalar field `Fr` (modulus `p`). Every Poseidon
//!   input and output, every Merkle node and every Grumpkin coordinate lives here.
//! - [`Scalar`]: integers modulo the Grumpkin group order `q` (the BN254 base
//!   field). Private keys and stealth tweaks live here.
//!
//! `q > p`, so every field element embeds into the scalars exactly, while the
//! reverse direction can wrap. That direction is only available through the
//! explicitly named [`Scalar::to_field_reduced`].
//!
//! External bytes never become a field element silently: use the strict
//! parsers (`from_be_bytes`, `from_hex`) which reject values `>= p`, or the
//! explicit `reduce_be_bytes` when wraparound is the intended semantics.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use ark_bn254::{Fq, Fr};
use ark_ff::{BigInteger, Field, PrimeField, Zero};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::error::{Result, ShieldError};

/// Width of a canonical big-endian field element or scalar encoding
pub const FIELD_BYTES: usize = 32;

/// BN254 scalar field modulus `p`, big-endian
/// = 21888242871839275222246405745257275088548364400416034343698204186575808495617
pub const FIELD_MODULUS_BE: [u8; FIELD_BYTES] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29,
    0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91,
    0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// Grumpkin group order `q` (BN254 base field modulus), big-endian
/// = 21888242871839275222246405745257275088696311157297823662689037894645226208583
pub const SCALAR_MODULUS_BE: [u8; FIELD_BYTES] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29,
    0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x97, 0x81, 0x6a, 0x91, 0x68, 0x71, 0xca, 0x8d,
    0x3c, 0x20, 0x8c, 0x16, 0xd8, 0x7c, 0xfd, 0x47,
];

/// Serialize a prime field value as exactly 32 big-endian bytes
fn to_be_array<F: PrimeField>(value: &F) -> [u8; FIELD_BYTES] {
    let repr = value.into_bigint().to_bytes_be();
    debug_assert!(repr.len() <= FIELD_BYTES, "field repr wider than 32 bytes");
    let mut out = [0u8; FIELD_BYTES];
    out[FIELD_BYTES - repr.len()..].copy_from_slice(&repr);
    out
}

fn parse_hex_32(input: &str) -> Option<[u8; FIELD_BYTES]> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    if digits.is_empty() || digits.len() > 2 * FIELD_BYTES {
        return None;
    }
    // Left-pad so short hex like "0x1" is accepted
    let padded = format!("{:0>64}", digits);
    let mut out = [0u8; FIELD_BYTES];
    hex::decode_to_slice(padded, &mut out).ok()?;
    Some(out)
}

// ============================================================================
// Field Element
// ============================================================================

/// A canonical element of the BN254 scalar field (always `< p`)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(pub(crate) Fr);

impl FieldElement {
    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    /// Uniformly random non-zero field element
    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        loop {
            let mut wide = [0u8; 64];
            rng.fill_bytes(&mut wide);
            let value = Fr::from_le_bytes_mod_order(&wide);
            wide.zeroize();
            if !value.is_zero() {
                return Self(value);
            }
        }
    }

    /// Strict parse: rejects any value `>= p`
    pub fn from_be_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
        if bytes.as_slice() >= FIELD_MODULUS_BE.as_slice() {
            return Err(ShieldError::InvalidFieldElement {
                value: format!("0x{}", hex::encode(bytes)),
            });
        }
        Ok(Self(Fr::from_be_bytes_mod_order(bytes)))
    }

    /// Strict parse from a slice that must be exactly 32 bytes long
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; FIELD_BYTES] = bytes.try_into().map_err(|_| {
            ShieldError::InvalidFieldElement {
                value: format!("{} bytes (expected {})", bytes.len(), FIELD_BYTES),
            }
        })?;
        Self::from_be_bytes(&array)
    }

    /// Explicit reduction of arbitrary big-endian bytes modulo `p`
    pub fn reduce_be_bytes(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Strict parse of a (optionally `0x`-prefixed) big-endian hex string
    pub fn from_hex(input: &str) -> Result<Self> {
        let bytes = parse_hex_32(input).ok_or_else(|| ShieldError::InvalidFieldElement {
            value: input.to_string(),
        })?;
        Self::from_be_bytes(&bytes)
    }

    pub fn to_be_bytes(&self) -> [u8; FIELD_BYTES] {
        to_be_array(&self.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiplicative inverse, `None` for zero
    pub fn inverse(&self) -> Option<Self> {
        self.0.inverse().map(Self)
    }

    pub fn square(&self) -> Self {
        Self(self.0.square())
    }

    /// Square root if one exists
    pub fn sqrt(&self) -> Option<Self> {
        self.0.sqrt().map(Self)
    }

    /// Parity of the canonical integer representative
    pub fn is_odd(&self) -> bool {
        self.0.into_bigint().is_odd()
    }

    pub(crate) fn inner(&self) -> Fr {
        self.0
    }
}

impl Zeroize for FieldElement {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl From<Fr> for FieldElement {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Add for FieldElement {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for FieldElement {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul for FieldElement {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl Neg for FieldElement {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_hex())
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Scalar
// ============================================================================

/// An integer modulo the Grumpkin group order `q`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scalar(pub(crate) Fq);

impl Scalar {
    pub fn zero() -> Self {
        Self(Fq::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Fq::from(value))
    }

    /// Uniformly random non-zero scalar
    ///
    /// Draws 64 bytes and reduces, so the bias from the modular reduction
    /// is negligible.
    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        loop {
            let mut wide = [0u8; 64];
            rng.fill_bytes(&mut wide);
            let scalar = Fq::from_le_bytes_mod_order(&wide);
            wide.zeroize();
            if !scalar.is_zero() {
                return Self(scalar);
            }
        }
    }

    /// Strict parse: rejects any value `>= q`
    pub fn from_be_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
        if bytes.as_slice() >= SCALAR_MODULUS_BE.as_slice() {
            return Err(ShieldError::InvalidFieldElement {
                value: format!("scalar 0x{} is not below the group order", hex::encode(bytes)),
            });
        }
        Ok(Self(Fq::from_be_bytes_mod_order(bytes)))
    }

    /// Explicit reduction of arbitrary big-endian bytes modulo `q`
    pub fn reduce_be_bytes(bytes: &[u8]) -> Self {
        Self(Fq::from_be_bytes_mod_order(bytes))
    }

    pub fn from_hex(input: &str) -> Result<Self> {
        let bytes = parse_hex_32(input).ok_or_else(|| ShieldError::InvalidFieldElement {
            value: input.to_string(),
        })?;
        Self::from_be_bytes(&bytes)
    }

    /// Exact embedding of a field element (`p < q`, so nothing wraps)
    pub fn from_field(value: &FieldElement) -> Self {
        Self(Fq::from_be_bytes_mod_order(&value.to_be_bytes()))
    }

    /// Convert to a field element, reducing modulo `p`
    ///
    /// Values in `[p, q)` wrap. This is the conversion used when a private key
    /// enters a Poseidon input.
    pub fn to_field_reduced(&self) -> FieldElement {
        FieldElement::reduce_be_bytes(&self.to_be_bytes())
    }

    pub fn to_be_bytes(&self) -> [u8; FIELD_BYTES] {
        to_be_array(&self.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Scalar {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", self.to_hex())
    }
}
