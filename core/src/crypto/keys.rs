//! Stealth key material
//!
//! Security:
//! - Secret scalars are zeroized on drop
//! - `StealthKeys` does not implement `Clone`
//! - Public keys are validated on-curve and non-infinity on every import

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::curve::{Point, COMPRESSED_POINT_BYTES};
use crate::crypto::field::{Scalar, FIELD_BYTES};
use crate::error::{Result, ShieldError};

/// Prefix of the human-readable meta-address form
pub const META_ADDRESS_PREFIX: &str = "stealth:";

/// Raw meta-address length: spendPub (33) || viewPub (33)
pub const META_ADDRESS_BYTES: usize = 2 * COMPRESSED_POINT_BYTES;

const SEED_VIEW_LABEL: &[u8] = b"shielded/view";
const SEED_SPEND_LABEL: &[u8] = b"shielded/spend";

// ============================================================================
// Zeroizing Scalar Wrapper
// ============================================================================

/// A private scalar that wipes its bytes on drop
pub struct SecretScalar {
    bytes: [u8; FIELD_BYTES],
}

impl SecretScalar {
    pub fn from_scalar(scalar: &Scalar) -> Self {
        Self { bytes: scalar.to_be_bytes() }
    }

    /// Strict parse; values `>= q` are rejected
    pub fn from_be_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
        let scalar = Scalar::from_be_bytes(bytes)?;
        Ok(Self::from_scalar(&scalar))
    }

    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        Self::from_scalar(&Scalar::random(rng))
    }

    pub fn to_scalar(&self) -> Scalar {
        Scalar::reduce_be_bytes(&self.bytes)
    }

    /// `secret · G`
    pub fn public_point(&self) -> Point {
        Point::mul_generator(&self.to_scalar())
    }

    /// Raw big-endian bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.bytes
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}

// ============================================================================
// Stealth Keys
// ============================================================================

/// Complete recipient key set: viewing and spending secrets
pub struct StealthKeys {
    view_secret: SecretScalar,
    spend_secret: SecretScalar,
    /// `view_secret · G`
    pub view_pub: Point,
    /// `spend_secret · G`
    pub spend_pub: Point,
}

// Deliberately not Clone

impl StealthKeys {
    /// Fresh keys from OS entropy
    pub fn generate() -> Self {
        let mut rng = OsRng;
        Self::from_secret_scalars(SecretScalar::random(&mut rng), SecretScalar::random(&mut rng))
    }

    /// Deterministic keys from seed material
    ///
    /// view = SHA256("shielded/view" || seed) mod q,
    /// spend = SHA256("shielded/spend" || seed) mod q
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let view = seed_scalar(SEED_VIEW_LABEL, seed);
        let spend = seed_scalar(SEED_SPEND_LABEL, seed);
        if view.is_zero() || spend.is_zero() {
            return Err(ShieldError::invalid_point("seed derives a zero secret"));
        }
        Ok(Self::from_secret_scalars(
            SecretScalar::from_scalar(&view),
            SecretScalar::from_scalar(&spend),
        ))
    }

    /// Rebuild from stored secrets
    pub fn from_secrets(view_secret: &[u8; FIELD_BYTES], spend_secret: &[u8; FIELD_BYTES]) -> Result<Self> {
        let view = SecretScalar::from_be_bytes(view_secret)?;
        let spend = SecretScalar::from_be_bytes(spend_secret)?;
        if view.to_scalar().is_zero() || spend.to_scalar().is_zero() {
            return Err(ShieldError::invalid_point("zero secret has no valid public key"));
        }
        Ok(Self::from_secret_scalars(view, spend))
    }

    fn from_secret_scalars(view_secret: SecretScalar, spend_secret: SecretScalar) -> Self {
        let view_pub = view_secret.public_point();
        let spend_pub = spend_secret.public_point();
        Self { view_secret, spend_secret, view_pub, spend_pub }
    }

    pub fn meta_address(&self) -> MetaAddress {
        MetaAddress { spend_pub: self.spend_pub, view_pub: self.view_pub }
    }

    /// Scan-only export: can detect payments but never claim them
    pub fn viewing_key(&self) -> ViewingKey {
        ViewingKey {
            view_secret: SecretScalar::from_scalar(&self.view_secret.to_scalar()),
            spend_pub: self.spend_pub,
        }
    }

    /// Export secrets as (view, spend) bytes for encrypted storage
    ///
    /// WARNING: Handle these bytes with extreme care!
    pub fn export_secrets(&self) -> ([u8; FIELD_BYTES], [u8; FIELD_BYTES]) {
        (*self.view_secret.as_bytes(), *self.spend_secret.as_bytes())
    }

    pub(crate) fn view_secret(&self) -> Scalar {
        self.view_secret.to_scalar()
    }

    pub(crate) fn spend_secret(&self) -> Scalar {
        self.spend_secret.to_scalar()
    }
}

impl fmt::Debug for StealthKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StealthKeys")
            .field("view_pub", &self.view_pub)
            .field("spend_pub", &self.spend_pub)
            .finish_non_exhaustive()
    }
}

/// View secret plus spend public key
pub struct ViewingKey {
    view_secret: SecretScalar,
    pub spend_pub: Point,
}

impl ViewingKey {
    pub fn new(view_secret: SecretScalar, spend_pub: Point) -> Result<Self> {
        spend_pub.validate_public_key()?;
        Ok(Self { view_secret, spend_pub })
    }

    pub fn view_pub(&self) -> Point {
        self.view_secret.public_point()
    }

    pub(crate) fn view_secret(&self) -> Scalar {
        self.view_secret.to_scalar()
    }
}

impl fmt::Debug for ViewingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewingKey")
            .field("spend_pub", &self.spend_pub)
            .finish_non_exhaustive()
    }
}

fn seed_scalar(label: &[u8], seed: &[u8]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update(seed);
    let mut digest: [u8; 32] = hasher.finalize().into();
    let scalar = Scalar::reduce_be_bytes(&digest);
    digest.zeroize();
    scalar
}

// ============================================================================
// Meta-Address
// ============================================================================

/// Public recipient identifier `{spendPub, viewPub}`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MetaAddress {
    pub spend_pub: Point,
    pub view_pub: Point,
}

impl MetaAddress {
    pub fn new(spend_pub: Point, view_pub: Point) -> Result<Self> {
        spend_pub.validate_public_key()?;
        view_pub.validate_public_key()?;
        Ok(Self { spend_pub, view_pub })
    }

    pub fn to_bytes(&self) -> [u8; META_ADDRESS_BYTES] {
        let mut out = [0u8; META_ADDRESS_BYTES];
        out[..COMPRESSED_POINT_BYTES].copy_from_slice(&self.spend_pub.encode_compressed());
        out[COMPRESSED_POINT_BYTES..].copy_from_slice(&self.view_pub.encode_compressed());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != META_ADDRESS_BYTES {
            return Err(ShieldError::InvalidMetaAddress {
                reason: format!("expected {} bytes, got {}", META_ADDRESS_BYTES, bytes.len()),
            });
        }
        let spend_pub = Point::decode_compressed(&bytes[..COMPRESSED_POINT_BYTES])?;
        let view_pub = Point::decode_compressed(&bytes[COMPRESSED_POINT_BYTES..])?;
        Self::new(spend_pub, view_pub)
    }

    /// `stealth:<base58(spendPub || viewPub)>`
    pub fn encode(&self) -> String {
        format!("{}{}", META_ADDRESS_PREFIX, bs58::encode(self.to_bytes()).into_string())
    }

    /// Parse the display form; the `stealth:` prefix is optional
    pub fn parse(input: &str) -> Result<Self> {
        let encoded = input.strip_prefix(META_ADDRESS_PREFIX).unwrap_or(input);
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ShieldError::InvalidMetaAddress { reason: e.to_string() })?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for MetaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let keys = StealthKeys::generate();
        assert!(keys.view_pub.validate_public_key().is_ok());
        assert!(keys.spend_pub.validate_public_key().is_ok());
        assert_ne!(keys.view_pub, keys.spend_pub);

        let (view, spend) = keys.export_secrets();
        let rebuilt = StealthKeys::from_secrets(&view, &spend).unwrap();
        assert_eq!(rebuilt.view_pub, keys.view_pub);
        assert_eq!(rebuilt.spend_pub, keys.spend_pub);
    }

    #[test]
    fn test_seed_derivation_deterministic() {
        let a = StealthKeys::from_seed(b"correct horse battery staple").unwrap();
        let b = StealthKeys::from_seed(b"correct horse battery staple").unwrap();
        let c = StealthKeys::from_seed(b"another seed").unwrap();
        assert_eq!(a.meta_address(), b.meta_address());
        assert_ne!(a.view_pub, c.view_pub);
        assert_ne!(a.view_pub, a.spend_pub);
    }

    #[test]
    fn test_from_secrets_rejects_bad_scalars() {
        let zero = [0u8; 32];
        let one = Scalar::from_u64(1).to_be_bytes();
        assert!(StealthKeys::from_secrets(&zero, &one).is_err());
        assert!(StealthKeys::from_secrets(&one, &[0xff; 32]).is_err());
    }

    #[test]
    fn test_viewing_key_matches() {
        let keys = StealthKeys::generate();
        let vk = keys.viewing_key();
        assert_eq!(vk.view_pub(), keys.view_pub);
        assert_eq!(vk.spend_pub, keys.spend_pub);
        assert!(ViewingKey::new(SecretScalar::from_scalar(&Scalar::from_u64(3)), Point::infinity()).is_err());
    }

    #[test]
    fn test_meta_address_roundtrip() {
        let keys = StealthKeys::generate();
        let meta = keys.meta_address();
        let encoded = meta.encode();
        assert!(encoded.starts_with(META_ADDRESS_PREFIX));
        assert_eq!(MetaAddress::parse(&encoded).unwrap(), meta);

        // Prefix is optional on input
        let bare = encoded.strip_prefix(META_ADDRESS_PREFIX).unwrap();
        assert_eq!(MetaAddress::parse(bare).unwrap(), meta);
    }

    #[test]
    fn test_meta_address_rejects_malformed() {
        assert!(matches!(
            MetaAddress::parse("stealth:0OIl"),
            Err(ShieldError::InvalidMetaAddress { .. })
        ));

        let short = bs58::encode([2u8; 65]).into_string();
        assert!(matches!(
            MetaAddress::parse(&short),
            Err(ShieldError::InvalidMetaAddress { .. })
        ));

        // Infinity is not a valid recipient key
        let mut raw = StealthKeys::generate().meta_address().to_bytes();
        raw[..COMPRESSED_POINT_BYTES].fill(0);
        assert!(matches!(
            MetaAddress::from_bytes(&raw),
            Err(ShieldError::InvalidPoint { .. })
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let keys = StealthKeys::from_seed(b"debug").unwrap();
        let (view, _) = keys.export_secrets();
        let rendered = format!("{:?}", keys);
        assert!(!rendered.contains(&hex::encode(view)));
    }
}
