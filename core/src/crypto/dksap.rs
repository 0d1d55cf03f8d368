//! DKSAP - Dual-Key Stealth Address Protocol
//!
//! ## Protocol Overview
//!
//! ### Recipient Setup
//! 1. Generate view key pair: (v, V) where V = v·G
//! 2. Generate spend key pair: (b, B) where B = b·G
//! 3. Publish meta-address: (B, V)
//!
//! ### Sender Flow
//! 1. Generate ephemeral key pair: (r, R) where R = r·G
//! 2. Compute shared secret: ss = r·V
//! 3. Derive stealth scalar: s = SHA256(enc(ss) || tag) mod q
//! 4. Derive stealth pubkey: P = B + s·G
//! 5. Leaf commitment: H(P.x, amount) or H(P.x, principal, epoch)
//! 6. Publish R next to the commitment
//!
//! ### Recipient Scanning
//! 1. For each announcement with ephemeral key R: ss = v·R (same as sender)
//! 2. Recompute P' = B + s·G and the commitment; compare in constant time
//!
//! ### Claim
//! stealthPriv = b + s mod q, nullifier = H(stealthPriv, leafIndex)

use std::sync::Arc;

use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{trace, warn};
use zeroize::Zeroize;

use crate::crypto::curve::Point;
use crate::crypto::field::{FieldElement, Scalar};
use crate::crypto::keys::{MetaAddress, SecretScalar, StealthKeys, ViewingKey};
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};
use crate::state::announcement::StealthAnnouncement;

/// Domain tag separating the stealth scalar from any other use of the shared secret
pub const STEALTH_DOMAIN_TAG: &[u8] = b"shielded-core/stealth-scalar/v1";

/// `SHA256(encode_compressed(ss) || tag) mod q`
pub fn derive_stealth_scalar(shared_secret: &Point, domain_tag: &[u8]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(shared_secret.encode_compressed());
    hasher.update(domain_tag);
    let mut digest: [u8; 32] = hasher.finalize().into();
    let scalar = Scalar::reduce_be_bytes(&digest);
    digest.zeroize();
    scalar
}

/// Keys able to recognise incoming payments
pub trait ScanKey {
    fn view_secret(&self) -> Scalar;
    fn spend_pub(&self) -> Point;
}

impl ScanKey for StealthKeys {
    fn view_secret(&self) -> Scalar {
        StealthKeys::view_secret(self)
    }

    fn spend_pub(&self) -> Point {
        self.spend_pub
    }
}

impl ScanKey for ViewingKey {
    fn view_secret(&self) -> Scalar {
        ViewingKey::view_secret(self)
    }

    fn spend_pub(&self) -> Point {
        self.spend_pub
    }
}

// ============================================================================
// Protocol handle
// ============================================================================

/// Stealth protocol bound to one hash engine and domain tag
#[derive(Clone, Debug)]
pub struct StealthProtocol {
    engine: Arc<HashEngine>,
    domain_tag: Vec<u8>,
}

impl StealthProtocol {
    pub fn new(engine: Arc<HashEngine>) -> Self {
        Self::with_domain_tag(engine, STEALTH_DOMAIN_TAG)
    }

    pub fn with_domain_tag(engine: Arc<HashEngine>, domain_tag: &[u8]) -> Self {
        Self { engine, domain_tag: domain_tag.to_vec() }
    }

    pub fn engine(&self) -> &HashEngine {
        &self.engine
    }

    fn leaf_commitment(&self, stealth_pub: &Point, amount: u64, epoch: Option<u64>) -> Result<FieldElement> {
        let x = stealth_pub
            .x()
            .ok_or_else(|| ShieldError::invalid_point("stealth public key is the point at infinity"))?;
        Ok(match epoch {
            Some(epoch) => self.engine.pool_commitment(&x, amount, epoch),
            None => self.engine.commitment(&x, amount),
        })
    }

    /// `(s, B + s·G)` for a given shared secret
    fn stealth_point(&self, shared_secret: &Point, spend_pub: &Point) -> Result<(Scalar, Point)> {
        if shared_secret.is_infinity() {
            return Err(ShieldError::invalid_point("shared secret is the point at infinity"));
        }
        let s = derive_stealth_scalar(shared_secret, &self.domain_tag);
        let stealth_pub = spend_pub.add(&Point::mul_generator(&s));
        if stealth_pub.is_infinity() {
            return Err(ShieldError::invalid_point("derived stealth key is the point at infinity"));
        }
        Ok((s, stealth_pub))
    }

    // ========================================================================
    // Sender side
    // ========================================================================

    /// Compute a stealth output with a fresh ephemeral key from OS entropy
    pub fn send(&self, recipient: &MetaAddress, amount: u64, epoch: Option<u64>) -> Result<StealthOutput> {
        let ephemeral = SecretScalar::random(&mut OsRng);
        self.send_with_ephemeral(recipient, amount, epoch, ephemeral)
    }

    /// Deterministic sender entry point with a caller-chosen ephemeral secret
    ///
    /// The secret is consumed and zeroized before returning.
    pub fn send_with_ephemeral(
        &self,
        recipient: &MetaAddress,
        amount: u64,
        epoch: Option<u64>,
        ephemeral_secret: SecretScalar,
    ) -> Result<StealthOutput> {
        recipient.spend_pub.validate_public_key()?;
        recipient.view_pub.validate_public_key()?;

        let r = ephemeral_secret.to_scalar();
        if r.is_zero() {
            return Err(ShieldError::invalid_point("ephemeral secret must be non-zero"));
        }
        let ephemeral_pub = Point::mul_generator(&r);

        let shared_secret = recipient.view_pub.mul(&r);
        let (_, stealth_pub) = self.stealth_point(&shared_secret, &recipient.spend_pub)?;
        let commitment = self.leaf_commitment(&stealth_pub, amount, epoch)?;

        Ok(StealthOutput {
            ephemeral_pub,
            stealth_pub,
            commitment,
            amount,
            epoch,
        })
    }

    // ========================================================================
    // Recipient side
    // ========================================================================

    /// Check a single announcement against a scan key
    ///
    /// Returns the recomputed stealth public key on a match.
    pub fn check_announcement<K: ScanKey + ?Sized>(
        &self,
        keys: &K,
        announcement: &StealthAnnouncement,
    ) -> Result<Option<Point>> {
        announcement.ephemeral_pub.validate_public_key()?;

        let shared_secret = announcement.ephemeral_pub.mul(&keys.view_secret());
        let (_, stealth_pub) = self.stealth_point(&shared_secret, &keys.spend_pub())?;
        let expected = self.leaf_commitment(&stealth_pub, announcement.amount, announcement.epoch)?;

        let matches = expected
            .to_be_bytes()
            .ct_eq(&announcement.commitment.to_be_bytes());
        Ok(bool::from(matches).then_some(stealth_pub))
    }

    /// Lazily scan raw announcement records in order
    ///
    /// Malformed entries are logged and skipped. The iterator is finite and
    /// restartable whenever the input iterator is `Clone`.
    pub fn scan<'a, K, I>(&'a self, keys: &'a K, records: I) -> Scanner<'a, K, I::IntoIter>
    where
        K: ScanKey + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        Scanner {
            protocol: self,
            keys,
            records: records.into_iter(),
            position: 0,
        }
    }

    /// Derive the spending material for an owned announcement
    pub fn prepare_claim(&self, keys: &StealthKeys, announcement: &StealthAnnouncement) -> Result<StealthClaim> {
        announcement.ephemeral_pub.validate_public_key()?;

        let shared_secret = announcement.ephemeral_pub.mul(&keys.view_secret());
        let (s, stealth_pub) = self.stealth_point(&shared_secret, &keys.spend_pub)?;

        let expected = self.leaf_commitment(&stealth_pub, announcement.amount, announcement.epoch)?;
        if !bool::from(expected.to_be_bytes().ct_eq(&announcement.commitment.to_be_bytes())) {
            return Err(ShieldError::StealthKeyMismatch);
        }

        let stealth_priv = keys.spend_secret() + s;
        if Point::mul_generator(&stealth_priv) != stealth_pub {
            return Err(ShieldError::StealthKeyMismatch);
        }

        let private_field = stealth_priv.to_field_reduced();
        let nullifier = self.engine.nullifier(&private_field, announcement.leaf_index);
        let nullifier_hash = self.engine.nullifier_hash(&nullifier);

        Ok(StealthClaim {
            stealth_priv: SecretScalar::from_scalar(&stealth_priv),
            stealth_pub,
            commitment: announcement.commitment,
            amount: announcement.amount,
            epoch: announcement.epoch,
            leaf_index: announcement.leaf_index,
            nullifier,
            nullifier_hash,
        })
    }
}

/// Result of computing a stealth output (sender side)
///
/// Public material only; the ephemeral secret never leaves `send`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StealthOutput {
    /// Ephemeral public key to publish
    pub ephemeral_pub: Point,
    /// One-time destination key
    pub stealth_pub: Point,
    /// Leaf to insert into the accumulator
    pub commitment: FieldElement,
    pub amount: u64,
    pub epoch: Option<u64>,
}

impl StealthOutput {
    /// Unsigned announcement body for this output at a given leaf index
    pub fn announcement(&self, leaf_index: u64, created_at: i64, encrypted_payload: Vec<u8>) -> StealthAnnouncement {
        StealthAnnouncement {
            ephemeral_pub: self.ephemeral_pub,
            amount: self.amount,
            epoch: self.epoch,
            commitment: self.commitment,
            leaf_index,
            created_at,
            encrypted_payload,
        }
    }
}

/// A scanned announcement that belongs to the scanning key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StealthMatch {
    /// Index of the record in the scanned input
    pub position: usize,
    pub announcement: StealthAnnouncement,
    pub stealth_pub: Point,
}

/// Spending material for one owned position
pub struct StealthClaim {
    stealth_priv: SecretScalar,
    pub stealth_pub: Point,
    pub commitment: FieldElement,
    pub amount: u64,
    pub epoch: Option<u64>,
    pub leaf_index: u64,
    pub nullifier: FieldElement,
    pub nullifier_hash: FieldElement,
}

impl StealthClaim {
    /// Stealth private key `b + s mod q`
    pub fn stealth_secret(&self) -> &SecretScalar {
        &self.stealth_priv
    }

    /// The private key as it enters the proof circuit (reduced into the field)
    pub fn private_field(&self) -> FieldElement {
        self.stealth_priv.to_scalar().to_field_reduced()
    }
}

impl std::fmt::Debug for StealthClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthClaim")
            .field("stealth_pub", &self.stealth_pub)
            .field("leaf_index", &self.leaf_index)
            .field("nullifier_hash", &self.nullifier_hash)
            .finish_non_exhaustive()
    }
}

/// Lazy linear scan over raw announcement records
pub struct Scanner<'a, K: ?Sized, I> {
    protocol: &'a StealthProtocol,
    keys: &'a K,
    records: I,
    position: usize,
}

impl<'a, K: ?Sized, I: Clone> Clone for Scanner<'a, K, I> {
    fn clone(&self) -> Self {
        Self {
            protocol: self.protocol,
            keys: self.keys,
            records: self.records.clone(),
            position: self.position,
        }
    }
}

impl<'a, K, I> Iterator for Scanner<'a, K, I>
where
    K: ScanKey + ?Sized,
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    type Item = StealthMatch;

    fn next(&mut self) -> Option<StealthMatch> {
        for record in self.records.by_ref() {
            let position = self.position;
            self.position += 1;

            let announcement = match StealthAnnouncement::parse(record.as_ref()) {
                Ok(a) => a,
                Err(e) => {
                    warn!(position, error = %e, "skipping malformed announcement");
                    continue;
                }
            };

            match self.protocol.check_announcement(self.keys, &announcement) {
                Ok(Some(stealth_pub)) => {
                    trace!(position, leaf_index = announcement.leaf_index, "announcement matched");
                    return Some(StealthMatch { position, announcement, stealth_pub });
                }
                Ok(None) => trace!(position, "announcement not ours"),
                Err(e) => warn!(position, error = %e, "skipping announcement"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol() -> StealthProtocol {
        StealthProtocol::new(Arc::new(HashEngine::new().unwrap()))
    }

    #[test]
    fn test_ecdh_symmetry() {
        let a = Scalar::from_u64(0x1234_5678);
        let b = Scalar::from_u64(0x9abc_def0);
        let a_pub = Point::mul_generator(&a);
        let b_pub = Point::mul_generator(&b);
        assert_eq!(b_pub.mul(&a), a_pub.mul(&b));
    }

    #[test]
    fn test_stealth_roundtrip() {
        let protocol = protocol();
        let keys = StealthKeys::generate();
        let output = protocol.send(&keys.meta_address(), 100_000, None).unwrap();

        let announcement = output.announcement(0, 0, vec![]);
        let found = protocol.check_announcement(&keys, &announcement).unwrap();
        assert_eq!(found, Some(output.stealth_pub));

        let claim = protocol.prepare_claim(&keys, &announcement).unwrap();
        assert_eq!(claim.stealth_pub, output.stealth_pub);
        assert_eq!(Point::mul_generator(&claim.stealth_secret().to_scalar()), output.stealth_pub);
    }

    #[test]
    fn test_view_key_detects_payment() {
        let protocol = protocol();
        let keys = StealthKeys::generate();
        let viewer = keys.viewing_key();
        let output = protocol.send(&keys.meta_address(), 5, Some(9)).unwrap();
        let announcement = output.announcement(1, 0, vec![]);

        assert!(protocol.check_announcement(&viewer, &announcement).unwrap().is_some());
    }

    #[test]
    fn test_other_recipient_does_not_match() {
        let protocol = protocol();
        let alice = StealthKeys::generate();
        let bob = StealthKeys::generate();
        let output = protocol.send(&alice.meta_address(), 7, None).unwrap();
        let announcement = output.announcement(0, 0, vec![]);

        assert_eq!(protocol.check_announcement(&bob, &announcement).unwrap(), None);
        assert!(matches!(
            protocol.prepare_claim(&bob, &announcement),
            Err(ShieldError::StealthKeyMismatch)
        ));
    }

    #[test]
    fn test_amount_and_epoch_bound_into_commitment() {
        let protocol = protocol();
        let keys = StealthKeys::generate();
        let output = protocol.send(&keys.meta_address(), 50, Some(3)).unwrap();

        let mut announcement = output.announcement(0, 0, vec![]);
        announcement.amount = 51;
        assert_eq!(protocol.check_announcement(&keys, &announcement).unwrap(), None);

        announcement.amount = 50;
        announcement.epoch = Some(4);
        assert_eq!(protocol.check_announcement(&keys, &announcement).unwrap(), None);

        announcement.epoch = Some(3);
        assert!(protocol.check_announcement(&keys, &announcement).unwrap().is_some());
    }

    #[test]
    fn test_domain_tag_changes_derivation() {
        let engine = Arc::new(HashEngine::new().unwrap());
        let a = StealthProtocol::new(Arc::clone(&engine));
        let b = StealthProtocol::with_domain_tag(engine, b"other-tag");
        let keys = StealthKeys::from_seed(b"tag test").unwrap();
        let eph = Scalar::from_u64(31337);

        let out_a = a
            .send_with_ephemeral(&keys.meta_address(), 1, None, SecretScalar::from_scalar(&eph))
            .unwrap();
        let out_b = b
            .send_with_ephemeral(&keys.meta_address(), 1, None, SecretScalar::from_scalar(&eph))
            .unwrap();
        assert_eq!(out_a.ephemeral_pub, out_b.ephemeral_pub);
        assert_ne!(out_a.stealth_pub, out_b.stealth_pub);
    }

    #[test]
    fn test_zero_ephemeral_rejected() {
        let protocol = protocol();
        let keys = StealthKeys::generate();
        let result = protocol.send_with_ephemeral(
            &keys.meta_address(),
            1,
            None,
            SecretScalar::from_scalar(&Scalar::zero()),
        );
        assert!(matches!(result, Err(ShieldError::InvalidPoint { .. })));
    }

    #[test]
    fn test_output_holds_public_material_only() {
        let protocol = protocol();
        let keys = StealthKeys::from_seed(b"fixed recipient").unwrap();
        let secret_bytes = [7u8; 32];

        let first = protocol
            .send_with_ephemeral(&keys.meta_address(), 42, None, SecretScalar::from_be_bytes(&secret_bytes).unwrap())
            .unwrap();
        let second = protocol
            .send_with_ephemeral(&keys.meta_address(), 42, None, SecretScalar::from_be_bytes(&secret_bytes).unwrap())
            .unwrap();
        assert_eq!(first, second.clone());
        assert_eq!(first.ephemeral_pub, Point::mul_generator(&Scalar::from_be_bytes(&secret_bytes).unwrap()));
        assert!(!format!("{:?}", first).contains(&hex::encode(secret_bytes)));
    }

    #[test]
    fn test_scanner_skips_malformed_and_reports_positions() {
        let protocol = protocol();
        let keys = StealthKeys::generate();
        let stranger = StealthKeys::generate();

        let mine = protocol.send(&keys.meta_address(), 10, None).unwrap();
        let theirs = protocol.send(&stranger.meta_address(), 20, None).unwrap();
        let mine_again = protocol.send(&keys.meta_address(), 30, None).unwrap();

        let records: Vec<Vec<u8>> = vec![
            mine.announcement(0, 0, vec![]).to_record().encode(),
            vec![0x08, 0xde, 0xad],
            theirs.announcement(1, 0, vec![]).to_record().encode(),
            mine_again.announcement(2, 0, vec![]).to_record().encode(),
        ];

        let scanner = protocol.scan(&keys, records.iter());
        let found: Vec<StealthMatch> = scanner.clone().collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].position, 0);
        assert_eq!(found[0].announcement.amount, 10);
        assert_eq!(found[1].position, 3);
        assert_eq!(found[1].stealth_pub, mine_again.stealth_pub);

        // Restartable from the clone
        assert_eq!(scanner.count(), 2);
    }

    #[test]
    fn test_nullifier_bound_to_leaf_index() {
        let protocol = protocol();
        let keys = StealthKeys::generate();
        let output = protocol.send(&keys.meta_address(), 1_000, None).unwrap();

        let first = protocol.prepare_claim(&keys, &output.announcement(4, 0, vec![])).unwrap();
        let second = protocol.prepare_claim(&keys, &output.announcement(5, 0, vec![])).unwrap();
        assert_ne!(first.nullifier, second.nullifier);
        assert_ne!(first.nullifier_hash, second.nullifier_hash);
        assert_eq!(first.nullifier_hash, protocol.engine().nullifier_hash(&first.nullifier));
        assert_eq!(
            first.nullifier,
            protocol.engine().nullifier(&first.private_field(), 4)
        );
    }
}
