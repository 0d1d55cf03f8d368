//! Stealth announcement records
//!
//! When a sender makes a stealth payment they publish the ephemeral public
//! key together with the leaf commitment. Recipients scan these records to
//! detect payments addressed to them.
//!
//! Records travel through the announcement feed (an indexer over the ledger's
//! payment events), not as raw ledger accounts. Wire form: a one-byte format
//! version followed by the borsh encoding of [`AnnouncementRecord`]. The
//! parsed, validated form is [`StealthAnnouncement`].

use borsh::{BorshDeserialize, BorshSerialize};

use crate::crypto::curve::{Point, COMPRESSED_POINT_BYTES};
use crate::crypto::field::{FieldElement, FIELD_BYTES};
use crate::error::{Result, ShieldError};

/// Format version prefixed to every encoded record
pub const ANNOUNCEMENT_RECORD_VERSION: u8 = 1;

/// Upper bound on the encrypted payload carried by one announcement
pub const MAX_ENCRYPTED_PAYLOAD: usize = 1024;

/// Wire body of an announcement, exactly as encoded after the version byte
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct AnnouncementRecord {
    /// Ephemeral public key, compressed
    pub ephemeral_pub: [u8; COMPRESSED_POINT_BYTES],

    /// Base-asset amount, public on the base chain
    pub amount: u64,

    /// Set for yield-position commitments `H(x, principal, epoch)`
    pub epoch: Option<u64>,

    /// Leaf commitment, big-endian
    pub commitment: [u8; FIELD_BYTES],

    /// Position of the commitment in the accumulator
    pub leaf_index: u64,

    /// Unix timestamp
    pub created_at: i64,

    /// Opaque payload for the recipient (e.g. an encrypted memo)
    pub encrypted_payload: Vec<u8>,
}

impl AnnouncementRecord {
    /// Decode a feed entry including the version byte
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (&version, body) = data
            .split_first()
            .ok_or_else(|| ShieldError::malformed_announcement("empty record"))?;

        if version != ANNOUNCEMENT_RECORD_VERSION {
            return Err(ShieldError::malformed_announcement(format!(
                "record version {}, expected {}",
                version, ANNOUNCEMENT_RECORD_VERSION
            )));
        }

        let record = Self::try_from_slice(body)
            .map_err(|e| ShieldError::malformed_announcement(e.to_string()))?;

        if record.encrypted_payload.len() > MAX_ENCRYPTED_PAYLOAD {
            return Err(ShieldError::malformed_announcement(format!(
                "payload of {} bytes exceeds {}",
                record.encrypted_payload.len(),
                MAX_ENCRYPTED_PAYLOAD
            )));
        }

        Ok(record)
    }

    /// Encode with the version prefix
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![ANNOUNCEMENT_RECORD_VERSION];
        // Writing into a Vec cannot fail
        if let Ok(body) = self.try_to_vec() {
            data.extend_from_slice(&body);
        }
        data
    }
}

/// Validated announcement: on-curve ephemeral key, canonical commitment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StealthAnnouncement {
    pub ephemeral_pub: Point,
    pub amount: u64,
    pub epoch: Option<u64>,
    pub commitment: FieldElement,
    pub leaf_index: u64,
    pub created_at: i64,
    pub encrypted_payload: Vec<u8>,
}

impl StealthAnnouncement {
    /// Parse and validate an encoded feed entry
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::try_from(AnnouncementRecord::decode(data)?)
    }

    pub fn to_record(&self) -> AnnouncementRecord {
        AnnouncementRecord {
            ephemeral_pub: self.ephemeral_pub.encode_compressed(),
            amount: self.amount,
            epoch: self.epoch,
            commitment: self.commitment.to_be_bytes(),
            leaf_index: self.leaf_index,
            created_at: self.created_at,
            encrypted_payload: self.encrypted_payload.clone(),
        }
    }
}

impl TryFrom<AnnouncementRecord> for StealthAnnouncement {
    type Error = ShieldError;

    fn try_from(record: AnnouncementRecord) -> Result<Self> {
        let ephemeral_pub = Point::decode_compressed(&record.ephemeral_pub)
            .map_err(|e| ShieldError::malformed_announcement(format!("ephemeral key: {}", e)))?;
        ephemeral_pub
            .validate_public_key()
            .map_err(|e| ShieldError::malformed_announcement(format!("ephemeral key: {}", e)))?;

        let commitment = FieldElement::from_be_bytes(&record.commitment)
            .map_err(|e| ShieldError::malformed_announcement(format!("commitment: {}", e)))?;

        Ok(Self {
            ephemeral_pub,
            amount: record.amount,
            epoch: record.epoch,
            commitment,
            leaf_index: record.leaf_index,
            created_at: record.created_at,
            encrypted_payload: record.encrypted_payload,
        })
    }
}
