//! Shielded notes
//!
//! A note is a secret `{amount, privateScalar, auxSecret}` whose public
//! commitment `H((privateScalar·G).x, amount)` sits in the accumulator.
//! Once the ledger assigns a leaf index the note becomes spendable and its
//! nullifier `H(privateScalar, leafIndex)` can be derived.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::curve::Point;
use crate::crypto::field::{FieldElement, Scalar, FIELD_BYTES};
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};

/// Current `NoteSecrets` encoding version
pub const NOTE_VERSION: u8 = 1;

const FLAG_LEAF_INDEX: u8 = 0b001;
const FLAG_COMMITMENT: u8 = 0b010;
const FLAG_NULLIFIER_HASH: u8 = 0b100;

/// A note owned by this client
pub struct Note {
    amount: u64,
    private_scalar: FieldElement,
    aux_secret: FieldElement,
    commitment: FieldElement,
    leaf_index: Option<u64>,
}

impl Note {
    /// Fresh note with random secrets from OS entropy
    pub fn random(engine: &HashEngine, amount: u64) -> Self {
        let mut rng = OsRng;
        let private_scalar = FieldElement::random(&mut rng);
        let aux_secret = FieldElement::random(&mut rng);
        Self::build(engine, amount, private_scalar, aux_secret)
    }

    pub fn from_parts(
        engine: &HashEngine,
        amount: u64,
        private_scalar: FieldElement,
        aux_secret: FieldElement,
    ) -> Result<Self> {
        if private_scalar.is_zero() {
            return Err(ShieldError::malformed_note("private scalar must be non-zero"));
        }
        Ok(Self::build(engine, amount, private_scalar, aux_secret))
    }

    fn build(engine: &HashEngine, amount: u64, private_scalar: FieldElement, aux_secret: FieldElement) -> Self {
        let commitment = match Self::derive_public_key(&private_scalar).x() {
            Some(x) => engine.commitment(&x, amount),
            // Non-zero scalars below the group order never map to infinity
            None => FieldElement::zero(),
        };
        Self { amount, private_scalar, aux_secret, commitment, leaf_index: None }
    }

    fn derive_public_key(private_scalar: &FieldElement) -> Point {
        Point::mul_generator(&Scalar::from_field(private_scalar))
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn private_scalar(&self) -> &FieldElement {
        &self.private_scalar
    }

    pub fn aux_secret(&self) -> &FieldElement {
        &self.aux_secret
    }

    /// `privateScalar · G`
    pub fn public_key(&self) -> Point {
        Self::derive_public_key(&self.private_scalar)
    }

    pub fn commitment(&self) -> FieldElement {
        self.commitment
    }

    pub fn leaf_index(&self) -> Option<u64> {
        self.leaf_index
    }

    /// Record the position the ledger accepted the commitment at
    pub fn assign_leaf_index(&mut self, leaf_index: u64) {
        self.leaf_index = Some(leaf_index);
    }

    fn require_leaf_index(&self) -> Result<u64> {
        self.leaf_index.ok_or(ShieldError::LeafIndexUnassigned)
    }

    pub fn nullifier(&self, engine: &HashEngine) -> Result<FieldElement> {
        Ok(engine.nullifier(&self.private_scalar, self.require_leaf_index()?))
    }

    pub fn nullifier_hash(&self, engine: &HashEngine) -> Result<FieldElement> {
        Ok(engine.nullifier_hash(&self.nullifier(engine)?))
    }

    /// Exportable form, including derived public values
    pub fn to_secrets(&self, engine: &HashEngine) -> NoteSecrets {
        NoteSecrets {
            version: NOTE_VERSION,
            amount: self.amount,
            private_scalar: self.private_scalar,
            aux_secret: self.aux_secret,
            leaf_index: self.leaf_index,
            commitment: Some(self.commitment),
            nullifier_hash: self.nullifier_hash(engine).ok(),
        }
    }

    /// Rebuild a note, checking any stored derived values
    pub fn from_secrets(engine: &HashEngine, secrets: &NoteSecrets) -> Result<Self> {
        let mut note = Self::from_parts(engine, secrets.amount, secrets.private_scalar, secrets.aux_secret)?;
        note.leaf_index = secrets.leaf_index;

        if let Some(stored) = secrets.commitment {
            if stored != note.commitment {
                return Err(ShieldError::malformed_note("stored commitment does not match secrets"));
            }
        }
        if let Some(stored) = secrets.nullifier_hash {
            let derived = note
                .nullifier_hash(engine)
                .map_err(|_| ShieldError::malformed_note("nullifier hash stored without a leaf index"))?;
            if stored != derived {
                return Err(ShieldError::malformed_note("stored nullifier hash does not match secrets"));
            }
        }
        Ok(note)
    }
}

impl Drop for Note {
    fn drop(&mut self) {
        self.private_scalar.zeroize();
        self.aux_secret.zeroize();
    }
}

impl std::fmt::Debug for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Note")
            .field("amount", &self.amount)
            .field("commitment", &self.commitment)
            .field("leaf_index", &self.leaf_index)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Serialized form
// ============================================================================

/// Note secrets plus optional derived values, as saved or shared
///
/// Binary layout: version (1) | amount u64 LE (8) | privateScalar (32) |
/// auxSecret (32) | flags (1) | [leafIndex u64 LE (8)] | [commitment (32)] |
/// [nullifierHash (32)]. Field elements are canonical big-endian.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSecrets {
    pub version: u8,
    pub amount: u64,
    pub private_scalar: FieldElement,
    pub aux_secret: FieldElement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<FieldElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifier_hash: Option<FieldElement>,
}

impl NoteSecrets {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 8 + 2 * FIELD_BYTES + 1 + 8 + 2 * FIELD_BYTES);
        out.push(self.version);
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.private_scalar.to_be_bytes());
        out.extend_from_slice(&self.aux_secret.to_be_bytes());

        let mut flags = 0u8;
        if self.leaf_index.is_some() {
            flags |= FLAG_LEAF_INDEX;
        }
        if self.commitment.is_some() {
            flags |= FLAG_COMMITMENT;
        }
        if self.nullifier_hash.is_some() {
            flags |= FLAG_NULLIFIER_HASH;
        }
        out.push(flags);

        if let Some(index) = self.leaf_index {
            out.extend_from_slice(&index.to_le_bytes());
        }
        if let Some(commitment) = &self.commitment {
            out.extend_from_slice(&commitment.to_be_bytes());
        }
        if let Some(hash) = &self.nullifier_hash {
            out.extend_from_slice(&hash.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = NoteReader { rest: bytes };

        let version = reader.take(1, "version")?[0];
        if version != NOTE_VERSION {
            return Err(ShieldError::malformed_note(format!("unsupported version {}", version)));
        }

        let amount = reader.u64_le("amount")?;
        let private_scalar = reader.field("private scalar")?;
        let aux_secret = reader.field("aux secret")?;

        let flags = reader.take(1, "flags")?[0];
        if flags & !(FLAG_LEAF_INDEX | FLAG_COMMITMENT | FLAG_NULLIFIER_HASH) != 0 {
            return Err(ShieldError::malformed_note(format!("unknown flags 0b{:08b}", flags)));
        }

        let leaf_index = if flags & FLAG_LEAF_INDEX != 0 {
            Some(reader.u64_le("leaf index")?)
        } else {
            None
        };
        let commitment = if flags & FLAG_COMMITMENT != 0 {
            Some(reader.field("commitment")?)
        } else {
            None
        };
        let nullifier_hash = if flags & FLAG_NULLIFIER_HASH != 0 {
            Some(reader.field("nullifier hash")?)
        } else {
            None
        };

        if !reader.rest.is_empty() {
            return Err(ShieldError::malformed_note(format!("{} trailing bytes", reader.rest.len())));
        }

        Ok(Self {
            version,
            amount,
            private_scalar,
            aux_secret,
            leaf_index,
            commitment,
            nullifier_hash,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ShieldError::malformed_note(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let secrets: Self = serde_json::from_str(json).map_err(|e| ShieldError::malformed_note(e.to_string()))?;
        if secrets.version != NOTE_VERSION {
            return Err(ShieldError::malformed_note(format!("unsupported version {}", secrets.version)));
        }
        Ok(secrets)
    }
}

struct NoteReader<'a> {
    rest: &'a [u8],
}

impl<'a> NoteReader<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.rest.len() < len {
            return Err(ShieldError::malformed_note(format!("truncated before {}", what)));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn u64_le(&mut self, what: &str) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn field(&mut self, what: &str) -> Result<FieldElement> {
        FieldElement::from_be_slice(self.take(FIELD_BYTES, what)?)
            .map_err(|_| ShieldError::malformed_note(format!("{} is not a canonical field element", what)))
    }
}

impl Drop for NoteSecrets {
    fn drop(&mut self) {
        self.private_scalar.zeroize();
        self.aux_secret.zeroize();
    }
}

impl std::fmt::Debug for NoteSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteSecrets")
            .field("version", &self.version)
            .field("amount", &self.amount)
            .field("leaf_index", &self.leaf_index)
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}
