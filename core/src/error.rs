use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ShieldError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShieldError {
    // ==========================================
    // PRIMITIVE ERRORS
    // ==========================================

    #[error("Invalid field element - value {value} is not below the BN254 scalar modulus")]
    InvalidFieldElement { value: String },

    #[error("Invalid curve point - {reason}")]
    InvalidPoint { reason: String },

    // ==========================================
    // HASH ENGINE ERRORS
    // ==========================================

    #[error("Hash engine used before initialization")]
    NotInitialized,

    #[error("Unsupported Poseidon arity {arity} - supported arities are 1 to 4")]
    UnsupportedArity { arity: usize },

    #[error("Poseidon parameter setup failed: {0}")]
    Poseidon(String),

    // ==========================================
    // ACCUMULATOR ERRORS
    // ==========================================

    #[error("Commitment tree is full - capacity is {capacity} leaves")]
    TreeFull { capacity: u64 },

    #[error("Merkle proof length mismatch - expected {expected}, got {siblings} siblings and {path_bits} path bits")]
    ProofLengthMismatch {
        expected: usize,
        siblings: usize,
        path_bits: usize,
    },

    #[error("Leaf index {index} has not been inserted (next index is {next_index})")]
    LeafIndexOutOfRange { index: u64, next_index: u64 },

    #[error("Proof for leaf {index} cannot be reconstructed from the frontier - use a full accumulator")]
    ProofUnavailable { index: u64 },

    #[error("Tree depth mismatch - empty root {actual} does not match expected {expected}")]
    DepthMismatch { expected: String, actual: String },

    #[error("Malformed remote tree state: {reason}")]
    MalformedState { reason: String },

    #[error("Remote tree state root {claimed} does not match frontier-derived root {derived}")]
    StateRootMismatch { claimed: String, derived: String },

    // ==========================================
    // STEALTH ERRORS
    // ==========================================

    #[error("Stealth key mismatch - these keys do not own this position")]
    StealthKeyMismatch,

    #[error("Malformed stealth announcement: {reason}")]
    MalformedAnnouncement { reason: String },

    #[error("Invalid meta-address: {reason}")]
    InvalidMetaAddress { reason: String },

    // ==========================================
    // NOTE ERRORS
    // ==========================================

    #[error("Note has no leaf index yet - it must be accepted by the ledger before spending")]
    LeafIndexUnassigned,

    #[error("Malformed note encoding: {reason}")]
    MalformedNote { reason: String },

    #[error("A spend for nullifier hash {nullifier_hash} is already in flight")]
    DuplicateSpend { nullifier_hash: String },

    // ==========================================
    // PROVER ERRORS
    // ==========================================

    #[error("Invalid spend witness: {reason}")]
    InvalidWitness { reason: String },

    #[error("Prover failed: {0}")]
    Prover(String),

    // ==========================================
    // CONFIGURATION ERRORS
    // ==========================================

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShieldError {
    pub(crate) fn invalid_point(reason: impl Into<String>) -> Self {
        Self::InvalidPoint { reason: reason.into() }
    }

    pub(crate) fn malformed_state(reason: impl Into<String>) -> Self {
        Self::MalformedState { reason: reason.into() }
    }

    pub(crate) fn malformed_announcement(reason: impl Into<String>) -> Self {
        Self::MalformedAnnouncement { reason: reason.into() }
    }

    pub(crate) fn invalid_witness(reason: impl Into<String>) -> Self {
        Self::InvalidWitness { reason: reason.into() }
    }

    pub(crate) fn malformed_note(reason: impl Into<String>) -> Self {
        Self::MalformedNote { reason: reason.into() }
    }
}
