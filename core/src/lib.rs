//! Client-side cryptographic core for a shielded-note protocol
//!
//! - Grumpkin keys over the BN254 scalar field and circom-compatible Poseidon
//! - Note commitments `H(x, amount)` and leaf-bound nullifiers `H(sk, leafIndex)`
//! - An incremental depth-20 Merkle accumulator mirroring the ledger account
//! - DKSAP stealth addresses: send, scan and claim
//! - Witness assembly for an external spend prover

pub mod config;
pub mod crypto;
pub mod error;
pub mod note;
pub mod prover;
pub mod spend;
pub mod state;
pub mod tree;

pub use config::ProtocolConfig;
pub use crypto::{
    EngineCell, FieldElement, HashEngine, MetaAddress, Point, Scalar, SecretScalar, StealthClaim, StealthKeys,
    StealthMatch, StealthOutput, StealthProtocol, ViewingKey,
};
pub use error::{Result, ShieldError};
pub use note::{Note, NoteSecrets};
pub use prover::{prepare_note_spend, ProofBlob, Prover, SpendWitness};
pub use spend::SpendRegistry;
pub use state::{AnnouncementRecord, RemoteTreeState, StealthAnnouncement};
pub use tree::{Accumulator, FullAccumulator, LiveAccumulator, MerkleProof, SharedAccumulator, ZeroHashes};


#[cfg(test)]
mod test_vectors;
