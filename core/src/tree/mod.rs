//! Incremental commitment accumulator
//!
//! Two concrete modes share the [`Accumulator`] trait:
//!
//! - [`LiveAccumulator`]: frontier only, mirrors the ledger account, can be
//!   synced from a remote snapshot, proves only the most recent leaf
//! - [`FullAccumulator`]: keeps every filled node, proves any leaf, rebuilt
//!   by replaying the ledger's ordered leaf feed

pub mod full;
pub mod live;
pub mod proof;
pub mod zero_hashes;

pub use full::*;
pub use live::*;
pub use proof::*;
pub use zero_hashes::*;

use std::sync::{Arc, RwLock};

use crate::crypto::field::FieldElement;
use crate::error::Result;

/// Append-only Merkle accumulator of fixed depth
pub trait Accumulator {
    fn depth(&self) -> usize;

    fn root(&self) -> FieldElement;

    /// Number of leaves inserted so far
    fn next_index(&self) -> u64;

    fn capacity(&self) -> u64 {
        1u64 << self.depth()
    }

    /// Append a leaf and return its index; `TreeFull` at capacity
    fn insert(&mut self, leaf: FieldElement) -> Result<u64>;

    fn proof(&self, leaf_index: u64) -> Result<MerkleProof>;
}

/// Single-writer accumulator shared across threads
pub type SharedAccumulator<A> = Arc<RwLock<A>>;

pub fn shared<A: Accumulator>(accumulator: A) -> SharedAccumulator<A> {
    Arc::new(RwLock::new(accumulator))
}

/// Bit `level` of `index` as a path bit (true = right child)
pub(crate) fn path_bit(index: u64, level: usize) -> bool {
    (index >> level) & 1 == 1
}
