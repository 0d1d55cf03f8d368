//! Frontier-only accumulator mirroring the ledger's commitment tree

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{path_bit, Accumulator, MerkleProof, ZeroHashes};
use crate::config::ProtocolConfig;
use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};

/// Roots the ledger keeps for stale-proof acceptance
pub const DEFAULT_ROOT_HISTORY_SIZE: usize = 100;

/// `{root, frontier, nextIndex}` as published by the remote ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub root: FieldElement,
    pub frontier: Vec<FieldElement>,
    pub next_index: u64,
}

/// Siblings captured for the most recent insert
#[derive(Clone, Debug)]
pub(crate) struct LastInsert {
    pub(crate) index: u64,
    pub(crate) siblings: Vec<FieldElement>,
}

/// Frontier-only incremental Merkle tree
///
/// O(D) memory. Only the most recently inserted leaf can be proven; every
/// other position fails with `ProofUnavailable`.
#[derive(Clone, Debug)]
pub struct LiveAccumulator {
    engine: Arc<HashEngine>,
    zeros: ZeroHashes,
    frontier: Vec<FieldElement>,
    root: FieldElement,
    next_index: u64,
    root_history: VecDeque<FieldElement>,
    history_size: usize,
    last_insert: Option<LastInsert>,
}

impl LiveAccumulator {
    pub fn new(engine: Arc<HashEngine>, depth: usize) -> Result<Self> {
        Self::with_history(engine, depth, DEFAULT_ROOT_HISTORY_SIZE)
    }

    pub fn with_history(engine: Arc<HashEngine>, depth: usize, history_size: usize) -> Result<Self> {
        if history_size == 0 {
            return Err(ShieldError::Config("root history size must be at least 1".into()));
        }
        let zeros = ZeroHashes::compute(&engine, depth)?;
        Ok(Self::from_zeros(engine, zeros, history_size))
    }

    /// Build from configuration, cross-checking the expected empty root
    pub fn with_config(engine: Arc<HashEngine>, config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let zeros = ZeroHashes::compute(&engine, config.tree_depth)?;
        if let Some(expected) = &config.expected_empty_root {
            zeros.check_empty_root(expected)?;
        }
        Ok(Self::from_zeros(engine, zeros, config.root_history_size))
    }

    pub(crate) fn from_zeros(engine: Arc<HashEngine>, zeros: ZeroHashes, history_size: usize) -> Self {
        let depth = zeros.depth();
        let root = zeros.empty_root();
        let mut root_history = VecDeque::with_capacity(history_size);
        root_history.push_back(root);
        Self {
            engine,
            zeros,
            frontier: vec![FieldElement::zero(); depth],
            root,
            next_index: 0,
            root_history,
            history_size,
            last_insert: None,
        }
    }

    pub(crate) fn from_parts(
        engine: Arc<HashEngine>,
        zeros: ZeroHashes,
        history_size: usize,
        frontier: Vec<FieldElement>,
        root: FieldElement,
        next_index: u64,
        last_insert: Option<LastInsert>,
    ) -> Self {
        let mut tree = Self::from_zeros(engine, zeros, history_size.max(1));
        tree.frontier = frontier;
        tree.root = root;
        tree.next_index = next_index;
        tree.last_insert = last_insert;
        tree.restore_root_history(std::iter::empty());
        tree
    }

    pub fn zero_hashes(&self) -> &ZeroHashes {
        &self.zeros
    }

    pub fn frontier(&self) -> &[FieldElement] {
        &self.frontier
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            root: self.root,
            frontier: self.frontier.clone(),
            next_index: self.next_index,
        }
    }

    /// Whether `root` is current or among the retained recent roots
    pub fn is_known_root(&self, root: &FieldElement) -> bool {
        self.root_history.iter().any(|r| r == root)
    }

    pub fn root_history(&self) -> impl Iterator<Item = &FieldElement> {
        self.root_history.iter()
    }

    fn record_root(&mut self, root: FieldElement) {
        if self.root_history.len() == self.history_size {
            self.root_history.pop_front();
        }
        self.root_history.push_back(root);
    }

    /// Replace local state with a remote snapshot after checking it
    ///
    /// Fails closed: the snapshot root must be reproducible from the
    /// frontier along the last-inserted path.
    pub fn import_remote_state(&mut self, snapshot: &TreeSnapshot) -> Result<()> {
        let derived = derive_root_from_frontier(&self.engine, &self.zeros, &snapshot.frontier, snapshot.next_index)?;

        if let Some(derived) = derived {
            if derived != snapshot.root {
                warn!(
                    next_index = snapshot.next_index,
                    claimed = %snapshot.root,
                    derived = %derived,
                    "remote tree root does not match its frontier"
                );
                return Err(ShieldError::StateRootMismatch {
                    claimed: snapshot.root.to_hex(),
                    derived: derived.to_hex(),
                });
            }
        }

        self.frontier = snapshot.frontier.clone();
        self.root = snapshot.root;
        self.next_index = snapshot.next_index;
        self.last_insert = None;
        if !self.is_known_root(&snapshot.root) {
            self.record_root(snapshot.root);
        }

        debug!(next_index = self.next_index, root = %self.root, "imported remote tree state");
        Ok(())
    }

    /// Replace the retained roots, oldest first; the current root is kept last
    pub fn restore_root_history<I: IntoIterator<Item = FieldElement>>(&mut self, roots: I) {
        self.root_history.clear();
        for root in roots {
            self.record_root(root);
        }
        if self.root_history.back() != Some(&self.root) {
            self.record_root(self.root);
        }
    }
}

/// Recompute the root a frontier implies
///
/// Returns `Ok(None)` when the tree is exactly full, since the last path is
/// then entirely right children and cannot be rebuilt from the frontier.
pub(crate) fn derive_root_from_frontier(
    engine: &HashEngine,
    zeros: &ZeroHashes,
    frontier: &[FieldElement],
    next_index: u64,
) -> Result<Option<FieldElement>> {
    let depth = zeros.depth();
    if frontier.len() != depth {
        return Err(ShieldError::malformed_state(format!(
            "frontier has {} levels, expected {}",
            frontier.len(),
            depth
        )));
    }
    let capacity = 1u64 << depth;
    if next_index > capacity {
        return Err(ShieldError::malformed_state(format!(
            "next index {} exceeds capacity {}",
            next_index, capacity
        )));
    }
    if next_index == 0 {
        return Ok(Some(zeros.empty_root()));
    }

    let last = next_index - 1;
    let start = last.trailing_ones() as usize;
    if start >= depth {
        return Ok(None);
    }

    let mut current = frontier[start];
    for level in start..depth {
        if path_bit(last, level) {
            current = engine.merkle_node(&frontier[level], &current);
        } else {
            if frontier[level] != current {
                return Err(ShieldError::StateRootMismatch {
                    claimed: frontier[level].to_hex(),
                    derived: current.to_hex(),
                });
            }
            current = engine.merkle_node(&current, &zeros.at(level));
        }
    }
    Ok(Some(current))
}

impl Accumulator for LiveAccumulator {
    fn depth(&self) -> usize {
        self.zeros.depth()
    }

    fn root(&self) -> FieldElement {
        self.root
    }

    fn next_index(&self) -> u64 {
        self.next_index
    }

    fn insert(&mut self, leaf: FieldElement) -> Result<u64> {
        let index = self.next_index;
        let capacity = self.capacity();
        if index >= capacity {
            return Err(ShieldError::TreeFull { capacity });
        }

        let depth = self.depth();
        let mut siblings = Vec::with_capacity(depth);
        let mut current = leaf;
        for level in 0..depth {
            if path_bit(index, level) {
                siblings.push(self.frontier[level]);
                current = self.engine.merkle_node(&self.frontier[level], &current);
            } else {
                self.frontier[level] = current;
                siblings.push(self.zeros.at(level));
                current = self.engine.merkle_node(&current, &self.zeros.at(level));
            }
        }

        self.root = current;
        self.next_index = index + 1;
        self.last_insert = Some(LastInsert { index, siblings });
        self.record_root(current);

        debug!(leaf_index = index, root = %current, "inserted leaf");
        Ok(index)
    }

    fn proof(&self, leaf_index: u64) -> Result<MerkleProof> {
        if leaf_index >= self.next_index {
            return Err(ShieldError::LeafIndexOutOfRange {
                index: leaf_index,
                next_index: self.next_index,
            });
        }
        match &self.last_insert {
            Some(last) if last.index == leaf_index => Ok(MerkleProof {
                leaf_index,
                siblings: last.siblings.clone(),
                path_bits: (0..self.depth()).map(|d| path_bit(leaf_index, d)).collect(),
            }),
            _ => Err(ShieldError::ProofUnavailable { index: leaf_index }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Arc<HashEngine> {
        Arc::new(HashEngine::new().unwrap())
    }

    fn leaf(i: u64) -> FieldElement {
        FieldElement::from_u64(1000 + i)
    }

    #[test]
    fn test_empty_root() {
        let tree = LiveAccumulator::new(engine(), 20).unwrap();
        assert_eq!(tree.root(), tree.zero_hashes().empty_root());
        assert_eq!(tree.next_index(), 0);
        assert!(tree.is_known_root(&tree.root()));
    }

    #[test]
    fn test_single_insert_root() {
        let engine = engine();
        let mut tree = LiveAccumulator::new(Arc::clone(&engine), 3).unwrap();
        let zeros = tree.zero_hashes().clone();
        assert_eq!(tree.insert(leaf(0)).unwrap(), 0);

        let l1 = engine.hash2(&leaf(0), &zeros.at(0));
        let l2 = engine.hash2(&l1, &zeros.at(1));
        let l3 = engine.hash2(&l2, &zeros.at(2));
        assert_eq!(tree.root(), l3);
    }

    #[test]
    fn test_tree_full() {
        let mut tree = LiveAccumulator::new(engine(), 2).unwrap();
        for i in 0..4 {
            assert_eq!(tree.insert(leaf(i)).unwrap(), i);
        }
        assert_eq!(tree.insert(leaf(4)), Err(ShieldError::TreeFull { capacity: 4 }));
        assert_eq!(tree.next_index(), 4);
    }

    #[test]
    fn test_latest_leaf_proof_only() {
        let engine = engine();
        let mut tree = LiveAccumulator::new(Arc::clone(&engine), 8).unwrap();
        for i in 0..5 {
            tree.insert(leaf(i)).unwrap();
        }

        let proof = tree.proof(4).unwrap();
        assert!(proof.verify(&engine, 8, &leaf(4), &tree.root()));
        assert_eq!(proof.path_index(), 4);

        assert_eq!(tree.proof(2), Err(ShieldError::ProofUnavailable { index: 2 }));
        assert!(matches!(tree.proof(5), Err(ShieldError::LeafIndexOutOfRange { .. })));
    }

    #[test]
    fn test_root_history_ring() {
        let mut tree = LiveAccumulator::with_history(engine(), 6, 3).unwrap();
        let empty = tree.root();
        let mut roots = vec![];
        for i in 0..4 {
            tree.insert(leaf(i)).unwrap();
            roots.push(tree.root());
        }
        assert!(!tree.is_known_root(&empty));
        assert!(!tree.is_known_root(&roots[0]));
        assert!(tree.is_known_root(&roots[1]));
        assert!(tree.is_known_root(&roots[3]));
        assert_eq!(tree.root_history().count(), 3);
    }

    #[test]
    fn test_import_roundtrip() {
        let engine = engine();
        let mut source = LiveAccumulator::new(Arc::clone(&engine), 10).unwrap();
        for i in 0..13 {
            source.insert(leaf(i)).unwrap();
        }

        let mut mirror = LiveAccumulator::new(Arc::clone(&engine), 10).unwrap();
        mirror.import_remote_state(&source.snapshot()).unwrap();
        assert_eq!(mirror.root(), source.root());
        assert_eq!(mirror.next_index(), 13);

        // Both continue identically
        source.insert(leaf(13)).unwrap();
        mirror.insert(leaf(13)).unwrap();
        assert_eq!(mirror.root(), source.root());
    }

    #[test]
    fn test_import_rejects_inconsistent_snapshot() {
        let engine = engine();
        let mut source = LiveAccumulator::new(Arc::clone(&engine), 6).unwrap();
        for i in 0..6 {
            source.insert(leaf(i)).unwrap();
        }
        let mut mirror = LiveAccumulator::new(Arc::clone(&engine), 6).unwrap();

        let mut bad_root = source.snapshot();
        bad_root.root = FieldElement::from_u64(1);
        assert!(matches!(
            mirror.import_remote_state(&bad_root),
            Err(ShieldError::StateRootMismatch { .. })
        ));

        let mut short = source.snapshot();
        short.frontier.pop();
        assert!(matches!(
            mirror.import_remote_state(&short),
            Err(ShieldError::MalformedState { .. })
        ));

        let mut overflow = source.snapshot();
        overflow.next_index = 65;
        assert!(matches!(
            mirror.import_remote_state(&overflow),
            Err(ShieldError::MalformedState { .. })
        ));

        // Failed imports leave state untouched
        assert_eq!(mirror.next_index(), 0);
    }

    #[test]
    fn test_import_empty_and_full() {
        let engine = engine();
        let mut tree = LiveAccumulator::new(Arc::clone(&engine), 3).unwrap();

        let empty = tree.snapshot();
        tree.import_remote_state(&empty).unwrap();

        let mut full = LiveAccumulator::new(Arc::clone(&engine), 3).unwrap();
        for i in 0..8 {
            full.insert(leaf(i)).unwrap();
        }
        tree.import_remote_state(&full.snapshot()).unwrap();
        assert_eq!(tree.root(), full.root());
        assert!(matches!(tree.insert(leaf(9)), Err(ShieldError::TreeFull { .. })));
    }

    #[test]
    fn test_with_config_checks_empty_root() {
        let engine = engine();
        let mut config = ProtocolConfig::default();
        config.tree_depth = 19;
        assert!(matches!(
            LiveAccumulator::with_config(Arc::clone(&engine), &config),
            Err(ShieldError::DepthMismatch { .. })
        ));

        config.tree_depth = 20;
        let tree = LiveAccumulator::with_config(engine, &config).unwrap();
        assert_eq!(tree.depth(), 20);
    }
}
