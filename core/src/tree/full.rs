//! Accumulator retaining every filled node

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::live::{LastInsert, LiveAccumulator};
use super::{path_bit, Accumulator, MerkleProof, ZeroHashes};
use crate::config::ProtocolConfig;
use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};

/// Merkle tree that can prove any inserted leaf
///
/// `levels[d]` holds the non-empty nodes at height `d` in index order;
/// anything past the end is the zero hash for that height. Memory is O(n),
/// insert and proof are O(D).
#[derive(Clone, Debug)]
pub struct FullAccumulator {
    engine: Arc<HashEngine>,
    zeros: ZeroHashes,
    levels: Vec<Vec<FieldElement>>,
}

impl FullAccumulator {
    pub fn new(engine: Arc<HashEngine>, depth: usize) -> Result<Self> {
        let zeros = ZeroHashes::compute(&engine, depth)?;
        Ok(Self::from_zeros(engine, zeros))
    }

    pub fn with_config(engine: Arc<HashEngine>, config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let zeros = ZeroHashes::compute(&engine, config.tree_depth)?;
        if let Some(expected) = &config.expected_empty_root {
            zeros.check_empty_root(expected)?;
        }
        Ok(Self::from_zeros(engine, zeros))
    }

    fn from_zeros(engine: Arc<HashEngine>, zeros: ZeroHashes) -> Self {
        let levels = vec![Vec::new(); zeros.depth() + 1];
        Self { engine, zeros, levels }
    }

    /// Rebuild by replaying the ledger's ordered leaf feed
    pub fn from_leaves<I>(engine: Arc<HashEngine>, depth: usize, leaves: I) -> Result<Self>
    where
        I: IntoIterator<Item = FieldElement>,
    {
        let mut tree = Self::new(engine, depth)?;
        for leaf in leaves {
            tree.insert(leaf)?;
        }
        debug!(leaves = tree.next_index(), root = %tree.root(), "rebuilt accumulator from leaves");
        Ok(tree)
    }

    pub fn zero_hashes(&self) -> &ZeroHashes {
        &self.zeros
    }

    /// Inserted leaf at `index`
    pub fn leaf(&self, index: u64) -> Option<FieldElement> {
        usize::try_from(index).ok().and_then(|i| self.levels[0].get(i).copied())
    }

    /// Index of the first occurrence of `leaf`
    pub fn position_of(&self, leaf: &FieldElement) -> Option<u64> {
        self.levels[0].iter().position(|l| l == leaf).map(|i| i as u64)
    }

    fn node(&self, level: usize, index: u64) -> FieldElement {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.levels[level].get(i).copied())
            .unwrap_or_else(|| self.zeros.at(level))
    }

    fn set_node(&mut self, level: usize, index: u64, value: FieldElement) {
        let nodes = &mut self.levels[level];
        let i = index as usize;
        if i < nodes.len() {
            nodes[i] = value;
        } else {
            nodes.push(value);
        }
    }

    /// Frontier-only view with the same root, for reconciling the two modes
    pub fn live_view(&self, history_size: usize) -> LiveAccumulator {
        let depth = self.depth();
        let frontier = (0..depth)
            .map(|level| {
                let filled = self.levels[level].len();
                if filled == 0 {
                    FieldElement::zero()
                } else {
                    self.levels[level][(filled - 1) & !1]
                }
            })
            .collect();

        let last = self
            .next_index()
            .checked_sub(1)
            .and_then(|index| self.proof(index).ok())
            .map(|proof| LastInsert { index: proof.leaf_index, siblings: proof.siblings });

        LiveAccumulator::from_parts(
            Arc::clone(&self.engine),
            self.zeros.clone(),
            history_size,
            frontier,
            self.root(),
            self.next_index(),
            last,
        )
    }

    /// Most recent roots, oldest first, as the ledger would have recorded them
    pub fn recent_roots(&self, count: usize) -> Result<VecDeque<FieldElement>> {
        let total = self.next_index();
        let mut roots = VecDeque::with_capacity(count);
        let start = total.saturating_sub(count as u64);
        let prefix = self.levels[0][..start as usize].iter().copied();
        let mut replay = Self::from_leaves(Arc::clone(&self.engine), self.depth(), prefix)?;
        for index in start..total {
            replay.insert(self.node(0, index))?;
            roots.push_back(replay.root());
        }
        Ok(roots)
    }
}

impl Accumulator for FullAccumulator {
    fn depth(&self) -> usize {
        self.zeros.depth()
    }

    fn root(&self) -> FieldElement {
        self.node(self.depth(), 0)
    }

    fn next_index(&self) -> u64 {
        self.levels[0].len() as u64
    }

    fn insert(&mut self, leaf: FieldElement) -> Result<u64> {
        let index = self.next_index();
        let capacity = self.capacity();
        if index >= capacity {
            return Err(ShieldError::TreeFull { capacity });
        }

        self.set_node(0, index, leaf);
        let mut node_index = index;
        let mut current = leaf;
        for level in 0..self.depth() {
            current = if path_bit(node_index, 0) {
                self.engine.merkle_node(&self.node(level, node_index - 1), &current)
            } else {
                self.engine.merkle_node(&current, &self.zeros.at(level))
            };
            node_index >>= 1;
            self.set_node(level + 1, node_index, current);
        }

        debug!(leaf_index = index, root = %current, "inserted leaf");
        Ok(index)
    }

    fn proof(&self, leaf_index: u64) -> Result<MerkleProof> {
        let next_index = self.next_index();
        if leaf_index >= next_index {
            return Err(ShieldError::LeafIndexOutOfRange { index: leaf_index, next_index });
        }

        let depth = self.depth();
        let siblings = (0..depth)
            .map(|level| self.node(level, (leaf_index >> level) ^ 1))
            .collect();
        let path_bits = (0..depth).map(|level| path_bit(leaf_index, level)).collect();

        Ok(MerkleProof { leaf_index, siblings, path_bits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Arc<HashEngine> {
        Arc::new(HashEngine::new().unwrap())
    }

    fn leaves(n: u64) -> Vec<FieldElement> {
        (0..n).map(|i| FieldElement::from_u64(i * 31 + 7)).collect()
    }

    #[test]
    fn test_every_leaf_provable() {
        let engine = engine();
        let tree = FullAccumulator::from_leaves(Arc::clone(&engine), 5, leaves(11)).unwrap();
        let root = tree.root();

        for (i, leaf) in leaves(11).iter().enumerate() {
            let proof = tree.proof(i as u64).unwrap();
            assert!(proof.verify_strict(&engine, 5, leaf, &root).unwrap(), "leaf {}", i);
        }
        assert!(matches!(tree.proof(11), Err(ShieldError::LeafIndexOutOfRange { .. })));
    }

    #[test]
    fn test_matches_live_accumulator() {
        let engine = engine();
        let mut full = FullAccumulator::new(Arc::clone(&engine), 7).unwrap();
        let mut live = LiveAccumulator::new(Arc::clone(&engine), 7).unwrap();
        assert_eq!(full.root(), live.root());

        for leaf in leaves(40) {
            full.insert(leaf).unwrap();
            live.insert(leaf).unwrap();
            assert_eq!(full.root(), live.root());
            let index = live.next_index() - 1;
            assert_eq!(full.proof(index).unwrap(), live.proof(index).unwrap());
        }
    }

    #[test]
    fn test_live_view_reconciles() {
        let engine = engine();
        let full = FullAccumulator::from_leaves(Arc::clone(&engine), 6, leaves(23)).unwrap();
        let mut live_direct = LiveAccumulator::new(Arc::clone(&engine), 6).unwrap();
        for leaf in leaves(23) {
            live_direct.insert(leaf).unwrap();
        }

        let mut view = full.live_view(100);
        assert_eq!(view.snapshot(), live_direct.snapshot());
        assert!(view.proof(22).unwrap().verify(&engine, 6, &leaves(23)[22], &full.root()));

        let extra = FieldElement::from_u64(99_999);
        view.insert(extra).unwrap();
        live_direct.insert(extra).unwrap();
        assert_eq!(view.root(), live_direct.root());
    }

    #[test]
    fn test_tree_full() {
        let mut tree = FullAccumulator::from_leaves(engine(), 2, leaves(4)).unwrap();
        assert_eq!(tree.insert(FieldElement::zero()), Err(ShieldError::TreeFull { capacity: 4 }));
    }

    #[test]
    fn test_leaf_lookup() {
        let tree = FullAccumulator::from_leaves(engine(), 4, leaves(5)).unwrap();
        assert_eq!(tree.leaf(2), Some(leaves(5)[2]));
        assert_eq!(tree.leaf(5), None);
        assert_eq!(tree.position_of(&leaves(5)[4]), Some(4));
    }

    #[test]
    fn test_recent_roots() {
        let engine = engine();
        let tree = FullAccumulator::from_leaves(Arc::clone(&engine), 5, leaves(6)).unwrap();
        let roots = tree.recent_roots(3).unwrap();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots.back(), Some(&tree.root()));

        let four = FullAccumulator::from_leaves(engine, 5, leaves(4)).unwrap();
        assert_eq!(roots[0], four.root());
    }
}
