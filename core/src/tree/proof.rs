//! Merkle inclusion proofs
//!
//! `path_bits[d]` is `true` when the running node at level `d` is a right
//! child, i.e. bit `d` of the leaf index.

use serde::{Deserialize, Serialize};

use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: u64,
    pub siblings: Vec<FieldElement>,
    pub path_bits: Vec<bool>,
}

impl MerkleProof {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Root implied by this proof for `leaf`
    pub fn compute_root(&self, engine: &HashEngine, leaf: &FieldElement) -> Result<FieldElement> {
        compute_root(engine, leaf, &self.siblings, &self.path_bits)
    }

    /// Strict check against a tree of known depth
    pub fn verify_strict(
        &self,
        engine: &HashEngine,
        depth: usize,
        leaf: &FieldElement,
        expected_root: &FieldElement,
    ) -> Result<bool> {
        verify_strict(engine, depth, leaf, &self.siblings, &self.path_bits, expected_root)
    }

    /// Boolean check against a tree of known depth
    pub fn verify(&self, engine: &HashEngine, depth: usize, leaf: &FieldElement, expected_root: &FieldElement) -> bool {
        verify(engine, depth, leaf, &self.siblings, &self.path_bits, expected_root)
    }

    /// Path bits as the low bits of an index
    pub fn path_index(&self) -> u64 {
        self.path_bits
            .iter()
            .enumerate()
            .filter(|(_, &bit)| bit)
            .fold(0u64, |acc, (d, _)| acc | (1u64 << d))
    }
}

/// Fold a leaf up through its siblings
pub fn compute_root(
    engine: &HashEngine,
    leaf: &FieldElement,
    siblings: &[FieldElement],
    path_bits: &[bool],
) -> Result<FieldElement> {
    if siblings.len() != path_bits.len() {
        return Err(ShieldError::ProofLengthMismatch {
            expected: siblings.len(),
            siblings: siblings.len(),
            path_bits: path_bits.len(),
        });
    }

    let root = siblings
        .iter()
        .zip(path_bits)
        .fold(*leaf, |node, (sibling, &is_right)| {
            if is_right {
                engine.merkle_node(sibling, &node)
            } else {
                engine.merkle_node(&node, sibling)
            }
        });
    Ok(root)
}

/// Verify a proof for a tree of `depth`, failing on any length mismatch
pub fn verify_strict(
    engine: &HashEngine,
    depth: usize,
    leaf: &FieldElement,
    siblings: &[FieldElement],
    path_bits: &[bool],
    expected_root: &FieldElement,
) -> Result<bool> {
    if siblings.len() != depth || path_bits.len() != depth {
        return Err(ShieldError::ProofLengthMismatch {
            expected: depth,
            siblings: siblings.len(),
            path_bits: path_bits.len(),
        });
    }
    Ok(compute_root(engine, leaf, siblings, path_bits)? == *expected_root)
}

/// Boolean form of [`verify_strict`]; a proof of the wrong depth is `false`
pub fn verify(
    engine: &HashEngine,
    depth: usize,
    leaf: &FieldElement,
    siblings: &[FieldElement],
    path_bits: &[bool],
    expected_root: &FieldElement,
) -> bool {
    verify_strict(engine, depth, leaf, siblings, path_bits, expected_root).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_leaf_tree() {
        let engine = HashEngine::new().unwrap();
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);
        let root = engine.merkle_node(&a, &b);

        assert!(verify(&engine, 1, &a, &[b], &[false], &root));
        assert!(verify(&engine, 1, &b, &[a], &[true], &root));
        assert!(!verify(&engine, 1, &a, &[b], &[true], &root));
    }

    #[test]
    fn test_length_mismatch() {
        let engine = HashEngine::new().unwrap();
        let leaf = FieldElement::from_u64(9);
        let sibs = vec![FieldElement::zero(); 3];

        assert!(!verify(&engine, 3, &leaf, &sibs, &[false, false], &leaf));
        assert_eq!(
            verify_strict(&engine, 4, &leaf, &sibs, &[false; 3], &leaf),
            Err(ShieldError::ProofLengthMismatch { expected: 4, siblings: 3, path_bits: 3 })
        );
        assert!(verify_strict(&engine, 3, &leaf, &sibs, &[false; 2], &leaf).is_err());
    }

    #[test]
    fn test_boolean_verify_rejects_wrong_depth() {
        let engine = HashEngine::new().unwrap();
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);
        let c = FieldElement::from_u64(3);

        // A valid depth-2 fold is not a proof in a depth-3 tree, nor in depth 1
        let root = engine.merkle_node(&engine.merkle_node(&a, &b), &c);
        let proof = MerkleProof { leaf_index: 0, siblings: vec![b, c], path_bits: vec![false, false] };
        assert!(proof.verify(&engine, 2, &a, &root));
        assert!(!proof.verify(&engine, 3, &a, &root));
        assert!(!proof.verify(&engine, 1, &a, &root));

        // An empty proof of a "depth-0 tree" whose root is the leaf itself
        assert!(!verify(&engine, 20, &a, &[], &[], &a));
    }

    #[test]
    fn test_path_index() {
        let proof = MerkleProof {
            leaf_index: 5,
            siblings: vec![FieldElement::zero(); 4],
            path_bits: vec![true, false, true, false],
        };
        assert_eq!(proof.path_index(), 5);
        assert_eq!(proof.depth(), 4);
    }
}
