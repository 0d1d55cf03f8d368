//! Spend witnesses and the external prover seam
//!
//! The proof system itself lives outside this crate. This module assembles
//! the private witness and the ordered public inputs
//! `(merkleRoot, nullifierHash, amount)` the circuit expects, each as a
//! 32-byte big-endian word.

use tracing::debug;

use crate::crypto::dksap::StealthClaim;
use crate::crypto::field::{FieldElement, FIELD_BYTES};
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};
use crate::note::Note;
use crate::spend::SpendRegistry;
use crate::tree::{Accumulator, MerkleProof};

/// Number of public inputs of the spend circuit
pub const PUBLIC_INPUT_COUNT: usize = 3;

/// Everything the spend circuit consumes
#[derive(Clone)]
pub struct SpendWitness {
    pub private_scalar: FieldElement,
    pub pub_key_x: FieldElement,
    pub amount: u64,
    pub leaf_index: u64,
    pub merkle_root: FieldElement,
    pub siblings: Vec<FieldElement>,
    pub path_bits: Vec<bool>,
    pub nullifier_hash: FieldElement,
}

impl SpendWitness {
    /// Assemble and self-check a witness
    ///
    /// Recomputes the commitment and nullifier hash and folds the proof, so
    /// an inconsistent witness is rejected here instead of by the prover.
    pub fn new(
        engine: &HashEngine,
        private_scalar: FieldElement,
        pub_key_x: FieldElement,
        amount: u64,
        proof: &MerkleProof,
        merkle_root: FieldElement,
    ) -> Result<Self> {
        let commitment = engine.commitment(&pub_key_x, amount);
        let implied_root = proof.compute_root(engine, &commitment)?;
        if implied_root != merkle_root {
            return Err(ShieldError::invalid_witness(format!(
                "commitment at leaf {} does not fold to root {}",
                proof.leaf_index, merkle_root
            )));
        }
        if proof.path_index() != proof.leaf_index {
            return Err(ShieldError::invalid_witness("path bits disagree with leaf index"));
        }

        let nullifier = engine.nullifier(&private_scalar, proof.leaf_index);
        let nullifier_hash = engine.nullifier_hash(&nullifier);

        Ok(Self {
            private_scalar,
            pub_key_x,
            amount,
            leaf_index: proof.leaf_index,
            merkle_root,
            siblings: proof.siblings.clone(),
            path_bits: proof.path_bits.clone(),
            nullifier_hash,
        })
    }

    /// Witness for a plain note
    pub fn for_note(engine: &HashEngine, note: &Note, proof: &MerkleProof, merkle_root: FieldElement) -> Result<Self> {
        let leaf_index = note.leaf_index().ok_or(ShieldError::LeafIndexUnassigned)?;
        if leaf_index != proof.leaf_index {
            return Err(ShieldError::invalid_witness(format!(
                "proof is for leaf {}, note sits at {}",
                proof.leaf_index, leaf_index
            )));
        }
        let pub_key_x = note
            .public_key()
            .x()
            .ok_or_else(|| ShieldError::invalid_point("note public key is the point at infinity"))?;
        Self::new(engine, *note.private_scalar(), pub_key_x, note.amount(), proof, merkle_root)
    }

    /// Witness for a claimed stealth position (plain commitments only)
    pub fn for_claim(
        engine: &HashEngine,
        claim: &StealthClaim,
        proof: &MerkleProof,
        merkle_root: FieldElement,
    ) -> Result<Self> {
        if claim.epoch.is_some() {
            return Err(ShieldError::invalid_witness("yield positions use a different circuit"));
        }
        if claim.leaf_index != proof.leaf_index {
            return Err(ShieldError::invalid_witness(format!(
                "proof is for leaf {}, claim sits at {}",
                proof.leaf_index, claim.leaf_index
            )));
        }
        let pub_key_x = claim
            .stealth_pub
            .x()
            .ok_or_else(|| ShieldError::invalid_point("stealth key is the point at infinity"))?;
        Self::new(engine, claim.private_field(), pub_key_x, claim.amount, proof, merkle_root)
    }

    /// Ordered public inputs as 32-byte big-endian words
    pub fn public_inputs(&self) -> [[u8; FIELD_BYTES]; PUBLIC_INPUT_COUNT] {
        [
            self.merkle_root.to_be_bytes(),
            self.nullifier_hash.to_be_bytes(),
            FieldElement::from_u64(self.amount).to_be_bytes(),
        ]
    }
}

impl std::fmt::Debug for SpendWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpendWitness")
            .field("amount", &self.amount)
            .field("leaf_index", &self.leaf_index)
            .field("merkle_root", &self.merkle_root)
            .field("nullifier_hash", &self.nullifier_hash)
            .finish_non_exhaustive()
    }
}

/// Opaque proof returned by an external prover
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofBlob {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<[u8; FIELD_BYTES]>,
}

/// External proof generator; timeouts and retries belong to the caller
pub trait Prover {
    fn prove(&self, witness: &SpendWitness) -> Result<ProofBlob>;
}

/// Build a witness for `note` against the accumulator's current root and
/// register its nullifier hash so a second preparation is refused
pub fn prepare_note_spend<A: Accumulator + ?Sized>(
    engine: &HashEngine,
    registry: &SpendRegistry,
    note: &Note,
    accumulator: &A,
) -> Result<SpendWitness> {
    let leaf_index = note.leaf_index().ok_or(ShieldError::LeafIndexUnassigned)?;
    let proof = accumulator.proof(leaf_index)?;
    let witness = SpendWitness::for_note(engine, note, &proof, accumulator.root())?;

    registry.begin(witness.nullifier_hash)?;
    debug!(leaf_index, nullifier_hash = %witness.nullifier_hash, "prepared spend");
    Ok(witness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FullAccumulator;
    use std::sync::Arc;

    struct EchoProver;

    impl Prover for EchoProver {
        fn prove(&self, witness: &SpendWitness) -> Result<ProofBlob> {
            Ok(ProofBlob {
                proof: vec![0xAA; 4],
                public_inputs: witness.public_inputs().to_vec(),
            })
        }
    }

    fn setup() -> (Arc<HashEngine>, FullAccumulator, Note) {
        let engine = Arc::new(HashEngine::new().unwrap());
        let mut tree = FullAccumulator::new(Arc::clone(&engine), 8).unwrap();
        tree.insert(FieldElement::from_u64(1)).unwrap();
        let mut note = Note::random(&engine, 250);
        let index = tree.insert(note.commitment()).unwrap();
        note.assign_leaf_index(index);
        tree.insert(FieldElement::from_u64(2)).unwrap();
        (engine, tree, note)
    }

    #[test]
    fn test_prepare_note_spend() {
        let (engine, tree, note) = setup();
        let registry = SpendRegistry::new();

        let witness = prepare_note_spend(&engine, &registry, &note, &tree).unwrap();
        assert_eq!(witness.leaf_index, 1);
        assert_eq!(witness.merkle_root, tree.root());
        assert_eq!(witness.nullifier_hash, note.nullifier_hash(&engine).unwrap());

        let inputs = witness.public_inputs();
        assert_eq!(inputs[0], tree.root().to_be_bytes());
        assert_eq!(inputs[2][24..], 250u64.to_be_bytes());

        let blob = EchoProver.prove(&witness).unwrap();
        assert_eq!(blob.public_inputs.len(), PUBLIC_INPUT_COUNT);
    }

    #[test]
    fn test_double_prepare_rejected() {
        let (engine, tree, note) = setup();
        let registry = SpendRegistry::new();

        prepare_note_spend(&engine, &registry, &note, &tree).unwrap();
        assert!(matches!(
            prepare_note_spend(&engine, &registry, &note, &tree),
            Err(ShieldError::DuplicateSpend { .. })
        ));
    }

    #[test]
    fn test_unassigned_note_rejected() {
        let (engine, tree, _) = setup();
        let registry = SpendRegistry::new();
        let fresh = Note::random(&engine, 1);
        assert_eq!(
            prepare_note_spend(&engine, &registry, &fresh, &tree).map(|_| ()),
            Err(ShieldError::LeafIndexUnassigned)
        );
    }

    #[test]
    fn test_wrong_root_rejected() {
        let (engine, tree, note) = setup();
        let proof = tree.proof(1).unwrap();
        let result = SpendWitness::for_note(&engine, &note, &proof, FieldElement::from_u64(3));
        assert!(matches!(result, Err(ShieldError::InvalidWitness { .. })));

        let other = tree.proof(0).unwrap();
        assert!(SpendWitness::for_note(&engine, &note, &other, tree.root()).is_err());
    }
}
