//! Known-answer vectors
//!
//! Poseidon outputs match circomlibjs; the depth-20 empty root and the
//! account sizes match what the ledger program stores.

#[cfg(test)]
mod hash_vectors {
    use crate::crypto::{FieldElement, HashEngine};

    fn fe(hex: &str) -> FieldElement {
        FieldElement::from_hex(hex).unwrap()
    }

    /// Test Vector 1: note commitment H(pubKeyX, amount)
    #[test]
    fn test_vector_1_commitment() {
        let engine = HashEngine::new().unwrap();
        assert_eq!(
            engine.commitment(&FieldElement::from_u64(67890), 100_000_000),
            fe("0x215a252a2ead3037554d20f242970778bc22ec7fbced23dc108699d897316cb2")
        );
    }

    /// Test Vector 2: Merkle node over two empty leaves is the level-1 zero hash
    #[test]
    fn test_vector_2_zero_node() {
        let engine = HashEngine::new().unwrap();
        let zero = FieldElement::zero();
        assert_eq!(
            engine.merkle_node(&zero, &zero),
            fe("0x2098f5fb9e239eab3ceac3f27b81e481dc3124d55ffed523a839ee8446b64864")
        );
    }

    /// Test Vector 3: nullifier hash is arity-1 Poseidon
    #[test]
    fn test_vector_3_nullifier_hash() {
        let engine = HashEngine::new().unwrap();
        assert_eq!(
            engine.nullifier_hash(&FieldElement::from_u64(1)),
            fe("0x29176100eaa962bdc1fe6c654d6a3c130e96a4d1168b33848b897dc502820133")
        );
    }

    /// Test Vector 4: yield-position commitment is arity-3 Poseidon
    #[test]
    fn test_vector_4_pool_commitment() {
        let engine = HashEngine::new().unwrap();
        assert_eq!(
            engine.pool_commitment(&FieldElement::from_u64(1), 2, 3),
            fe("0x0e7732d89e6939c0ff03d5e58dab6302f3230e269dc5b968f725df34ab36d732")
        );
    }

    /// Test Vector 5: nullifier H(sk, leafIndex) agrees with the generic entry point
    #[test]
    fn test_vector_5_nullifier() {
        let engine = HashEngine::new().unwrap();
        let sk = FieldElement::from_u64(67890);
        assert_eq!(
            engine.nullifier(&sk, 7),
            engine.hash(&[sk, FieldElement::from_u64(7)]).unwrap()
        );
    }
}

#[cfg(test)]
mod tree_vectors {
    use crate::crypto::{FieldElement, HashEngine};
    use crate::state::{commitment_tree_size, COMMITMENT_TREE_SIZE};
    use crate::tree::{Accumulator, LiveAccumulator, ZeroHashes};
    use std::sync::Arc;

    #[test]
    fn test_empty_root_depth_20() {
        let engine = Arc::new(HashEngine::new().unwrap());
        let tree = LiveAccumulator::new(engine, 20).unwrap();
        assert_eq!(
            tree.root().to_hex(),
            "0x2134e76ac5d21aab186c2be1dd8f84ee880a1e46eaf712f9d371b6df22191f3e"
        );
    }

    #[test]
    fn test_zero_hash_table_matches_engine() {
        let engine = HashEngine::new().unwrap();
        ZeroHashes::compute(&engine, 20).unwrap().verify_against_constants().unwrap();
    }

    #[test]
    fn test_single_leaf_root() {
        // Leaf 0 filled, every sibling is a zero hash
        let engine = Arc::new(HashEngine::new().unwrap());
        let zeros = ZeroHashes::compute(&engine, 20).unwrap();
        let leaf = FieldElement::from_u64(1);

        let expected = (0..20).fold(leaf, |node, level| engine.merkle_node(&node, &zeros.at(level)));

        let mut tree = LiveAccumulator::new(engine, 20).unwrap();
        tree.insert(leaf).unwrap();
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_account_sizes() {
        assert_eq!(COMMITMENT_TREE_SIZE, 3952);
        assert_eq!(commitment_tree_size(20, 100), 3952);
        assert_eq!(commitment_tree_size(1, 1), 8 + 32 + 8 + 32 + 32 + 4 + 60);
    }
}

#[cfg(test)]
#[allow(non_snake_case)] // Curve notation uses G, R, P
mod curve_vectors {
    use crate::crypto::{FieldElement, MetaAddress, Point, Scalar, StealthKeys, META_ADDRESS_BYTES};

    #[test]
    fn test_generator_coordinates() {
        let G = Point::generator();
        assert_eq!(G.x(), Some(FieldElement::from_u64(1)));
        assert_eq!(
            G.y().unwrap().to_hex(),
            "0x0000000000000002cf135e7506a45d632d270d45f1181294833fc48d823f272c"
        );
    }

    #[test]
    fn test_double_generator() {
        let G2 = Point::mul_generator(&Scalar::from_u64(2));
        assert_eq!(
            G2.x().unwrap().to_hex(),
            "0x06ce1b0827aafa85ddeb49cdaa36306d19a74caa311e13d46d8bc688cdbffffe"
        );
        assert_eq!(
            G2.y().unwrap().to_hex(),
            "0x1c122f81a3a14964909ede0ba2a6855fc93faf6fa1a788bf467be7e7a43f80ac"
        );
    }

    #[test]
    fn test_generator_compressed_encoding() {
        let encoded = Point::generator().encode_compressed();
        // y of G is even
        assert_eq!(encoded[0], 0x02);
        assert_eq!(encoded[32], 0x01);
        assert!(encoded[1..32].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_meta_address_layout() {
        let keys = StealthKeys::from_seed(b"meta address vector").unwrap();
        let meta = keys.meta_address();
        let bytes = meta.to_bytes();

        assert_eq!(bytes.len(), META_ADDRESS_BYTES);
        assert_eq!(bytes[..33], meta.spend_pub.encode_compressed());
        assert_eq!(bytes[33..], meta.view_pub.encode_compressed());
        assert!(meta.encode().starts_with("stealth:"));
        assert_eq!(MetaAddress::parse(&meta.encode()).unwrap(), meta);
    }

    #[test]
    fn test_seed_derivation_is_stable() {
        let a = StealthKeys::from_seed(b"seed").unwrap();
        let b = StealthKeys::from_seed(b"seed").unwrap();
        let c = StealthKeys::from_seed(b"seed2").unwrap();
        assert_eq!(a.meta_address(), b.meta_address());
        assert_ne!(a.meta_address(), c.meta_address());
        assert_ne!(a.view_pub, a.spend_pub);
    }
}
