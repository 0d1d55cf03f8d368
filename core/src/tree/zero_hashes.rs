//! Empty-subtree hashes
//!
//! `zero[0] = 0`, `zero[i] = H(zero[i-1], zero[i-1])`. `zero[D]` is the root
//! of an empty tree of depth `D`. The table for depth 20 is pinned below so
//! a parameter or encoding drift in the hash engine is caught at startup.

use crate::crypto::field::{FieldElement, FIELD_BYTES};
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};

/// Depth of the ledger's commitment tree
pub const DEFAULT_TREE_DEPTH: usize = 20;

/// Deepest tree the accumulators accept
pub const MAX_TREE_DEPTH: usize = 32;

/// Precomputed zero hashes for levels 0..=20, big-endian
pub const ZERO_HASHES_DEPTH_20: [[u8; FIELD_BYTES]; DEFAULT_TREE_DEPTH + 1] = [
    // Level 0
    [
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ],
    // Level 1
    [
        0x20, 0x98, 0xf5, 0xfb, 0x9e, 0x23, 0x9e, 0xab,
        0x3c, 0xea, 0xc3, 0xf2, 0x7b, 0x81, 0xe4, 0x81,
        0xdc, 0x31, 0x24, 0xd5, 0x5f, 0xfe, 0xd5, 0x23,
        0xa8, 0x39, 0xee, 0x84, 0x46, 0xb6, 0x48, 0x64,
    ],
    // Level 2
    [
        0x10, 0x69, 0x67, 0x3d, 0xcd, 0xb1, 0x22, 0x63,
        0xdf, 0x30, 0x1a, 0x6f, 0xf5, 0x84, 0xa7, 0xec,
        0x26, 0x1a, 0x44, 0xcb, 0x9d, 0xc6, 0x8d, 0xf0,
        0x67, 0xa4, 0x77, 0x44, 0x60, 0xb1, 0xf1, 0xe1,
    ],
    // Level 3
    [
        0x18, 0xf4, 0x33, 0x31, 0x53, 0x7e, 0xe2, 0xaf,
        0x2e, 0x3d, 0x75, 0x8d, 0x50, 0xf7, 0x21, 0x06,
        0x46, 0x7c, 0x6e, 0xea, 0x50, 0x37, 0x1d, 0xd5,
        0x28, 0xd5, 0x7e, 0xb2, 0xb8, 0x56, 0xd2, 0x38,
    ],
    // Level 4
    [
        0x07, 0xf9, 0xd8, 0x37, 0xcb, 0x17, 0xb0, 0xd3,
        0x63, 0x20, 0xff, 0xe9, 0x3b, 0xa5, 0x23, 0x45,
        0xf1, 0xb7, 0x28, 0x57, 0x1a, 0x56, 0x82, 0x65,
        0xca, 0xac, 0x97, 0x55, 0x9d, 0xbc, 0x95, 0x2a,
    ],
    // Level 5
    [
        0x2b, 0x94, 0xcf, 0x5e, 0x87, 0x46, 0xb3, 0xf5,
        0xc9, 0x63, 0x1f, 0x4c, 0x5d, 0xf3, 0x29, 0x07,
        0xa6, 0x99, 0xc5, 0x8c, 0x94, 0xb2, 0xad, 0x4d,
        0x7b, 0x5c, 0xec, 0x16, 0x39, 0x18, 0x3f, 0x55,
    ],
    // Level 6
    [
        0x2d, 0xee, 0x93, 0xc5, 0xa6, 0x66, 0x45, 0x96,
        0x46, 0xea, 0x7d, 0x22, 0xcc, 0xa9, 0xe1, 0xbc,
        0xfe, 0xd7, 0x1e, 0x69, 0x51, 0xb9, 0x53, 0x61,
        0x1d, 0x11, 0xdd, 0xa3, 0x2e, 0xa0, 0x9d, 0x78,
    ],
    // Level 7
    [
        0x07, 0x82, 0x95, 0xe5, 0xa2, 0x2b, 0x84, 0xe9,
        0x82, 0xcf, 0x60, 0x1e, 0xb6, 0x39, 0x59, 0x7b,
        0x8b, 0x05, 0x15, 0xa8, 0x8c, 0xb5, 0xac, 0x7f,
        0xa8, 0xa4, 0xaa, 0xbe, 0x3c, 0x87, 0x34, 0x9d,
    ],
    // Level 8
    [
        0x2f, 0xa5, 0xe5, 0xf1, 0x8f, 0x60, 0x27, 0xa6,
        0x50, 0x1b, 0xec, 0x86, 0x45, 0x64, 0x47, 0x2a,
        0x61, 0x6b, 0x2e, 0x27, 0x4a, 0x41, 0x21, 0x1a,
        0x44, 0x4c, 0xbe, 0x3a, 0x99, 0xf3, 0xcc, 0x61,
    ],
    // Level 9
    [
        0x0e, 0x88, 0x43, 0x76, 0xd0, 0xd8, 0xfd, 0x21,
        0xec, 0xb7, 0x80, 0x38, 0x9e, 0x94, 0x1f, 0x66,
        0xe4, 0x5e, 0x7a, 0xcc, 0xe3, 0xe2, 0x28, 0xab,
        0x3e, 0x21, 0x56, 0xa6, 0x14, 0xfc, 0xd7, 0x47,
    ],
    // Level 10
    [
        0x1b, 0x72, 0x01, 0xda, 0x72, 0x49, 0x4f, 0x1e,
        0x28, 0x71, 0x7a, 0xd1, 0xa5, 0x2e, 0xb4, 0x69,
        0xf9, 0x58, 0x92, 0xf9, 0x57, 0x71, 0x35, 0x33,
        0xde, 0x61, 0x75, 0xe5, 0xda, 0x19, 0x0a, 0xf2,
    ],
    // Level 11
    [
        0x1f, 0x8d, 0x88, 0x22, 0x72, 0x5e, 0x36, 0x38,
        0x52, 0x00, 0xc0, 0xb2, 0x01, 0x24, 0x98, 0x19,
        0xa6, 0xe6, 0xe1, 0xe4, 0x65, 0x08, 0x08, 0xb5,
        0xbe, 0xbc, 0x6b, 0xfa, 0xce, 0x7d, 0x76, 0x36,
    ],
    // Level 12
    [
        0x2c, 0x5d, 0x82, 0xf6, 0x6c, 0x91, 0x4b, 0xaf,
        0xb9, 0x70, 0x15, 0x89, 0xba, 0x8c, 0xfc, 0xfb,
        0x61, 0x62, 0xb0, 0xa1, 0x2a, 0xcf, 0x88, 0xa8,
        0xd0, 0x87, 0x9a, 0x04, 0x71, 0xb5, 0xf8, 0x5a,
    ],
    // Level 13
    [
        0x14, 0xc5, 0x41, 0x48, 0xa0, 0x94, 0x0b, 0xb8,
        0x20, 0x95, 0x7f, 0x5a, 0xdf, 0x3f, 0xa1, 0x13,
        0x4e, 0xf5, 0xc4, 0xaa, 0xa1, 0x13, 0xf4, 0x64,
        0x64, 0x58, 0xf2, 0x70, 0xe0, 0xbf, 0xbf, 0xd0,
    ],
    // Level 14
    [
        0x19, 0x0d, 0x33, 0xb1, 0x2f, 0x98, 0x6f, 0x96,
        0x1e, 0x10, 0xc0, 0xee, 0x44, 0xd8, 0xb9, 0xaf,
        0x11, 0xbe, 0x25, 0x58, 0x8c, 0xad, 0x89, 0xd4,
        0x16, 0x11, 0x8e, 0x4b, 0xf4, 0xeb, 0xe8, 0x0c,
    ],
    // Level 15
    [
        0x22, 0xf9, 0x8a, 0xa9, 0xce, 0x70, 0x41, 0x52,
        0xac, 0x17, 0x35, 0x49, 0x14, 0xad, 0x73, 0xed,
        0x11, 0x67, 0xae, 0x65, 0x96, 0xaf, 0x51, 0x0a,
        0xa5, 0xb3, 0x64, 0x93, 0x25, 0xe0, 0x6c, 0x92,
    ],
    // Level 16
    [
        0x2a, 0x7c, 0x7c, 0x9b, 0x6c, 0xe5, 0x88, 0x0b,
        0x9f, 0x6f, 0x22, 0x8d, 0x72, 0xbf, 0x6a, 0x57,
        0x5a, 0x52, 0x6f, 0x29, 0xc6, 0x6e, 0xcc, 0xee,
        0xf8, 0xb7, 0x53, 0xd3, 0x8b, 0xba, 0x73, 0x23,
    ],
    // Level 17
    [
        0x2e, 0x81, 0x86, 0xe5, 0x58, 0x69, 0x8e, 0xc1,
        0xc6, 0x7a, 0xf9, 0xc1, 0x4d, 0x46, 0x3f, 0xfc,
        0x47, 0x00, 0x43, 0xc9, 0xc2, 0x98, 0x8b, 0x95,
        0x4d, 0x75, 0xdd, 0x64, 0x3f, 0x36, 0xb9, 0x92,
    ],
    // Level 18
    [
        0x0f, 0x57, 0xc5, 0x57, 0x1e, 0x9a, 0x4e, 0xab,
        0x49, 0xe2, 0xc8, 0xcf, 0x05, 0x0d, 0xae, 0x94,
        0x8a, 0xef, 0x6e, 0xad, 0x64, 0x73, 0x92, 0x27,
        0x35, 0x46, 0x24, 0x9d, 0x1c, 0x1f, 0xf1, 0x0f,
    ],
    // Level 19
    [
        0x18, 0x30, 0xee, 0x67, 0xb5, 0xfb, 0x55, 0x4a,
        0xd5, 0xf6, 0x3d, 0x43, 0x88, 0x80, 0x0e, 0x1c,
        0xfe, 0x78, 0xe3, 0x10, 0x69, 0x7d, 0x46, 0xe4,
        0x3c, 0x9c, 0xe3, 0x61, 0x34, 0xf7, 0x2c, 0xca,
    ],
    // Level 20
    [
        0x21, 0x34, 0xe7, 0x6a, 0xc5, 0xd2, 0x1a, 0xab,
        0x18, 0x6c, 0x2b, 0xe1, 0xdd, 0x8f, 0x84, 0xee,
        0x88, 0x0a, 0x1e, 0x46, 0xea, 0xf7, 0x12, 0xf9,
        0xd3, 0x71, 0xb6, 0xdf, 0x22, 0x19, 0x1f, 0x3e,
    ],
];

/// Zero hashes for levels `0..=depth`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZeroHashes {
    levels: Vec<FieldElement>,
}

impl ZeroHashes {
    pub fn compute(engine: &HashEngine, depth: usize) -> Result<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(ShieldError::Config(format!(
                "tree depth {} outside 1..={}",
                depth, MAX_TREE_DEPTH
            )));
        }

        let mut levels = Vec::with_capacity(depth + 1);
        let mut current = FieldElement::zero();
        levels.push(current);
        for _ in 0..depth {
            current = engine.merkle_node(&current, &current);
            levels.push(current);
        }
        Ok(Self { levels })
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Hash of an empty subtree of height `level`
    pub fn at(&self, level: usize) -> FieldElement {
        self.levels[level]
    }

    pub fn empty_root(&self) -> FieldElement {
        self.levels[self.depth()]
    }

    pub fn as_slice(&self) -> &[FieldElement] {
        &self.levels
    }

    /// Compare every level shared with the pinned depth-20 table
    pub fn verify_against_constants(&self) -> Result<()> {
        for (level, (computed, pinned)) in self.levels.iter().zip(ZERO_HASHES_DEPTH_20.iter()).enumerate() {
            if computed.to_be_bytes() != *pinned {
                return Err(ShieldError::DepthMismatch {
                    expected: format!("level {} = 0x{}", level, hex::encode(pinned)),
                    actual: computed.to_hex(),
                });
            }
        }
        Ok(())
    }

    /// Startup cross-check of the empty root against a configured value
    pub fn check_empty_root(&self, expected: &FieldElement) -> Result<()> {
        let actual = self.empty_root();
        if actual != *expected {
            return Err(ShieldError::DepthMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }
}
