//! Remote commitment tree account
//!
//! Fixed layout, all integers little-endian, field elements big-endian:
//!
//! | offset | size        | field              |
//! |--------|-------------|--------------------|
//! | 0      | 1           | discriminator 0x05 |
//! | 1      | 1           | bump               |
//! | 2      | 6           | padding            |
//! | 8      | 32          | current root       |
//! | 40     | 8           | next index         |
//! | 48     | 32 · D      | frontier           |
//! | ..     | 32 · H      | root history       |
//! | ..     | 4           | root history index |
//! | ..     | 60          | reserved           |
//!
//! With D = 20 and H = 100 the account is 3952 bytes.

use crate::crypto::field::{FieldElement, FIELD_BYTES};
use crate::error::{Result, ShieldError};
use crate::tree::live::{LiveAccumulator, TreeSnapshot, DEFAULT_ROOT_HISTORY_SIZE};
use crate::tree::zero_hashes::DEFAULT_TREE_DEPTH;

/// Account discriminator for the commitment tree
pub const COMMITMENT_TREE_DISCRIMINATOR: u8 = 0x05;

const HEADER_BYTES: usize = 1 + 1 + 6;
const RESERVED_BYTES: usize = 60;

/// Account size for a given depth and history length
pub const fn commitment_tree_size(depth: usize, history: usize) -> usize {
    HEADER_BYTES + FIELD_BYTES + 8 + FIELD_BYTES * depth + FIELD_BYTES * history + 4 + RESERVED_BYTES
}

/// Size of the ledger's account (depth 20, 100 roots)
pub const COMMITMENT_TREE_SIZE: usize = commitment_tree_size(DEFAULT_TREE_DEPTH, DEFAULT_ROOT_HISTORY_SIZE);

/// Parsed commitment tree account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteTreeState {
    pub bump: u8,
    pub root: FieldElement,
    pub next_index: u64,
    pub frontier: Vec<FieldElement>,
    /// Ring buffer of previous roots in storage order
    pub root_history: Vec<FieldElement>,
    /// Total writes into the ring; the next slot is this value modulo its length
    pub root_history_index: u32,
}

/// Sequential reader over account bytes
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset + len;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| ShieldError::malformed_state(format!("truncated at offset {}", self.offset)))?;
        self.offset = end;
        Ok(bytes)
    }

    fn field(&mut self, what: &str) -> Result<FieldElement> {
        let offset = self.offset;
        let bytes = self.take(FIELD_BYTES)?;
        FieldElement::from_be_slice(bytes)
            .map_err(|_| ShieldError::malformed_state(format!("{} at offset {} is not canonical", what, offset)))
    }

    fn u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }
}

impl RemoteTreeState {
    /// Parse the ledger's account layout (depth 20, 100 roots)
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with_layout(data, DEFAULT_TREE_DEPTH, DEFAULT_ROOT_HISTORY_SIZE)
    }

    pub fn parse_with_layout(data: &[u8], depth: usize, history: usize) -> Result<Self> {
        let expected = commitment_tree_size(depth, history);
        if data.len() != expected {
            return Err(ShieldError::malformed_state(format!(
                "account is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        if data[0] != COMMITMENT_TREE_DISCRIMINATOR {
            return Err(ShieldError::malformed_state(format!(
                "discriminator 0x{:02x}, expected 0x{:02x}",
                data[0], COMMITMENT_TREE_DISCRIMINATOR
            )));
        }

        let mut cursor = Cursor { data, offset: 0 };
        let header = cursor.take(HEADER_BYTES)?;
        let bump = header[1];

        let root = cursor.field("root")?;
        let next_index = cursor.u64_le()?;
        let frontier = (0..depth)
            .map(|_| cursor.field("frontier node"))
            .collect::<Result<Vec<_>>>()?;
        let root_history = (0..history)
            .map(|_| cursor.field("historical root"))
            .collect::<Result<Vec<_>>>()?;
        let root_history_index = cursor.u32_le()?;
        cursor.take(RESERVED_BYTES)?;

        let capacity = 1u64 << depth;
        if next_index > capacity {
            return Err(ShieldError::malformed_state(format!(
                "next index {} exceeds capacity {}",
                next_index, capacity
            )));
        }

        Ok(Self { bump, root, next_index, frontier, root_history, root_history_index })
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            root: self.root,
            frontier: self.frontier.clone(),
            next_index: self.next_index,
        }
    }

    /// Historical roots oldest first, skipping never-written (zero) slots
    pub fn roots_oldest_first(&self) -> Vec<FieldElement> {
        let len = self.root_history.len();
        if len == 0 {
            return Vec::new();
        }
        let start = self.root_history_index as usize % len;
        (0..len)
            .map(|i| self.root_history[(start + i) % len])
            .filter(|root| !root.is_zero())
            .collect()
    }

    /// Import this account into a live accumulator, root history included
    pub fn apply_to(&self, accumulator: &mut LiveAccumulator) -> Result<()> {
        accumulator.import_remote_state(&self.snapshot())?;
        accumulator.restore_root_history(self.roots_oldest_first());
        Ok(())
    }

    /// Serialize back into the account layout
    pub fn to_account_data(&self) -> Vec<u8> {
        let size = commitment_tree_size(self.frontier.len(), self.root_history.len());
        let mut data = Vec::with_capacity(size);
        data.push(COMMITMENT_TREE_DISCRIMINATOR);
        data.push(self.bump);
        data.extend_from_slice(&[0u8; 6]);
        data.extend_from_slice(&self.root.to_be_bytes());
        data.extend_from_slice(&self.next_index.to_le_bytes());
        for node in &self.frontier {
            data.extend_from_slice(&node.to_be_bytes());
        }
        for root in &self.root_history {
            data.extend_from_slice(&root.to_be_bytes());
        }
        data.extend_from_slice(&self.root_history_index.to_le_bytes());
        data.extend_from_slice(&[0u8; RESERVED_BYTES]);
        data
    }
}
