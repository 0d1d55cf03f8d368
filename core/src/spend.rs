//! Local guard against preparing two spends of one position

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;

use crate::crypto::field::FieldElement;
use crate::error::{Result, ShieldError};

/// Nullifier hashes of spends this client has prepared
///
/// Nullifiers are bound to `(privateScalar, leafIndex)`, so one nullifier
/// hash identifies one spendable position. The ledger stays authoritative;
/// this only stops the client from racing itself.
#[derive(Debug, Default)]
pub struct SpendRegistry {
    in_flight: Mutex<HashSet<FieldElement>>,
}

impl SpendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashSet<FieldElement>> {
        // Each critical section is one set operation, so a poisoned lock is still consistent
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a spend; fails with `DuplicateSpend` if already prepared
    pub fn begin(&self, nullifier_hash: FieldElement) -> Result<()> {
        if !self.entries().insert(nullifier_hash) {
            return Err(ShieldError::DuplicateSpend {
                nullifier_hash: nullifier_hash.to_hex(),
            });
        }
        debug!(nullifier_hash = %nullifier_hash, "spend registered");
        Ok(())
    }

    /// Forget a prepared spend, e.g. after the submission failed
    pub fn release(&self, nullifier_hash: &FieldElement) -> bool {
        self.entries().remove(nullifier_hash)
    }

    pub fn contains(&self, nullifier_hash: &FieldElement) -> bool {
        self.entries().contains(nullifier_hash)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_duplicate_rejected_until_released() {
        let registry = SpendRegistry::new();
        let hash = FieldElement::from_u64(77);

        registry.begin(hash).unwrap();
        assert!(matches!(registry.begin(hash), Err(ShieldError::DuplicateSpend { .. })));
        assert!(registry.contains(&hash));

        assert!(registry.release(&hash));
        assert!(!registry.release(&hash));
        registry.begin(hash).unwrap();
    }

    #[test]
    fn test_concurrent_begin_single_winner() {
        let registry = Arc::new(SpendRegistry::new());
        let hash = FieldElement::from_u64(5);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.begin(hash).is_ok())
            })
            .collect();
        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }
}
