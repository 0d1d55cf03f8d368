//! Poseidon commitment hash engine
//!
//! Circom-compatible Poseidon over BN254 `Fr` (x^5 S-box, 8 full rounds,
//! width `t = n + 1`), computed by `light-poseidon`'s circom hasher. One
//! hasher per arity is built once per engine.
//!
//! The engine can be shared freely behind an `Arc`; each hasher sits behind
//! its own lock since hashing mutates the sponge state. There is no
//! process-wide instance: callers own a [`HashEngine`] directly or through an
//! [`EngineCell`].

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher};
use tracing::debug;

use crate::crypto::field::FieldElement;
use crate::error::{Result, ShieldError};

/// Largest number of inputs the engine accepts
pub const MAX_ARITY: usize = 4;

/// Circom hasher for exactly `N` inputs
struct CircomHasher<const N: usize> {
    inner: Mutex<Poseidon<Fr>>,
}

impl<const N: usize> CircomHasher<N> {
    fn load() -> Result<Self> {
        let mut hasher = Poseidon::<Fr>::new_circom(N)
            .map_err(|e| ShieldError::Poseidon(format!("arity {}: {}", N, e)))?;
        // Reject parameter sets whose width disagrees with N up front
        hasher
            .hash(&[Fr::from(0u64); N])
            .map_err(|e| ShieldError::Poseidon(format!("arity {}: {}", N, e)))?;
        Ok(Self { inner: Mutex::new(hasher) })
    }

    fn hash(&self, inputs: &[FieldElement; N]) -> FieldElement {
        let raw = inputs.map(|x| x.inner());
        let mut hasher = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match hasher.hash(&raw) {
            Ok(out) => FieldElement(out),
            // Width was checked in `load`; the input count is fixed by the type
            Err(e) => unreachable!("circom hasher of arity {} rejected {} inputs: {}", N, N, e),
        }
    }
}

/// Initialized Poseidon engine for arities 1 through 4
pub struct HashEngine {
    h1: CircomHasher<1>,
    h2: CircomHasher<2>,
    h3: CircomHasher<3>,
    h4: CircomHasher<4>,
}

impl HashEngine {
    /// Load the circom parameters for every supported arity
    pub fn new() -> Result<Self> {
        let engine = Self {
            h1: CircomHasher::load()?,
            h2: CircomHasher::load()?,
            h3: CircomHasher::load()?,
            h4: CircomHasher::load()?,
        };
        debug!(arities = MAX_ARITY, "poseidon hashers loaded");
        Ok(engine)
    }

    /// `H(inputs)` for 1 to 4 inputs
    pub fn hash(&self, inputs: &[FieldElement]) -> Result<FieldElement> {
        match *inputs {
            [a] => Ok(self.hash1(&a)),
            [a, b] => Ok(self.hash2(&a, &b)),
            [a, b, c] => Ok(self.hash3(&a, &b, &c)),
            [a, b, c, d] => Ok(self.hash4(&a, &b, &c, &d)),
            _ => Err(ShieldError::UnsupportedArity { arity: inputs.len() }),
        }
    }

    pub fn hash1(&self, a: &FieldElement) -> FieldElement {
        self.h1.hash(&[*a])
    }

    pub fn hash2(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        self.h2.hash(&[*a, *b])
    }

    pub fn hash3(&self, a: &FieldElement, b: &FieldElement, c: &FieldElement) -> FieldElement {
        self.h3.hash(&[*a, *b, *c])
    }

    pub fn hash4(
        &self,
        a: &FieldElement,
        b: &FieldElement,
        c: &FieldElement,
        d: &FieldElement,
    ) -> FieldElement {
        self.h4.hash(&[*a, *b, *c, *d])
    }

    // ========================================================================
    // Protocol compositions
    // ========================================================================

    /// `commitment = H(pubKeyX, amount)`
    pub fn commitment(&self, pub_key_x: &FieldElement, amount: u64) -> FieldElement {
        self.hash2(pub_key_x, &FieldElement::from_u64(amount))
    }

    /// `poolCommitment = H(pubKeyX, principal, epoch)`
    pub fn pool_commitment(&self, pub_key_x: &FieldElement, principal: u64, epoch: u64) -> FieldElement {
        self.hash3(pub_key_x, &FieldElement::from_u64(principal), &FieldElement::from_u64(epoch))
    }

    /// `nullifier = H(privateScalar, leafIndex)`
    pub fn nullifier(&self, private_scalar: &FieldElement, leaf_index: u64) -> FieldElement {
        self.hash2(private_scalar, &FieldElement::from_u64(leaf_index))
    }

    /// `nullifierHash = H(nullifier)`
    pub fn nullifier_hash(&self, nullifier: &FieldElement) -> FieldElement {
        self.hash1(nullifier)
    }

    /// Parent node of two Merkle children
    pub fn merkle_node(&self, left: &FieldElement, right: &FieldElement) -> FieldElement {
        self.hash2(left, right)
    }
}

impl std::fmt::Debug for HashEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashEngine")
            .field("arities", &MAX_ARITY)
            .finish()
    }
}

/// Caller-owned, race-safe one-time engine slot
///
/// Concurrent first callers of [`EngineCell::initialize`] converge on a
/// single engine. [`EngineCell::engine`] before initialization fails with
/// `NotInitialized` instead of loading parameters implicitly.
#[derive(Default)]
pub struct EngineCell {
    slot: OnceLock<Arc<HashEngine>>,
}

impl EngineCell {
    pub const fn new() -> Self {
        Self { slot: OnceLock::new() }
    }

    /// Build the engine if needed; idempotent
    pub fn initialize(&self) -> Result<Arc<HashEngine>> {
        if let Some(engine) = self.slot.get() {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(HashEngine::new()?);
        // A racing initializer may have won; either engine is equivalent
        let stored = self.slot.get_or_init(|| engine);
        Ok(Arc::clone(stored))
    }

    pub fn engine(&self) -> Result<Arc<HashEngine>> {
        self.slot.get().cloned().ok_or(ShieldError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}
