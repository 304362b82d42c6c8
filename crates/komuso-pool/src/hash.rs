//! poseidon / sha-256 adapter
//!
//! commitments, nullifiers and note signatures go through poseidon over the
//! bn254 scalar field with the circom parameterization; the ext-data binding
//! goes through sha-256.

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher};
use sha2::{Digest, Sha256};

use crate::error::{PoolError, Result};

/// poseidon hash over 1..=4 field elements
pub fn poseidon(inputs: &[Fr]) -> Result<Fr> {
    let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())
        .map_err(|e| PoolError::Poseidon(e.to_string()))?;
    hasher
        .hash(inputs)
        .map_err(|e| PoolError::Poseidon(e.to_string()))
}

/// sha-256 digest
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
