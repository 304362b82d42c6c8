//! spent-set client
//!
//! a nullifier is spent when either of its two marker accounts exists on
//! chain. markers are pdas over the little-endian reversal of the
//! nullifier's big-endian bytes, one per seed prefix.

use ark_bn254::Fr;
use komuso_pool::field;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::error::Result;
use crate::relayer::RelayerApi;
use crate::SPENT_CHECK_BATCH;

/// seed prefixes for the two marker accounts of one nullifier
pub const NULLIFIER_SEED_0: &[u8] = b"nullifier0";
pub const NULLIFIER_SEED_1: &[u8] = b"nullifier1";

/// both marker pdas for one nullifier
pub fn nullifier_marker_pdas(nullifier: &Fr, program_id: &Pubkey) -> (Pubkey, Pubkey) {
    let seed = field::fr_to_le_bytes(nullifier);
    let (marker0, _) = Pubkey::find_program_address(&[NULLIFIER_SEED_0, &seed], program_id);
    let (marker1, _) = Pubkey::find_program_address(&[NULLIFIER_SEED_1, &seed], program_id);
    (marker0, marker1)
}

/// cross-check pdas: the two inputs' nullifiers swapped against the two
/// prefixes, so the program can prove the four accounts do not collide
pub fn cross_check_marker_pdas(
    nullifier0: &Fr,
    nullifier1: &Fr,
    program_id: &Pubkey,
) -> (Pubkey, Pubkey) {
    let seed0 = field::fr_to_le_bytes(nullifier1);
    let seed1 = field::fr_to_le_bytes(nullifier0);
    let (marker2, _) = Pubkey::find_program_address(&[NULLIFIER_SEED_0, &seed0], program_id);
    let (marker3, _) = Pubkey::find_program_address(&[NULLIFIER_SEED_1, &seed1], program_id);
    (marker2, marker3)
}

/// batched existence lookup over the relayer
pub struct SpentSet {
    relayer: Arc<dyn RelayerApi>,
}

impl SpentSet {
    pub fn new(relayer: Arc<dyn RelayerApi>) -> Self {
        Self { relayer }
    }

    /// spent flag per nullifier, aligned with the input order
    pub async fn is_spent(&self, nullifiers: &[Fr]) -> Result<Vec<bool>> {
        let mut flags = Vec::with_capacity(nullifiers.len());
        for batch in nullifiers.chunks(SPENT_CHECK_BATCH) {
            flags.extend(self.relayer.check_nullifiers(batch).await?);
        }
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn program_id() -> Pubkey {
        Pubkey::from_str("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin").unwrap()
    }

    #[test]
    fn test_markers_deterministic_and_distinct() {
        let n = Fr::from(123456789u64);
        let (a0, a1) = nullifier_marker_pdas(&n, &program_id());
        let (b0, b1) = nullifier_marker_pdas(&n, &program_id());

        assert_eq!(a0, b0);
        assert_eq!(a1, b1);
        // the two prefixes give different accounts
        assert_ne!(a0, a1);
    }

    #[test]
    fn test_markers_depend_on_nullifier() {
        let (a0, _) = nullifier_marker_pdas(&Fr::from(1u64), &program_id());
        let (b0, _) = nullifier_marker_pdas(&Fr::from(2u64), &program_id());
        assert_ne!(a0, b0);
    }

    #[test]
    fn test_cross_check_swaps_inputs() {
        let n0 = Fr::from(111u64);
        let n1 = Fr::from(222u64);

        let (m0, m1) = nullifier_marker_pdas(&n0, &program_id());
        let (m2, m3) = cross_check_marker_pdas(&n0, &n1, &program_id());
        let (other0, other1) = nullifier_marker_pdas(&n1, &program_id());

        // marker2 is n1 under prefix 0; marker3 is n0 under prefix 1
        assert_eq!(m2, other0);
        assert_eq!(m3, m1_of(&n0, &program_id()));
        assert_ne!(m2, m0);
        assert_ne!(m3, other1);

        fn m1_of(n: &Fr, program: &Pubkey) -> Pubkey {
            nullifier_marker_pdas(n, program).1
        }
    }
}
