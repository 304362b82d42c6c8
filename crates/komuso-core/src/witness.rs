//! groth16 witness assembly
//!
//! the circuit input contract: two inputs, two outputs, a 26-level path per
//! input, and the public (root, publicAmount, extDataHash, nullifiers,
//! commitments) tuple. the prover consumes everything as decimal strings
//! through the circom witness generator.

use ark_bn254::Fr;
use ark_ff::Zero;
use komuso_pool::{field, hash, TREE_DEPTH};
use num_bigint::{BigInt, Sign};

use crate::error::{EngineError, Result};
use crate::planner::{public_amount, TxPlan};

/// fully assembled circuit input
#[derive(Clone, Debug)]
pub struct ProofInput {
    pub root: Fr,
    pub input_nullifiers: [Fr; 2],
    pub output_commitments: [Fr; 2],
    pub public_amount: Fr,
    pub ext_data_hash: Fr,
    pub in_amounts: [u64; 2],
    pub in_private_keys: [Fr; 2],
    pub in_blindings: [Fr; 2],
    pub in_path_indices: [u64; 2],
    pub in_path_elements: [Vec<Fr>; 2],
    pub out_amounts: [u64; 2],
    pub out_blindings: [Fr; 2],
    pub out_pubkeys: [Fr; 2],
    pub asset: Fr,
}

/// the all-zero path used for dummy inputs
pub fn zero_path() -> Vec<Fr> {
    vec![Fr::zero(); TREE_DEPTH]
}

/// assemble the circuit input from a plan and the authoritative tree data
///
/// the plan's input indices must already be the ones reported by the
/// inclusion-proof service; nullifiers derived from stale indices verify
/// nothing
pub fn build_proof_input(
    plan: &TxPlan,
    root: Fr,
    input_paths: [Vec<Fr>; 2],
    ext_data_hash: Fr,
) -> Result<ProofInput> {
    for path in &input_paths {
        if path.len() != TREE_DEPTH {
            return Err(EngineError::WitnessGeneration(format!(
                "path has {} elements, tree depth is {}",
                path.len(),
                TREE_DEPTH
            )));
        }
    }

    let input_nullifiers = [plan.inputs[0].nullifier()?, plan.inputs[1].nullifier()?];
    let output_commitments = [plan.outputs[0].commitment()?, plan.outputs[1].commitment()?];

    let input = ProofInput {
        root,
        input_nullifiers,
        output_commitments,
        public_amount: public_amount(plan.ext_amount, plan.fee),
        ext_data_hash,
        in_amounts: [plan.inputs[0].amount, plan.inputs[1].amount],
        in_private_keys: [plan.inputs[0].keypair.privkey(), plan.inputs[1].keypair.privkey()],
        in_blindings: [plan.inputs[0].blinding, plan.inputs[1].blinding],
        in_path_indices: [plan.inputs[0].index, plan.inputs[1].index],
        in_path_elements: input_paths,
        out_amounts: [plan.outputs[0].amount, plan.outputs[1].amount],
        out_blindings: [plan.outputs[0].blinding, plan.outputs[1].blinding],
        out_pubkeys: [plan.outputs[0].keypair.pubkey(), plan.outputs[1].keypair.pubkey()],
        asset: plan.inputs[0].asset.field_element(),
    };
    input.validate()?;
    Ok(input)
}

impl ProofInput {
    /// catch the circuit's common failure signals before burning prover
    /// time: balance-equation violations, nullifier discrepancies, and
    /// output-commitment mismatches
    pub fn validate(&self) -> Result<()> {
        let in_sum = Fr::from(self.in_amounts[0]) + Fr::from(self.in_amounts[1]);
        let out_sum = Fr::from(self.out_amounts[0]) + Fr::from(self.out_amounts[1]);
        if in_sum + self.public_amount != out_sum {
            return Err(EngineError::WitnessGeneration(format!(
                "balance equation: in {} + public {} != out {}",
                field::fr_to_decimal(&in_sum),
                field::fr_to_decimal(&self.public_amount),
                field::fr_to_decimal(&out_sum),
            )));
        }

        for i in 0..2 {
            let pubkey = hash::poseidon(&[self.in_private_keys[i]])?;
            let commitment = hash::poseidon(&[
                Fr::from(self.in_amounts[i]),
                pubkey,
                self.in_blindings[i],
                self.asset,
            ])?;
            let index = Fr::from(self.in_path_indices[i]);
            let signature = hash::poseidon(&[self.in_private_keys[i], commitment, index])?;
            let nullifier = hash::poseidon(&[commitment, index, signature])?;
            if nullifier != self.input_nullifiers[i] {
                return Err(EngineError::WitnessGeneration(format!(
                    "input {} nullifier does not derive from its witness fields",
                    i
                )));
            }

            let commitment = hash::poseidon(&[
                Fr::from(self.out_amounts[i]),
                self.out_pubkeys[i],
                self.out_blindings[i],
                self.asset,
            ])?;
            if commitment != self.output_commitments[i] {
                return Err(EngineError::WitnessGeneration(format!(
                    "output {} commitment does not derive from its witness fields",
                    i
                )));
            }
        }
        Ok(())
    }

    /// name -> values map for the circom witness generator; array inputs
    /// flatten in push order
    pub fn to_circom_inputs(&self) -> Vec<(&'static str, Vec<BigInt>)> {
        let one = |v: &Fr| vec![fr_to_bigint(v)];
        let two = |a: &Fr, b: &Fr| vec![fr_to_bigint(a), fr_to_bigint(b)];

        vec![
            ("root", one(&self.root)),
            ("publicAmount", one(&self.public_amount)),
            ("extDataHash", one(&self.ext_data_hash)),
            ("inputNullifier", two(&self.input_nullifiers[0], &self.input_nullifiers[1])),
            ("outputCommitment", two(&self.output_commitments[0], &self.output_commitments[1])),
            ("inAmount", vec![BigInt::from(self.in_amounts[0]), BigInt::from(self.in_amounts[1])]),
            ("inPrivateKey", two(&self.in_private_keys[0], &self.in_private_keys[1])),
            ("inBlinding", two(&self.in_blindings[0], &self.in_blindings[1])),
            (
                "inPathIndices",
                vec![BigInt::from(self.in_path_indices[0]), BigInt::from(self.in_path_indices[1])],
            ),
            (
                "inPathElements",
                self.in_path_elements
                    .iter()
                    .flat_map(|path| path.iter().map(fr_to_bigint))
                    .collect(),
            ),
            ("outAmount", vec![BigInt::from(self.out_amounts[0]), BigInt::from(self.out_amounts[1])]),
            ("outBlinding", two(&self.out_blindings[0], &self.out_blindings[1])),
            ("outPubkey", two(&self.out_pubkeys[0], &self.out_pubkeys[1])),
            ("assetTag", one(&self.asset)),
        ]
    }

    /// the seven public signals in canonical wire order
    pub fn public_signals(&self) -> [[u8; 32]; 7] {
        [
            field::fr_to_be_bytes(&self.root),
            field::fr_to_be_bytes(&self.public_amount),
            field::fr_to_be_bytes(&self.ext_data_hash),
            field::fr_to_be_bytes(&self.input_nullifiers[0]),
            field::fr_to_be_bytes(&self.input_nullifiers[1]),
            field::fr_to_be_bytes(&self.output_commitments[0]),
            field::fr_to_be_bytes(&self.output_commitments[1]),
        ]
    }
}

fn fr_to_bigint(v: &Fr) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &field::fr_to_be_bytes(v))
}
