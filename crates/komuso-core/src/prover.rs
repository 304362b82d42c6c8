//! groth16 proving over circom artifacts
//!
//! drives the circom witness generator (wasm + r1cs) and a snarkjs proving
//! key (zkey), then lays the proof out in the verifier's byte order:
//! 32-byte big-endian limbs, `pi_a`/`pi_c` as flattened pairs, `pi_b` with
//! its inner pairs reversed.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ark_bn254::{Bn254, Fq, Fr, G1Affine, G2Affine};
use ark_circom::{read_zkey, CircomBuilder, CircomConfig, CircomReduction};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField, UniformRand};
use ark_groth16::{Groth16, Proof};
use async_trait::async_trait;
use num_bigint::BigUint;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::witness::ProofInput;

/// canonical byte layout of one proved transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvedTransaction {
    pub proof_a: [u8; 64],
    pub proof_b: [u8; 128],
    pub proof_c: [u8; 64],
    /// root, publicAmount, extDataHash, nullifiers, commitments
    pub public_signals: [[u8; 32]; 7],
}

impl ProvedTransaction {
    /// compressed form: x-only points with the sign of y in bit 7 of byte 0
    pub fn compressed(&self) -> ([u8; 32], [u8; 64], [u8; 32]) {
        (
            compress_g1(&self.proof_a),
            compress_g2(&self.proof_b),
            compress_g1(&self.proof_c),
        )
    }
}

/// the proving backend seam; stateless from the engine's perspective
#[async_trait]
pub trait ProofSystem: Send + Sync {
    async fn prove(&self, input: &ProofInput) -> Result<ProvedTransaction>;
}

/// groth16 prover over circom artifacts on disk
pub struct CircomProver {
    wasm: PathBuf,
    r1cs: PathBuf,
    zkey: PathBuf,
}

impl CircomProver {
    pub fn new(wasm: &Path, r1cs: &Path, zkey: &Path) -> Result<Self> {
        for artifact in [wasm, r1cs, zkey] {
            if !artifact.exists() {
                return Err(EngineError::CircuitArtifactsMissing(artifact.to_path_buf()));
            }
        }
        Ok(Self {
            wasm: wasm.to_path_buf(),
            r1cs: r1cs.to_path_buf(),
            zkey: zkey.to_path_buf(),
        })
    }

    fn prove_blocking(&self, input: &ProofInput) -> Result<ProvedTransaction> {
        let start = Instant::now();

        let cfg = CircomConfig::<Fr>::new(&self.wasm, &self.r1cs)
            .map_err(|e| EngineError::WitnessGeneration(format!("loading circuit: {}", e)))?;

        let mut builder = CircomBuilder::new(cfg);
        for (name, values) in input.to_circom_inputs() {
            for value in values {
                builder.push_input(name, value);
            }
        }

        // witness generation runs the circuit; failures here carry the
        // circom line and template when the generator exposes them
        let circuit = builder
            .build()
            .map_err(|e| EngineError::WitnessGeneration(e.to_string()))?;
        let assignment = circuit
            .witness
            .clone()
            .ok_or_else(|| EngineError::WitnessGeneration("witness missing".into()))?;
        debug!("witness generated in {:.2}s", start.elapsed().as_secs_f64());

        let mut zkey_file = std::fs::File::open(&self.zkey)?;
        let (proving_key, matrices) = read_zkey(&mut zkey_file)
            .map_err(|e| EngineError::WitnessGeneration(format!("reading zkey: {}", e)))?;

        let mut rng = ark_std::rand::thread_rng();
        let r = Fr::rand(&mut rng);
        let s = Fr::rand(&mut rng);
        let proof = Groth16::<Bn254, CircomReduction>::create_proof_with_reduction_and_matrices(
            &proving_key,
            r,
            s,
            &matrices,
            matrices.num_instance_variables,
            matrices.num_constraints,
            &assignment,
        )
        .map_err(|e| EngineError::ProofRejected(e.to_string()))?;

        info!("proof generated in {:.2}s", start.elapsed().as_secs_f64());
        pack_proof(&proof, input)
    }
}

#[async_trait]
impl ProofSystem for CircomProver {
    async fn prove(&self, input: &ProofInput) -> Result<ProvedTransaction> {
        let prover = Self {
            wasm: self.wasm.clone(),
            r1cs: self.r1cs.clone(),
            zkey: self.zkey.clone(),
        };
        let input = input.clone();
        tokio::task::spawn_blocking(move || prover.prove_blocking(&input))
            .await
            .map_err(|e| EngineError::InvalidState(format!("prover task: {}", e)))?
    }
}

/// lay an ark proof out in the verifier's byte order
pub fn pack_proof(proof: &Proof<Bn254>, input: &ProofInput) -> Result<ProvedTransaction> {
    Ok(ProvedTransaction {
        proof_a: pack_g1(&proof.a)?,
        proof_b: pack_g2(&proof.b)?,
        proof_c: pack_g1(&proof.c)?,
        public_signals: input.public_signals(),
    })
}

fn fq_be(v: &Fq) -> [u8; 32] {
    let bytes = v.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

fn pack_g1(point: &G1Affine) -> Result<[u8; 64]> {
    let (x, y) = point
        .xy()
        .ok_or_else(|| EngineError::ProofRejected("proof point at infinity".into()))?;
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&fq_be(&x));
    out[32..].copy_from_slice(&fq_be(&y));
    Ok(out)
}

/// g2 points serialize with the inner (c1, c0) pairs reversed
fn pack_g2(point: &G2Affine) -> Result<[u8; 128]> {
    let (x, y) = point
        .xy()
        .ok_or_else(|| EngineError::ProofRejected("proof point at infinity".into()))?;
    let mut out = [0u8; 128];
    out[..32].copy_from_slice(&fq_be(&x.c1));
    out[32..64].copy_from_slice(&fq_be(&x.c0));
    out[64..96].copy_from_slice(&fq_be(&y.c1));
    out[96..128].copy_from_slice(&fq_be(&y.c0));
    Ok(out)
}

fn base_field_modulus() -> BigUint {
    BigUint::from_bytes_be(&Fq::MODULUS.to_bytes_be())
}

/// y is negative when it exceeds its own negation in the coordinate field
fn limb_is_negative(y: &[u8]) -> bool {
    let modulus = base_field_modulus();
    let y = BigUint::from_bytes_be(y);
    if y == BigUint::default() {
        return false;
    }
    let neg = &modulus - &y;
    y > neg
}

/// compress a packed g1 point: x with the sign of y in bit 7 of byte 0
pub fn compress_g1(uncompressed: &[u8; 64]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&uncompressed[..32]);
    if limb_is_negative(&uncompressed[32..64]) {
        out[0] |= 0x80;
    }
    out
}

/// compress a packed g2 point; the sign comes from y.c1, falling back to
/// y.c0 when c1 is zero
pub fn compress_g2(uncompressed: &[u8; 128]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&uncompressed[..64]);

    let y_c1 = &uncompressed[64..96];
    let y_c0 = &uncompressed[96..128];
    let negative = if y_c1.iter().any(|b| *b != 0) {
        limb_is_negative(y_c1)
    } else {
        limb_is_negative(y_c0)
    };
    if negative {
        out[0] |= 0x80;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::AffineRepr;

    #[test]
    fn test_missing_artifacts_rejected() {
        let result = CircomProver::new(
            Path::new("/nonexistent/circuit.wasm"),
            Path::new("/nonexistent/circuit.r1cs"),
            Path::new("/nonexistent/circuit.zkey"),
        );
        assert!(matches!(
            result,
            Err(EngineError::CircuitArtifactsMissing(_))
        ));
    }

    #[test]
    fn test_pack_g1_generator() {
        let g = G1Affine::generator();
        let packed = pack_g1(&g).unwrap();

        // bn254 g1 generator is (1, 2)
        let mut expected = [0u8; 64];
        expected[31] = 1;
        expected[63] = 2;
        assert_eq!(packed, expected);
    }

    #[test]
    fn test_pack_g2_reverses_inner_pairs() {
        let g = G2Affine::generator();
        let packed = pack_g2(&g).unwrap();
        let (x, y) = g.xy().unwrap();

        assert_eq!(&packed[..32], &fq_be(&x.c1));
        assert_eq!(&packed[32..64], &fq_be(&x.c0));
        assert_eq!(&packed[64..96], &fq_be(&y.c1));
        assert_eq!(&packed[96..128], &fq_be(&y.c0));
    }

    #[test]
    fn test_infinity_rejected() {
        assert!(pack_g1(&G1Affine::identity()).is_err());
        assert!(pack_g2(&G2Affine::identity()).is_err());
    }

    #[test]
    fn test_compress_g1_sign_bit() {
        let g = G1Affine::generator();
        let neg = -g;

        let compressed = compress_g1(&pack_g1(&g).unwrap());
        let compressed_neg = compress_g1(&pack_g1(&neg).unwrap());

        // same x, opposite sign bits
        assert_eq!(&compressed[1..], &compressed_neg[1..]);
        assert_ne!(compressed[0] & 0x80, compressed_neg[0] & 0x80);

        // y = 2 is below p - 2, so the generator itself is positive
        assert_eq!(compressed[0] & 0x80, 0);
    }

    #[test]
    fn test_compress_g2_sign_bit() {
        let g = G2Affine::generator();
        let neg = -g;

        let compressed = compress_g2(&pack_g2(&g).unwrap());
        let compressed_neg = compress_g2(&pack_g2(&neg).unwrap());

        assert_eq!(&compressed[1..], &compressed_neg[1..]);
        assert_ne!(compressed[0] & 0x80, compressed_neg[0] & 0x80);
    }

    #[test]
    fn test_limb_sign() {
        // 1 is positive, p - 1 is negative
        let one = {
            let mut b = [0u8; 32];
            b[31] = 1;
            b
        };
        assert!(!limb_is_negative(&one));

        let p_minus_one = (base_field_modulus() - 1u32).to_bytes_be();
        assert!(limb_is_negative(&p_minus_one));

        assert!(!limb_is_negative(&[0u8; 32]));
    }
}
