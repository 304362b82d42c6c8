//! note keypairs
//!
//! a note keypair is not a real signature scheme: the "signature" only binds
//! a nullifier to knowledge of the private key inside the circuit.
//!
//! privkey = 31 random bytes (always below the field modulus)
//! pubkey  = poseidon(privkey)
//! sig     = poseidon(privkey, commitment, index)

use ark_bn254::Fr;
use rand::{CryptoRng, RngCore};

use crate::encryption::EncryptionKey;
use crate::error::Result;
use crate::field;
use crate::hash;

/// utxo signing keypair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteKeypair {
    privkey: Fr,
    pubkey: Fr,
}

impl NoteKeypair {
    fn from_privkey(privkey: Fr) -> Result<Self> {
        let pubkey = hash::poseidon(&[privkey])?;
        Ok(Self { privkey, pubkey })
    }

    /// sample a fresh keypair from 31 bytes of randomness
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut bytes = [0u8; 31];
        rng.fill_bytes(&mut bytes);
        Self::from_privkey(field::fr_from_be_mod_order(&bytes))
    }

    /// deterministic keypair for a holder: privkey = sha256(encryption key)
    pub fn from_encryption_key(key: &EncryptionKey) -> Result<Self> {
        let digest = hash::sha256(key.as_bytes());
        Self::from_privkey(field::fr_from_be_mod_order(&digest))
    }

    /// deterministic keypair from an arbitrary seed
    ///
    /// used for batch dummy inputs, where every sibling across a batch must
    /// produce a globally unique nullifier
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let digest = hash::sha256(seed);
        Self::from_privkey(field::fr_from_be_mod_order(&digest))
    }

    pub fn privkey(&self) -> Fr {
        self.privkey
    }

    pub fn pubkey(&self) -> Fr {
        self.pubkey
    }

    /// bind a (commitment, index) pair to this key
    pub fn sign(&self, commitment: Fr, index: u64) -> Result<Fr> {
        hash::poseidon(&[self.privkey, commitment, Fr::from(index)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_random_keypairs_differ() {
        let a = NoteKeypair::random(&mut OsRng).unwrap();
        let b = NoteKeypair::random(&mut OsRng).unwrap();
        assert_ne!(a.privkey(), b.privkey());
        assert_ne!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn test_deterministic_derivation() {
        let key = EncryptionKey::from_bytes([7u8; 31]);
        let a = NoteKeypair::from_encryption_key(&key).unwrap();
        let b = NoteKeypair::from_encryption_key(&key).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seeded_keypairs_unique_per_seed() {
        let a = NoteKeypair::from_seed(b"1700000000:0:0").unwrap();
        let b = NoteKeypair::from_seed(b"1700000000:0:1").unwrap();
        let c = NoteKeypair::from_seed(b"1700000000:1:0").unwrap();
        assert_ne!(a.pubkey(), b.pubkey());
        assert_ne!(a.pubkey(), c.pubkey());

        // same seed = same keypair
        assert_eq!(a, NoteKeypair::from_seed(b"1700000000:0:0").unwrap());
    }

    #[test]
    fn test_signature_binds_commitment_and_index() {
        let kp = NoteKeypair::random(&mut OsRng).unwrap();
        let c = Fr::from(123u64);

        let sig = kp.sign(c, 5).unwrap();
        assert_eq!(sig, kp.sign(c, 5).unwrap());
        assert_ne!(sig, kp.sign(c, 6).unwrap());
        assert_ne!(sig, kp.sign(Fr::from(124u64), 5).unwrap());
    }
}
