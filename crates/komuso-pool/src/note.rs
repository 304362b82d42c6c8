//! shielded notes (utxos)
//!
//! a note is an owned amount of one asset inside the pool. its commitment
//! is published in the tree; its nullifier is published on spend.

use ark_bn254::Fr;
use rand::{CryptoRng, Rng, RngCore};

use crate::asset::AssetTag;
use crate::encryption::EncryptionKey;
use crate::error::{PoolError, Result};
use crate::field;
use crate::hash;
use crate::keypair::NoteKeypair;

/// lower bound of the default 9-digit blinding range
const BLINDING_MIN: u64 = 100_000_000;
/// upper bound (exclusive) of the default 9-digit blinding range
const BLINDING_MAX: u64 = 1_000_000_000;

/// a shielded note
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    /// amount in base units
    pub amount: u64,
    /// per-note blinding factor
    pub blinding: Fr,
    /// owner keypair (holder-deterministic for received notes)
    pub keypair: NoteKeypair,
    /// asset this note is denominated in
    pub asset: AssetTag,
    /// leaf position in the commitment tree
    ///
    /// a hint at construction time; authoritative only after it has been
    /// rewritten from an inclusion proof
    pub index: u64,
}

impl Note {
    /// create a note with a fresh 9-digit blinding
    pub fn new<R: RngCore + CryptoRng>(
        amount: u64,
        keypair: NoteKeypair,
        asset: AssetTag,
        index: u64,
        rng: &mut R,
    ) -> Self {
        let blinding = Fr::from(rng.gen_range(BLINDING_MIN..BLINDING_MAX));
        Self { amount, blinding, keypair, asset, index }
    }

    /// create a note with an explicit blinding
    pub fn with_blinding(
        amount: u64,
        blinding: Fr,
        keypair: NoteKeypair,
        asset: AssetTag,
        index: u64,
    ) -> Self {
        Self { amount, blinding, keypair, asset, index }
    }

    /// zero-amount filler input
    ///
    /// the keypair must be unique per dummy: its nullifier depends on it
    /// and must never collide across transactions
    pub fn dummy<R: RngCore + CryptoRng>(
        keypair: NoteKeypair,
        asset: AssetTag,
        rng: &mut R,
    ) -> Self {
        Self::new(0, keypair, asset, 0, rng)
    }

    pub fn is_dummy(&self) -> bool {
        self.amount == 0
    }

    /// commitment published in the tree:
    /// poseidon(amount, pubkey, blinding, asset)
    pub fn commitment(&self) -> Result<Fr> {
        hash::poseidon(&[
            Fr::from(self.amount),
            self.keypair.pubkey(),
            self.blinding,
            self.asset.field_element(),
        ])
    }

    /// nullifier published on spend:
    /// poseidon(commitment, index, sign(commitment, index))
    ///
    /// the index must be the authoritative one from an inclusion proof,
    /// otherwise the nullifier is silently wrong
    pub fn nullifier(&self) -> Result<Fr> {
        let commitment = self.commitment()?;
        let signature = self.keypair.sign(commitment, self.index)?;
        hash::poseidon(&[commitment, Fr::from(self.index), signature])
    }

    /// pipe-delimited plaintext carried inside the envelope
    pub fn plaintext(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.amount,
            field::fr_to_decimal(&self.blinding),
            self.index,
            self.asset.canonical_string()
        )
    }

    /// seal this note for its owner
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        key: &EncryptionKey,
        rng: &mut R,
    ) -> Vec<u8> {
        key.encrypt(self.plaintext().as_bytes(), rng)
    }
}

/// decrypted note fields, before they are bound to a keypair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotePlain {
    pub amount: u64,
    pub blinding: Fr,
    pub index: u64,
    pub asset: String,
}

impl NotePlain {
    /// parse the four pipe-separated plaintext fields
    pub fn parse(plaintext: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(plaintext)
            .map_err(|_| PoolError::MalformedPlaintext("not utf-8".into()))?;

        let mut parts = text.split('|');
        let amount = parts
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| PoolError::MalformedPlaintext(format!("bad amount in {:?}", text)))?;
        let blinding = parts
            .next()
            .ok_or_else(|| PoolError::MalformedPlaintext("missing blinding".into()))
            .and_then(field::fr_from_decimal)?;
        let index = parts
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| PoolError::MalformedPlaintext(format!("bad index in {:?}", text)))?;
        let asset = parts
            .next()
            .ok_or_else(|| PoolError::MalformedPlaintext("missing asset".into()))?
            .to_string();

        if parts.next().is_some() {
            return Err(PoolError::MalformedPlaintext("trailing fields".into()));
        }

        Ok(Self { amount, blinding, index, asset })
    }

    /// try to open an envelope and parse its plaintext
    pub fn decrypt(key: &EncryptionKey, envelope: &[u8]) -> Result<Self> {
        Self::parse(&key.decrypt(envelope)?)
    }

    /// rebuild a spendable note owned by `keypair`
    pub fn into_note(self, keypair: NoteKeypair, asset: AssetTag) -> Note {
        Note::with_blinding(self.amount, self.blinding, keypair, asset, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn test_keypair() -> NoteKeypair {
        NoteKeypair::from_seed(b"note tests").unwrap()
    }

    #[test]
    fn test_commitment_deterministic() {
        let kp = test_keypair();
        let note = Note::with_blinding(1000, Fr::from(123456789u64), kp.clone(), AssetTag::NATIVE, 4);
        let again = Note::with_blinding(1000, Fr::from(123456789u64), kp, AssetTag::NATIVE, 9);

        // same (amount, pubkey, blinding, asset) = same commitment; index is not hashed
        assert_eq!(note.commitment().unwrap(), again.commitment().unwrap());
    }

    #[test]
    fn test_commitment_depends_on_blinding() {
        let kp = test_keypair();
        let a = Note::with_blinding(1000, Fr::from(111111111u64), kp.clone(), AssetTag::NATIVE, 0);
        let b = Note::with_blinding(1000, Fr::from(222222222u64), kp, AssetTag::NATIVE, 0);
        assert_ne!(a.commitment().unwrap(), b.commitment().unwrap());
    }

    #[test]
    fn test_nullifier_depends_on_index() {
        let kp = test_keypair();
        let mut note = Note::with_blinding(500, Fr::from(987654321u64), kp, AssetTag::NATIVE, 7);
        let nf = note.nullifier().unwrap();

        note.index = 8;
        assert_ne!(nf, note.nullifier().unwrap());
    }

    #[test]
    fn test_dummy_nullifiers_differ_by_keypair() {
        let a = Note::dummy(NoteKeypair::random(&mut OsRng).unwrap(), AssetTag::NATIVE, &mut OsRng);
        let b = Note::dummy(NoteKeypair::random(&mut OsRng).unwrap(), AssetTag::NATIVE, &mut OsRng);
        assert_ne!(a.nullifier().unwrap(), b.nullifier().unwrap());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = EncryptionKey::from_bytes([5u8; 31]);
        let kp = NoteKeypair::from_encryption_key(&key).unwrap();
        let note = Note::new(25_000_000, kp.clone(), AssetTag::NATIVE, 12, &mut OsRng);

        let envelope = note.encrypt(&key, &mut OsRng);
        let plain = NotePlain::decrypt(&key, &envelope).unwrap();

        assert_eq!(plain.amount, 25_000_000);
        assert_eq!(plain.index, 12);
        assert_eq!(plain.asset, AssetTag::NATIVE.canonical_string());
        assert_eq!(plain.into_note(kp, AssetTag::NATIVE), note);
    }

    #[test]
    fn test_plaintext_shape() {
        let kp = test_keypair();
        let note = Note::with_blinding(42, Fr::from(100000001u64), kp, AssetTag::NATIVE, 3);
        assert_eq!(
            note.plaintext(),
            format!("42|100000001|3|{}", AssetTag::NATIVE.canonical_string())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(NotePlain::parse(b"not a note").is_err());
        assert!(NotePlain::parse(b"1|2|3").is_err());
        assert!(NotePlain::parse(b"1|2|3|4|5").is_err());
        assert!(NotePlain::parse(&[0xff, 0xfe]).is_err());
    }
}
