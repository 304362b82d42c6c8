//! ext-data canonical hashing
//!
//! ext-data is the public, unshielded payload of a transaction. its sha-256
//! digest is a public input of the circuit, so the byte layout here must
//! match the on-chain verifier exactly.

use ark_bn254::Fr;

use crate::asset::AssetTag;
use crate::field;
use crate::hash;

/// asset-tag encoding inside the ext-data hash
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetTagMode {
    /// raw 32 bytes (canonical)
    Raw,
    /// little-endian 32 bytes of the field-reduced big-endian integer (legacy)
    Numeric,
}

/// public transaction payload bound into the proof
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtData {
    pub recipient: [u8; 32],
    /// positive = deposit, negative = withdrawal
    pub ext_amount: i64,
    pub encrypted_output1: Vec<u8>,
    pub encrypted_output2: Vec<u8>,
    pub fee: u64,
    pub fee_recipient: [u8; 32],
    pub asset: AssetTag,
}

impl ExtData {
    /// canonical sha-256 digest over the ext-data tuple
    pub fn hash(&self, mode: AssetTagMode) -> [u8; 32] {
        let mut data = Vec::with_capacity(
            32 + 8 + 4 + self.encrypted_output1.len() + 4 + self.encrypted_output2.len() + 8 + 32 + 32,
        );

        data.extend_from_slice(&self.recipient);
        data.extend_from_slice(&field::ext_amount_bytes(self.ext_amount));
        data.extend_from_slice(&(self.encrypted_output1.len() as u32).to_le_bytes());
        data.extend_from_slice(&self.encrypted_output1);
        data.extend_from_slice(&(self.encrypted_output2.len() as u32).to_le_bytes());
        data.extend_from_slice(&self.encrypted_output2);
        data.extend_from_slice(&self.fee.to_le_bytes());
        data.extend_from_slice(&self.fee_recipient);
        data.extend_from_slice(&self.asset_tag_bytes(mode));

        hash::sha256(&data)
    }

    /// the digest as the circuit sees it, reduced into the field
    pub fn hash_field(&self, mode: AssetTagMode) -> Fr {
        field::fr_from_be_mod_order(&self.hash(mode))
    }

    fn asset_tag_bytes(&self, mode: AssetTagMode) -> [u8; 32] {
        match mode {
            AssetTagMode::Raw => self.asset.to_bytes(),
            AssetTagMode::Numeric => {
                let reduced = field::reduce_be_mod_field(&self.asset.to_bytes());
                let le = reduced.to_bytes_le();
                let mut out = [0u8; 32];
                out[..le.len()].copy_from_slice(&le);
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtData {
        ExtData {
            recipient: [1u8; 32],
            ext_amount: -5_000_000,
            encrypted_output1: vec![0xaa; 10],
            encrypted_output2: vec![0xbb; 12],
            fee: 15_000,
            fee_recipient: [2u8; 32],
            asset: AssetTag::NATIVE,
        }
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(
            sample().hash(AssetTagMode::Raw),
            sample().hash(AssetTagMode::Raw)
        );
    }

    #[test]
    fn test_single_field_change_changes_digest() {
        let base = sample().hash(AssetTagMode::Raw);

        let mut e = sample();
        e.recipient[31] ^= 1;
        assert_ne!(e.hash(AssetTagMode::Raw), base);

        let mut e = sample();
        e.ext_amount += 1;
        assert_ne!(e.hash(AssetTagMode::Raw), base);

        let mut e = sample();
        e.encrypted_output1.push(0);
        assert_ne!(e.hash(AssetTagMode::Raw), base);

        let mut e = sample();
        e.fee += 1;
        assert_ne!(e.hash(AssetTagMode::Raw), base);
    }

    #[test]
    fn test_length_prefixes_separate_ciphertexts() {
        // moving a byte across the ciphertext boundary must change the digest
        let mut a = sample();
        a.encrypted_output1 = vec![0xcc; 4];
        a.encrypted_output2 = vec![0xcc; 6];

        let mut b = sample();
        b.encrypted_output1 = vec![0xcc; 5];
        b.encrypted_output2 = vec![0xcc; 5];

        assert_ne!(a.hash(AssetTagMode::Raw), b.hash(AssetTagMode::Raw));
    }

    #[test]
    fn test_modes_differ_for_native() {
        // raw native is 31 zeroes + 1; numeric native is 1 little endian
        let e = sample();
        assert_ne!(e.hash(AssetTagMode::Raw), e.hash(AssetTagMode::Numeric));
    }

    #[test]
    fn test_layout_vector() {
        // hand-assembled layout for a tiny payload
        let e = ExtData {
            recipient: [0u8; 32],
            ext_amount: 1,
            encrypted_output1: vec![],
            encrypted_output2: vec![],
            fee: 0,
            fee_recipient: [0u8; 32],
            asset: AssetTag::NATIVE,
        };

        let mut expected = Vec::new();
        expected.extend_from_slice(&[0u8; 32]);
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&0u32.to_le_bytes());
        expected.extend_from_slice(&0u32.to_le_bytes());
        expected.extend_from_slice(&0u64.to_le_bytes());
        expected.extend_from_slice(&[0u8; 32]);
        expected.extend_from_slice(&AssetTag::NATIVE.to_bytes());

        assert_eq!(e.hash(AssetTagMode::Raw), hash::sha256(&expected));
    }
}
