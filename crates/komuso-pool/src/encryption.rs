//! authenticated note envelopes
//!
//! a 31-byte encryption key is split into an aes-128-ctr key (first 16
//! bytes) and an hmac-sha-256 key (remaining 15). envelopes are
//! `IV (16) || auth_tag (16) || ciphertext`, where the tag is the truncated
//! hmac over `IV || ciphertext`.
//!
//! decryption failure means "not for this key" and must stay non-fatal for
//! callers trial-decrypting the public ciphertext stream.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{PoolError, Result};
use crate::hash;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// 31-byte note encryption key, derived from a wallet signature
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 31]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; 31]) -> Self {
        Self(bytes)
    }

    /// derive from a wallet signature: first 31 bytes of sha256(signature)
    pub fn from_wallet_signature(signature: &[u8]) -> Self {
        let digest = hash::sha256(signature);
        let mut key = [0u8; 31];
        key.copy_from_slice(&digest[..31]);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; 31] {
        &self.0
    }

    fn aes_key(&self) -> &[u8; 16] {
        self.0[..16].try_into().expect("key is 31 bytes")
    }

    fn hmac_key(&self) -> &[u8] {
        &self.0[16..]
    }

    /// seal a plaintext into an envelope
    pub fn encrypt<R: RngCore + CryptoRng>(&self, plaintext: &[u8], rng: &mut R) -> Vec<u8> {
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut iv);

        let mut ciphertext = plaintext.to_vec();
        let mut cipher = Aes128Ctr::new(self.aes_key().into(), (&iv).into());
        cipher.apply_keystream(&mut ciphertext);

        let tag = self.auth_tag(&iv, &ciphertext);

        let mut out = Vec::with_capacity(IV_LEN + TAG_LEN + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&tag);
        out.extend_from_slice(&ciphertext);
        out
    }

    /// open an envelope; tag verification is constant time
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        if envelope.len() < IV_LEN + TAG_LEN {
            return Err(PoolError::MalformedEnvelope(envelope.len()));
        }

        let iv: [u8; IV_LEN] = envelope[..IV_LEN].try_into().expect("sliced to length");
        let tag = &envelope[IV_LEN..IV_LEN + TAG_LEN];
        let ciphertext = &envelope[IV_LEN + TAG_LEN..];

        let expected = self.auth_tag(&iv, ciphertext);
        if expected.ct_eq(tag).unwrap_u8() != 1 {
            return Err(PoolError::AuthTagMismatch);
        }

        let mut plaintext = ciphertext.to_vec();
        let mut cipher = Aes128Ctr::new(self.aes_key().into(), (&iv).into());
        cipher.apply_keystream(&mut plaintext);
        Ok(plaintext)
    }

    fn auth_tag(&self, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> [u8; TAG_LEN] {
        let mut mac =
            HmacSha256::new_from_slice(self.hmac_key()).expect("hmac accepts any key length");
        mac.update(iv);
        mac.update(ciphertext);
        let digest = mac.finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        write!(f, "EncryptionKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_roundtrip() {
        let key = EncryptionKey::from_bytes([9u8; 31]);
        let envelope = key.encrypt(b"10000000|123456789|4|asset", &mut OsRng);
        let opened = key.decrypt(&envelope).unwrap();
        assert_eq!(opened, b"10000000|123456789|4|asset");
    }

    #[test]
    fn test_wrong_key_fails_auth() {
        let key = EncryptionKey::from_bytes([1u8; 31]);
        let other = EncryptionKey::from_bytes([2u8; 31]);
        let envelope = key.encrypt(b"secret", &mut OsRng);
        assert!(matches!(
            other.decrypt(&envelope),
            Err(PoolError::AuthTagMismatch)
        ));
    }

    #[test]
    fn test_tampered_envelope_fails_auth() {
        let key = EncryptionKey::from_bytes([3u8; 31]);
        let mut envelope = key.encrypt(b"payload", &mut OsRng);
        let last = envelope.len() - 1;
        envelope[last] ^= 0x01;
        assert!(matches!(
            key.decrypt(&envelope),
            Err(PoolError::AuthTagMismatch)
        ));
    }

    #[test]
    fn test_short_envelope() {
        let key = EncryptionKey::from_bytes([4u8; 31]);
        assert!(matches!(
            key.decrypt(&[0u8; 16]),
            Err(PoolError::MalformedEnvelope(16))
        ));
    }

    #[test]
    fn test_signature_derivation_deterministic() {
        let sig = [0x5au8; 64];
        let a = EncryptionKey::from_wallet_signature(&sig);
        let b = EncryptionKey::from_wallet_signature(&sig);
        assert_eq!(a, b);

        let c = EncryptionKey::from_wallet_signature(&[0x5bu8; 64]);
        assert_ne!(a, c);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn roundtrip_any_plaintext(key in any::<[u8; 31]>(), plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
                let key = EncryptionKey::from_bytes(key);
                let envelope = key.encrypt(&plaintext, &mut OsRng);
                prop_assert_eq!(key.decrypt(&envelope).unwrap(), plaintext);
            }

            #[test]
            fn wrong_key_never_authenticates(a in any::<[u8; 31]>(), b in any::<[u8; 31]>(), plaintext in proptest::collection::vec(any::<u8>(), 1..128)) {
                prop_assume!(a != b);
                let ka = EncryptionKey::from_bytes(a);
                let kb = EncryptionKey::from_bytes(b);
                let envelope = ka.encrypt(&plaintext, &mut OsRng);
                prop_assert!(kb.decrypt(&envelope).is_err());
            }
        }
    }
}
