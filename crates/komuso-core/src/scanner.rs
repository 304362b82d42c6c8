//! note scanner
//!
//! trial-decrypts the public encrypted-output stream to find notes owned by
//! a key, then filters to the spendable set: positive amount, inclusion
//! proof resolves, and neither nullifier marker exists on chain.
//!
//! the ciphertext cache is the same public data for every holder, so it is
//! kept process-wide and grows append-only; only decryption depends on the
//! viewer. concurrent callers share a single in-flight scan instead of
//! hammering the relayer twice.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine as _;
use komuso_pool::{AssetTag, EncryptionKey, Note, NoteKeypair, NotePlain};
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::relayer::RelayerApi;
use crate::spent::SpentSet;
use crate::{DECRYPT_BATCH, RANGE_FETCH_WINDOW};

#[derive(Default)]
struct ScanCache {
    /// every ciphertext fetched so far, in range order
    ciphertexts: Vec<String>,
    /// next leaf index to fetch from
    last_fetched_index: u64,
}

#[derive(Default)]
struct CompletedScan {
    generation: u64,
    fingerprint: Option<[u8; 32]>,
    notes: Vec<Note>,
}

pub struct NoteScanner {
    relayer: Arc<dyn RelayerApi>,
    spent: SpentSet,
    cache: Mutex<ScanCache>,
    /// serializes scans; waiters inherit the finished result
    gate: tokio::sync::Mutex<()>,
    completed: Mutex<CompletedScan>,
}

impl NoteScanner {
    pub fn new(relayer: Arc<dyn RelayerApi>) -> Self {
        Self {
            spent: SpentSet::new(Arc::clone(&relayer)),
            relayer,
            cache: Mutex::new(ScanCache::default()),
            gate: tokio::sync::Mutex::new(()),
            completed: Mutex::new(CompletedScan::default()),
        }
    }

    /// drop the ciphertext cache; the next scan refetches from leaf zero
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.ciphertexts.clear();
        cache.last_fetched_index = 0;
        self.completed.lock().fingerprint = None;
    }

    /// every spendable note of `asset` decryptable under `key`
    pub async fn scan(
        &self,
        key: &EncryptionKey,
        asset: &AssetTag,
        force_refresh: bool,
    ) -> Result<Vec<Note>> {
        let fingerprint = scan_fingerprint(key, asset);
        let entered_generation = self.completed.lock().generation;

        let _gate = self.gate.lock().await;

        // a scan that finished while we waited for the gate answers us too
        if !force_refresh {
            let done = self.completed.lock();
            if done.generation > entered_generation && done.fingerprint == Some(fingerprint) {
                debug!("sharing result of concurrent scan");
                return Ok(done.notes.clone());
            }
        }

        let notes = self.scan_inner(key, asset, force_refresh).await?;

        let mut done = self.completed.lock();
        done.generation += 1;
        done.fingerprint = Some(fingerprint);
        done.notes = notes.clone();
        Ok(notes)
    }

    async fn scan_inner(
        &self,
        key: &EncryptionKey,
        asset: &AssetTag,
        force_refresh: bool,
    ) -> Result<Vec<Note>> {
        let state = self.relayer.tree_state().await?;

        if force_refresh {
            let mut cache = self.cache.lock();
            cache.ciphertexts.clear();
            cache.last_fetched_index = 0;
        }

        // fetch the missing tail of the stream in parallel windows
        let start = self.cache.lock().last_fetched_index;
        if start < state.next_index {
            let windows: Vec<(u64, u64)> = (start..state.next_index)
                .step_by(RANGE_FETCH_WINDOW as usize)
                .map(|s| (s, (s + RANGE_FETCH_WINDOW).min(state.next_index)))
                .collect();
            let fetched = futures::future::try_join_all(
                windows.iter().map(|(s, e)| self.relayer.utxo_range(*s, *e)),
            )
            .await?;

            let mut cache = self.cache.lock();
            for outputs in fetched {
                cache.ciphertexts.extend(outputs);
            }
            cache.last_fetched_index = state.next_index;
            debug!(
                "cache now holds {} ciphertexts up to index {}",
                cache.ciphertexts.len(),
                state.next_index
            );
        }

        let snapshot = self.cache.lock().ciphertexts.clone();
        let keypair = NoteKeypair::from_encryption_key(key)?;
        let wanted_asset = asset.canonical_string();

        // trial decryption is cpu-bound; run it in parallel batches and
        // discard failures, zero amounts and duplicate ciphertexts
        let mut seen = HashSet::new();
        let unique: Vec<&String> = snapshot
            .iter()
            .filter(|c| seen.insert(c.as_str()))
            .collect();

        let mut candidates: Vec<NotePlain> = Vec::new();
        for batch in unique.chunks(DECRYPT_BATCH) {
            let found: Vec<NotePlain> = batch
                .par_iter()
                .filter_map(|ciphertext| {
                    decode_ciphertext(ciphertext)
                        .into_iter()
                        .find_map(|bytes| NotePlain::decrypt(key, &bytes).ok())
                })
                .filter(|plain| plain.amount > 0 && plain.asset == wanted_asset)
                .collect();
            candidates.extend(found);
        }
        debug!("{} candidates decrypted from {} ciphertexts", candidates.len(), unique.len());

        // rewrite every index from its inclusion proof; the nullifier is
        // wrong without this, so a candidate without a proof is not spendable
        let resolved = futures::future::join_all(candidates.into_iter().map(|plain| {
            let keypair = keypair.clone();
            async move {
                let mut note = plain.into_note(keypair, *asset);
                let commitment = match note.commitment() {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("skipping note with bad commitment: {}", e);
                        return None;
                    }
                };
                match self.relayer.merkle_proof(&commitment).await {
                    Ok(proof) => {
                        note.index = proof.index;
                        Some(note)
                    }
                    Err(e) => {
                        warn!("no inclusion proof for candidate: {}", e);
                        None
                    }
                }
            }
        }))
        .await;

        // a re-encrypted copy of a note is still the same leaf; keep one
        let mut seen_commitments = HashSet::new();
        let notes: Vec<Note> = resolved
            .into_iter()
            .flatten()
            .filter(|note| {
                note.commitment()
                    .map(|c| seen_commitments.insert(komuso_pool::field::fr_to_be_bytes(&c)))
                    .unwrap_or(false)
            })
            .collect();

        // drop anything whose nullifier marker already exists
        let nullifiers = notes
            .iter()
            .map(|n| n.nullifier())
            .collect::<komuso_pool::Result<Vec<_>>>()?;
        let spent_flags = self.spent.is_spent(&nullifiers).await?;
        let survivors: Vec<Note> = notes
            .into_iter()
            .zip(spent_flags)
            .filter_map(|(note, spent)| (!spent).then_some(note))
            .collect();

        info!("scan found {} spendable notes", survivors.len());
        Ok(survivors)
    }
}

/// the stream carries base64 or hex entries, and a hex string often parses
/// as base64 too; trial-decrypt every plausible interpretation
fn decode_ciphertext(entry: &str) -> Vec<Vec<u8>> {
    let mut decodings = Vec::new();
    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(entry) {
        decodings.push(bytes);
    }
    if let Ok(bytes) = hex::decode(entry) {
        decodings.push(bytes);
    }
    decodings
}

fn scan_fingerprint(key: &EncryptionKey, asset: &AssetTag) -> [u8; 32] {
    let mut data = Vec::with_capacity(31 + 32);
    data.extend_from_slice(key.as_bytes());
    data.extend_from_slice(&asset.to_bytes());
    komuso_pool::hash::sha256(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_accepts_base64_and_hex() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        assert_eq!(decode_ciphertext(&b64), vec![bytes.clone()]);

        // hex chars are base64 chars too, so both readings come back
        let decodings = decode_ciphertext("deadbeef");
        assert_eq!(decodings.len(), 2);
        assert_eq!(decodings[1], bytes);

        assert!(decode_ciphertext("!!not-an-encoding!!").is_empty());
    }

    #[test]
    fn test_fingerprint_distinguishes_key_and_asset() {
        let key_a = EncryptionKey::from_bytes([1u8; 31]);
        let key_b = EncryptionKey::from_bytes([2u8; 31]);
        let mut other = [0u8; 32];
        other[0] = 9;
        let tag = AssetTag::from_bytes(other);

        assert_ne!(
            scan_fingerprint(&key_a, &AssetTag::NATIVE),
            scan_fingerprint(&key_b, &AssetTag::NATIVE)
        );
        assert_ne!(
            scan_fingerprint(&key_a, &AssetTag::NATIVE),
            scan_fingerprint(&key_a, &tag)
        );
    }
}
