//! komuso core - client-side shielded transfer engine
//!
//! the pipeline owned by this crate:
//!
//! wallet signature -> (encryption key, note keypair) -> scanner finds
//! spendable notes -> planner picks up to two inputs and computes change ->
//! commitments / nullifiers / ciphertexts -> ext-data hash -> groth16
//! witness and proof -> canonical wire blob -> relayer -> polling until the
//! output notes are visible in the tree.
//!
//! everything on-chain (verification, landing, indexing) belongs to the
//! relayer and the pool program; this crate only has to agree with them
//! byte-for-byte.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod locks;
pub mod planner;
pub mod prover;
pub mod relayer;
pub mod scanner;
pub mod spent;
pub mod wire;
pub mod witness;

pub use config::{AssetTagModeConfig, EngineConfig};
pub use engine::{
    BatchDepositReceipt, DelayedReceipt, DepositSigner, Engine, TxReceipt, WithdrawReceipt,
};
pub use error::{EngineError, Result};
pub use locks::{LockGuard, LockService};
pub use prover::{CircomProver, ProofSystem, ProvedTransaction};
pub use relayer::{HttpRelayer, MerkleProof, RelayerApi, TreeState};
pub use scanner::NoteScanner;
pub use witness::ProofInput;

use std::time::Duration;

/// ciphertext range fetch window
pub const RANGE_FETCH_WINDOW: u64 = 1000;

/// trial-decryption batch width
pub const DECRYPT_BATCH: usize = 500;

/// nullifier existence lookups per batch
pub const SPENT_CHECK_BATCH: usize = 100;

/// output-visibility polling attempts
pub const POLL_ATTEMPTS: u32 = 10;

/// spacing between polling attempts
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// commitment lock acquisition attempts
pub const LOCK_ATTEMPTS: u32 = 3;

/// spacing between lock acquisition attempts
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// upper bound for delayed withdrawals (one week, minutes)
pub const MAX_DELAY_MINUTES: u32 = 10_080;

/// serialized transact payload must fit one chain packet
pub const MAX_TRANSACT_PAYLOAD: usize = 1232;
