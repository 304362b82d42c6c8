//! komuso shielded pool primitives
//!
//! utxo model for a privacy pool over a 26-level poseidon merkle tree:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SHIELDED POOL                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  on chain                                                    │
//! │  ├─ note commitment tree (poseidon, depth 26)                │
//! │  ├─ nullifier marker accounts (spent notes)                  │
//! │  └─ groth16 verifier bound to the ext-data hash              │
//! │                                                              │
//! │  client (this crate + komuso-core)                           │
//! │  ├─ note keypairs derived from a wallet signature            │
//! │  ├─ aes-ctr + hmac note envelopes on the ciphertext stream   │
//! │  └─ commitments / nullifiers / ext-data canonical hashing    │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod asset;
pub mod encryption;
pub mod error;
pub mod ext_data;
pub mod field;
pub mod hash;
pub mod keypair;
pub mod note;

pub use asset::AssetTag;
pub use encryption::EncryptionKey;
pub use error::{PoolError, Result};
pub use ext_data::{AssetTagMode, ExtData};
pub use keypair::NoteKeypair;
pub use note::{Note, NotePlain};

/// depth of the note commitment tree
pub const TREE_DEPTH: usize = 26;
