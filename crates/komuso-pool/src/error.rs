//! error types for pool primitives

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("poseidon error: {0}")]
    Poseidon(String),

    #[error("envelope too short: {0} bytes")]
    MalformedEnvelope(usize),

    /// auth tag did not verify - the note is not for this key
    #[error("auth tag mismatch")]
    AuthTagMismatch,

    #[error("malformed note plaintext: {0}")]
    MalformedPlaintext(String),

    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("invalid asset tag: {0}")]
    InvalidAssetTag(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;
