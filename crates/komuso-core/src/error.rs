//! engine error taxonomy
//!
//! relayer and chain errors arrive as free-form strings; the classifiers at
//! the bottom sniff them into the retriable/terminal split the transaction
//! core relies on.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    // validation
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no spendable notes")]
    NoSpendableNotes,

    #[error("deposits require a signing callback")]
    MissingSigningCallback,

    // network
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    // transaction
    #[error("merkle root changed between witness and submission")]
    RootMismatch,

    #[error("nullifier already used - note was already spent")]
    NullifierAlreadyUsed,

    #[error("ext-data hash rejected by verifier")]
    ExtDataHashMismatch,

    #[error("proof rejected: {0}")]
    ProofRejected(String),

    #[error("signature failure: {0}")]
    SignatureFailure(String),

    #[error("transaction too large: {size} > {limit} bytes")]
    TransactionTooLarge { size: usize, limit: usize },

    // proof
    #[error("witness generation failed: {0}")]
    WitnessGeneration(String),

    // locks / state machine
    #[error("invalid state: {0}")]
    InvalidState(String),

    // configuration
    #[error("circuit artifacts missing: {0}")]
    CircuitArtifactsMissing(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    // primitives
    #[error(transparent)]
    Pool(#[from] komuso_pool::PoolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// whether the transaction core may restart the pipeline on this error
    ///
    /// root races and mid-index relayers heal themselves on retry; a spent
    /// nullifier, a rejected input, or a broken local artifact never will
    pub fn is_retriable(&self) -> bool {
        match self {
            EngineError::RootMismatch => true,
            EngineError::NoSpendableNotes => true,
            EngineError::Network(_) => true,
            EngineError::MalformedResponse(_) => true,
            EngineError::Http { status, .. } => *status >= 500,
            EngineError::NullifierAlreadyUsed
            | EngineError::InvalidAmount(_)
            | EngineError::InvalidAddress(_)
            | EngineError::InsufficientBalance { .. }
            | EngineError::TransactionTooLarge { .. }
            | EngineError::ExtDataHashMismatch
            | EngineError::MissingSigningCallback
            | EngineError::SignatureFailure(_)
            | EngineError::ProofRejected(_)
            | EngineError::WitnessGeneration(_)
            | EngineError::CircuitArtifactsMissing(_)
            | EngineError::Config(_)
            | EngineError::InvalidState(_)
            | EngineError::Pool(_)
            | EngineError::Io(_)
            | EngineError::Json(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// the relayer reported a stale or mismatched merkle root
pub fn is_root_mismatch(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["invalid root", "root mismatch", "merkle root"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// the chain rejected an input whose nullifier marker already exists
pub fn is_nullifier_already_used(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("nullifier")
        && ["already", "used", "exists"]
            .iter()
            .any(|needle| lower.contains(needle))
}

/// the payer or an expected account cannot cover the transaction
pub fn is_insufficient_funds(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["insufficient funds", "insufficient lamports", "account not found"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// map a relayer error body onto the taxonomy
pub fn classify_submit_error(status: u16, body: &str) -> EngineError {
    if is_root_mismatch(body) {
        EngineError::RootMismatch
    } else if is_nullifier_already_used(body) {
        EngineError::NullifierAlreadyUsed
    } else if is_insufficient_funds(body) {
        EngineError::InsufficientBalance { have: 0, need: 0 }
    } else {
        EngineError::Http { status, body: body.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_mismatch_classifier() {
        assert!(is_root_mismatch("Error: Invalid Root provided"));
        assert!(is_root_mismatch("merkle ROOT out of date"));
        assert!(!is_root_mismatch("some other failure"));
    }

    #[test]
    fn test_nullifier_classifier() {
        assert!(is_nullifier_already_used("nullifier already exists"));
        assert!(is_nullifier_already_used("Nullifier was used"));
        // "nullifier" alone is not enough
        assert!(!is_nullifier_already_used("bad nullifier encoding"));
        assert!(!is_nullifier_already_used("account already exists"));
    }

    #[test]
    fn test_insufficient_funds_classifier() {
        assert!(is_insufficient_funds("Transfer: insufficient lamports 5, need 10"));
        assert!(is_insufficient_funds("fee payer account not found"));
        assert!(!is_insufficient_funds("proof verification failed"));
    }

    #[test]
    fn test_retriable_split() {
        assert!(EngineError::RootMismatch.is_retriable());
        assert!(EngineError::NoSpendableNotes.is_retriable());
        assert!(EngineError::Http { status: 503, body: String::new() }.is_retriable());
        assert!(!EngineError::Http { status: 400, body: String::new() }.is_retriable());
        assert!(!EngineError::NullifierAlreadyUsed.is_retriable());
        assert!(!EngineError::InvalidAmount("0".into()).is_retriable());
    }

    #[test]
    fn test_local_failures_are_terminal() {
        // a proof artifact that stops reading mid-session stays broken;
        // restarting the pipeline cannot fix it
        let io = EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "zkey unreadable",
        ));
        assert!(!io.is_retriable());

        let pool = EngineError::Pool(komuso_pool::PoolError::InvalidAssetTag("x".into()));
        assert!(!pool.is_retriable());

        assert!(!EngineError::WitnessGeneration("unsatisfied".into()).is_retriable());
        assert!(!EngineError::ProofRejected("bad proof".into()).is_retriable());
    }

    #[test]
    fn test_classify_submit_error() {
        assert!(matches!(
            classify_submit_error(400, "invalid root"),
            EngineError::RootMismatch
        ));
        assert!(matches!(
            classify_submit_error(409, "nullifier already used"),
            EngineError::NullifierAlreadyUsed
        ));
        assert!(matches!(
            classify_submit_error(418, "teapot"),
            EngineError::Http { status: 418, .. }
        ));
    }
}
