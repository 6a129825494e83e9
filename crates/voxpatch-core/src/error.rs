use thiserror::Error;

use crate::hex::HexBytes;
use crate::resolver::UnresolvedTarget;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unrecognized container format: {0}")]
    Format(String),

    #[error("Range {offset:#x}+{length:#x} lies outside the image ({size:#x} bytes)")]
    Range {
        offset: u64,
        length: usize,
        size: usize,
    },

    #[error("Ambiguous match for {target}: {} candidates ({})", .offsets.len(), format_offsets(.offsets))]
    AmbiguousMatch { target: String, offsets: Vec<usize> },

    #[error("Validation mismatch for {target} at {offset:#x}: expected [{expected}], found [{actual}]")]
    ValidationMismatch {
        target: String,
        offset: usize,
        expected: HexBytes,
        actual: HexBytes,
    },

    #[error("Unresolved targets: {}", format_unresolved(.0))]
    UnresolvedTargets(Vec<UnresolvedTarget>),

    #[error("Injected body for {target} is {length} bytes, slot holds {max_length}")]
    InjectionOverflow {
        target: String,
        length: usize,
        max_length: usize,
    },

    #[error("Injected body for {0} is empty")]
    EmptyInjectedBody(String),

    #[error("No injected body supplied for {0}")]
    MissingInjectedBody(String),

    #[error("Write spans of {first} and {second} overlap")]
    OverlappingTargets { first: String, second: String },

    #[error("Transaction rejected: {} target(s) failed validation", .0.len())]
    TransactionRejected(Vec<Error>),

    #[error("Transaction is {actual}, operation requires {expected}")]
    InvalidState { expected: String, actual: String },

    #[error("Restore point does not match image: {0}")]
    RestoreMismatch(String),

    #[error("Invalid catalog: {0}")]
    Catalog(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Per-target errors carried by an aggregate, or the error itself.
    pub fn failures(&self) -> Vec<&Error> {
        match self {
            Error::TransactionRejected(inner) => inner.iter().collect(),
            other => vec![other],
        }
    }
}

fn format_offsets(offsets: &[usize]) -> String {
    offsets
        .iter()
        .map(|o| format!("{:#x}", o))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_unresolved(targets: &[UnresolvedTarget]) -> String {
    targets
        .iter()
        .map(|t| t.target_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
