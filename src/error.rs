use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a run or reject an input token.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no input available: pass targets as arguments, use --input FILE, or pipe them on stdin")]
    InvalidInput,

    #[error("invalid address or range `{0}`")]
    InvalidAddress(String),

    #[error("failed to read input: {0}")]
    InputRead(#[source] std::io::Error),

    #[error("resume log {path} is unreadable: {reason}")]
    ResumeLoad { path: PathBuf, reason: String },

    #[error("failed to write resume log: {0}")]
    ResumeWrite(#[source] std::io::Error),

    #[error("output worker is no longer available")]
    OutputClosed,
}

/// Why a single address was classified as a failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("handshake with SNI {domain} failed: {message}")]
    Handshake { domain: String, message: String },

    #[error("timed out")]
    Timeout,

    #[error("attempt aborted: {0}")]
    Internal(String),
}

impl ProbeError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Connect(_) => "connect",
            ProbeError::Handshake { .. } => "handshake",
            ProbeError::Timeout => "timeout",
            ProbeError::Internal(_) => "internal",
        }
    }
}
