//! Unified error type for the conversion pipeline.
//!
//! Every failure site tags its kind explicitly. [`Error::kind`] exposes the
//! taxonomy as a fieldless tag so callers can branch on it without matching
//! payloads, and [`Error::diagnostic`] yields the text shown to end users.

use std::time::Duration;

/// Maximum number of characters of diagnostic text surfaced to a requester.
pub const DIAGNOSTIC_LIMIT: usize = 1800;

/// Unified error type covering all failure modes of a conversion job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The declared source size exceeds the configured ceiling.
    #[error("Admission rejected: {size} bytes exceeds limit of {limit} bytes")]
    AdmissionRejected {
        /// Declared size of the source artifact.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// An external command could not be launched.
    #[error("Spawn failure [{tool}]: {message}")]
    Spawn {
        /// Name of the tool that failed to start.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An external command ran to completion but signalled failure.
    #[error("Tool error [{tool}]: exited with {}: {}", exit_description(.code), .stderr.trim())]
    NonZeroExit {
        /// Name of the tool that failed.
        tool: String,
        /// Exit code, or `None` when the process was terminated by a signal.
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// An external command exceeded its timeout. The process tree is already
    /// dead when this value exists.
    #[error("Tool error [{tool}]: timed out after {timeout:?}")]
    TimedOut {
        /// Name of the tool that was terminated.
        tool: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A single audio track could not be decoded.
    #[error("Decode error [track {track}]: {message}")]
    Decode {
        /// Index of the offending track.
        track: usize,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Configuration or request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The delivery collaborator could not hand over the artifact.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fieldless tag naming the kind of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AdmissionRejected,
    SpawnFailure,
    NonZeroExit,
    TimedOut,
    UpstreamDecode,
    Io,
    Validation,
    Delivery,
    Internal,
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "termination by signal".to_string(),
    }
}

impl Error {
    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AdmissionRejected { .. } => ErrorKind::AdmissionRejected,
            Error::Spawn { .. } => ErrorKind::SpawnFailure,
            Error::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            Error::TimedOut { .. } => ErrorKind::TimedOut,
            Error::Decode { .. } => ErrorKind::UpstreamDecode,
            Error::Io { .. } => ErrorKind::Io,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Delivery(_) => ErrorKind::Delivery,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Diagnostic text for end users, truncated to [`DIAGNOSTIC_LIMIT`]
    /// characters.
    ///
    /// For a non-zero exit this prefers stderr, then stdout; everything else
    /// uses the display text.
    pub fn diagnostic(&self) -> String {
        let text = match self {
            Error::NonZeroExit { stdout, stderr, .. } => {
                if !stderr.trim().is_empty() {
                    stderr.trim().to_string()
                } else if !stdout.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    "unknown error".to_string()
                }
            }
            other => other.to_string(),
        };
        truncate_chars(&text, DIAGNOSTIC_LIMIT)
    }

    /// Convenience constructor for [`Error::Spawn`].
    pub fn spawn(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Spawn {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Decode`].
    pub fn decode(track: usize, message: impl Into<String>) -> Self {
        Error::Decode {
            track,
            message: message.into(),
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
