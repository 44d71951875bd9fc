// Error taxonomy for the collection engine

use std::path::PathBuf;

use thiserror::Error;

/// All error types in opsdiag.
///
/// Construction errors (`InvalidPattern`, `InvalidMatcher`, `CommandParse`,
/// `EmptyField`, `InvalidWindow`) are returned before any work starts.
/// Everything else surfaces inside an [`crate::op::Op`] with the status the
/// failure mode maps to: availability errors become `Skip`, inconclusive
/// failures become `Unknown`, and cancellation keeps its own pair of
/// variants so an operator can tell a deadline from an external stop.
#[derive(Debug, Error)]
pub enum CollectError {
    /// A select/exclude glob failed to compile
    #[error("invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// A redaction regex failed to compile
    #[error("invalid redaction matcher '{matcher}': {source}")]
    InvalidMatcher {
        matcher: String,
        source: regex::Error,
    },

    /// A command line could not be split into program + args
    #[error("cannot parse command '{command}': {reason}")]
    CommandParse { command: String, reason: String },

    /// A required configuration field was left empty
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A [since, until) window that ends before it starts
    #[error("time window ends before it starts ({since} >= {until})")]
    InvalidWindow {
        since: chrono::DateTime<chrono::Utc>,
        until: chrono::DateTime<chrono::Utc>,
    },

    /// The program named by a command runner is not on PATH
    #[error("binary not found: {0}")]
    BinaryNotFound(String),

    /// The log backend is present but does not know the requested unit
    #[error("service '{0}' is not known to the log backend")]
    ServiceNotFound(String),

    /// The log backend itself cannot be invoked
    #[error("log backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Output that was expected to be JSON failed to decode
    #[error("output is not valid JSON: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// A subprocess exited with a non-zero status
    #[error("command exited with status {code}")]
    CommandExit { code: i32 },

    /// A non-2xx HTTP response
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The HTTP request never produced a response
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The destination directory could not be created
    #[error("failed to create destination {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Source enumeration failed mid-walk
    #[error("failed to enumerate sources under {path}: {source}")]
    WalkSource {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// A single file copy failed
    #[error("failed to copy {path}: {source}")]
    CopyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A composite stopped because one of its children did not succeed
    #[error("{parent}: child '{child}' failed: {reason}")]
    ChildFailed {
        parent: String,
        child: String,
        reason: String,
    },

    #[error("context canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}
