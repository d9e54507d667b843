//! Error type shared by the conformance harness crates.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for the conformance harness.
///
/// Variants follow the harness error taxonomy: fetch failures (`Http`,
/// `Scrape`, plus low-level `Io`/`Json`) are recoverable and land in the
/// retry list; fixture parse failures and configuration errors are fatal.
#[derive(Error, Debug)]
pub enum HarnessError {
    // === I/O ===
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Fixtures ===
    /// A fixture file on disk could not be decoded.
    #[error("malformed fixture '{path}': {detail}")]
    FixtureParse { path: PathBuf, detail: String },

    /// JSON encoding or decoding failed outside of fixture files.
    #[error("JSON error in {context}: {detail}")]
    Json { context: String, detail: String },

    // === Collaborators ===
    /// Plain HTTP request failed (network error, non-success status, body read).
    #[error("HTTP request for {url} failed: {detail}")]
    Http { url: String, detail: String },

    /// The external scraper could not produce a page snapshot.
    #[error("scrape of {url} failed: {detail}")]
    Scrape { url: String, detail: String },

    /// The evaluation engine failed or returned an unusable response.
    #[error("evaluation engine error: {detail}")]
    Engine { detail: String },

    /// An external process violated the line protocol.
    #[error("collaborator protocol violation: {detail}")]
    Protocol { detail: String },

    // === Oracle ===
    /// A registered answer does not match the kind the question declares.
    #[error("answer for {question} has kind {provided}, question expects {declared}")]
    AnswerKindMismatch {
        question: String,
        declared: String,
        provided: String,
    },

    // === Configuration ===
    /// Suite or command-line configuration is invalid.
    #[error("configuration error: {detail}")]
    Config { detail: String },

    /// Requested upstream test-case registry does not exist.
    #[error("unknown test case source '{name}', use either \"old\", \"new\", or none")]
    UnknownSource { name: String },

    /// Internal logic error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HarnessError {
    /// Whether this error is a per-descriptor fetch failure that belongs in
    /// the batch retry list rather than aborting the run.
    pub const fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Scrape { .. } | Self::Io(_) | Self::Json { .. }
        )
    }

    /// Whether this error can only be fixed by editing inputs or code.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FixtureParse { .. }
                | Self::AnswerKindMismatch { .. }
                | Self::Config { .. }
                | Self::UnknownSource { .. }
                | Self::Internal(_)
        )
    }

    /// Process exit status for binaries that stop on this error.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } | Self::UnknownSource { .. } | Self::Internal(_) => 2,
            _ => 1,
        }
    }

    /// Create an HTTP failure.
    pub fn http(url: impl Into<String>, detail: impl ToString) -> Self {
        Self::Http {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Create a scraper failure.
    pub fn scrape(url: impl Into<String>, detail: impl ToString) -> Self {
        Self::Scrape {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Create a JSON failure tagged with what was being processed.
    pub fn json(context: impl Into<String>, detail: impl ToString) -> Self {
        Self::Json {
            context: context.into(),
            detail: detail.to_string(),
        }
    }

    /// Create a fixture parse failure.
    pub fn fixture_parse(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        Self::FixtureParse {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// Create an evaluation engine error.
    pub fn engine(detail: impl Into<String>) -> Self {
        Self::Engine {
            detail: detail.into(),
        }
    }

    /// Create a protocol violation error.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `HarnessError`.
pub type Result<T> = std::result::Result<T, HarnessError>;
