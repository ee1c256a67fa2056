//! Error types and handling for tome-core operations.
//!
//! A single crate-wide [`Error`] enum covers index persistence, markdown
//! parsing, sitemap ingestion, configuration, and network checks. Errors
//! carry enough context to tell apart the failure classes that matter
//! operationally: a missing index file is not an error at all (an index is
//! lazily created), while a present-but-unparsable index file is
//! [`Error::Corruption`] and must never be silently treated as empty.
//!
//! Network unreachability is intentionally *not* represented here: a HEAD
//! check that times out resolves to `UrlStatus::Unknown` data rather than an
//! error, so that "could not reach" never collapses into "confirmed 404".

use thiserror::Error;

/// The main error type for tome-core operations.
///
/// All public functions in tome-core return `Result<T, Error>`. The enum
/// includes automatic conversion from common library errors and provides
/// metadata helpers ([`Error::is_recoverable`], [`Error::category`]) for
/// retry logic and reporting.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers filesystem operations like reading documents, writing the
    /// index, and creating directories. The underlying `std::io::Error` is
    /// preserved.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers HTTP requests for fetching sitemaps. Note that reachability
    /// *checks* do not produce this error; see the module docs.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Parsing operation failed.
    ///
    /// Malformed sitemap XML or markdown that tree-sitter cannot process at
    /// all. The message names the offending source where known.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The index file exists but cannot be parsed into the expected shape.
    ///
    /// Distinct from "file absent" (which loads as an empty index). Also
    /// raised when a top-level key disagrees with the `doc_id` stored in its
    /// entry, since that means the file was hand-edited inconsistently.
    #[error("Index corruption: {0}")]
    Corruption(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// A *missing* configuration file is not an error (defaults apply);
    /// this covers malformed TOML and unparsable override values.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for errors that are typically temporary (timeouts,
    /// interrupted I/O, transient network failures) and `false` for
    /// permanent ones (corruption, parse failures, bad configuration).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            Self::Network(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Stable category label for reporting and metrics.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Corruption(_) => "corruption",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenient result alias used throughout tome-core.
pub type Result<T> = std::result::Result<T, Error>;
