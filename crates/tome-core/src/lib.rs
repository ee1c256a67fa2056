//! # tome-core
//!
//! Core functionality for tome - a canonical documentation index with
//! subsection-aware search and drift reconciliation.
//!
//! The index is a persisted mapping from stable document identifiers to
//! source metadata and local file locations. This crate loads and saves
//! that mapping atomically, ranks documents (and their subsections)
//! against queries with a deterministic weighted scoring function, and
//! periodically reconciles the index against its two moving sources of
//! truth: the local filesystem and the remote site the documents came
//! from.
//!
//! ## Architecture
//!
//! - **Configuration**: layered defaults, TOML file, and environment
//!   overrides, injected into components rather than held globally
//! - **Storage**: atomic, lock-guarded persistence of the canonical index
//! - **Parsing**: tree-sitter based markdown heading structure and
//!   subsection extraction
//! - **Search**: explainable domain-weighted ranking over titles,
//!   keywords, and subsections
//! - **Reconciliation**: sitemap diffing, bounded-concurrency
//!   reachability checks, and audited cleanup of drifted entries
//!
//! ## Quick start
//!
//! ```rust
//! use tome_core::{Config, SectionExtractor};
//!
//! let config = Config::default();
//! let mut extractor = SectionExtractor::new()?;
//! let headings = extractor.parse_headings("# Guide\n\n## Setup\nSteps.\n")?;
//!
//! assert_eq!(headings.len(), 2);
//! assert_eq!(headings[1].title, "Setup");
//! # let _ = config;
//! # Ok::<(), tome_core::Error>(())
//! ```
//!
//! ## Error handling
//!
//! All operations return [`Result<T, Error>`]. Scan and report operations
//! never mutate state on error and return partial results where possible;
//! apply-mode cleanup collects per-item failures and keeps going.

/// Audited removal of entries whose file or source URL is gone
pub mod cleaner;
/// Layered configuration with explicit reload
pub mod config;
/// Sitemap-vs-index change detection and reporting
pub mod detector;
/// Error types and result alias
pub mod error;
/// HTTP client for sitemap fetches and reachability checks
pub mod fetcher;
/// Heading and query text normalization
pub mod heading;
/// Tree-sitter based markdown section extraction
pub mod parser;
/// Deterministic ranked search over the index
pub mod search;
/// Sitemap XML ingestion
pub mod sitemap;
/// Atomic, lock-guarded index persistence
pub mod storage;
/// Index entries and the canonical index mapping
pub mod types;

// Re-export commonly used types
pub use cleaner::{
    CleanOutcome, CleanupAction, CleanupFailure, CleanupMode, CleanupRecord, DriftCleaner,
};
pub use config::{Config, NetworkConfig, PathsConfig, SearchConfig};
pub use detector::{ChangeSet, detect_changes, generate_report};
pub use error::{Error, Result};
pub use fetcher::{Fetcher, UrlStatus, content_hash};
pub use parser::{Heading, SectionExtractor};
pub use search::{CorpusReader, FileCorpusReader, RankedHit, SearchRanker};
pub use sitemap::{fetch_sitemap, parse_sitemap};
pub use storage::{IndexStore, ListFilter};
pub use types::{CanonicalIndex, IndexEntry};
