//! Configuration for the index, search, and reconciliation components.
//!
//! Configuration layers, lowest precedence first: built-in defaults, an
//! optional TOML file, then `TOME_<SECTION>_<KEY>` environment variables.
//! A missing file is not an error (defaults apply); a malformed file or an
//! unparsable override value is [`Error::Config`].
//!
//! There is no ambient global configuration: callers construct a [`Config`]
//! once and pass it into the components that need it. Picking up external
//! changes is an explicit [`Config::reload`] call on that object.
//!
//! ## Example file
//!
//! ```toml
//! [paths]
//! root = "/var/lib/tome"
//! index_file = "index.json"
//!
//! [network]
//! timeout_secs = 10
//! max_workers = 16
//!
//! [search]
//! fallback_weight = 1.0
//! stop_words = ["docs", "documentation", "acme"]
//!
//! [search.domain_weights]
//! "docs.acme.dev" = 2.0
//! "blog.acme.dev" = 0.5
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

const ENV_PREFIX: &str = "TOME";

/// Process configuration consumed by the core components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Remote-check behavior.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Ranking weights and filters.
    #[serde(default)]
    pub search: SearchConfig,
    /// Where this configuration was loaded from, for [`Config::reload`].
    #[serde(skip)]
    source_path: Option<PathBuf>,
}

/// Filesystem locations used by the store and the cleaner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Base directory that `local_path` values are resolved against.
    pub root: PathBuf,
    /// Index filename within the base directory.
    pub index_file: String,
}

/// Remote-check behavior for sitemap fetches and reachability probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on concurrent HEAD checks.
    pub max_workers: usize,
}

/// Ranking weights and query filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Multiplier per source domain. Domains absent from the map use
    /// `fallback_weight`.
    pub domain_weights: BTreeMap<String, f64>,
    /// Weight for domains not present in `domain_weights`.
    pub fallback_weight: f64,
    /// Terms removed from queries before matching, typically the corpus's
    /// own brand and filler vocabulary.
    pub stop_words: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            index_file: "index.json".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_workers: 8,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            domain_weights: BTreeMap::new(),
            fallback_weight: 1.0,
            stop_words: [
                "the", "a", "an", "and", "or", "of", "to", "in", "for", "docs",
                "documentation",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            network: NetworkConfig::default(),
            search: SearchConfig::default(),
            source_path: None,
        }
    }
}

fn default_root() -> PathBuf {
    directories::ProjectDirs::from("io", "tome", "tome").map_or_else(
        || PathBuf::from(".tome"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

impl Config {
    /// Load configuration from the default location, then apply environment
    /// overrides.
    ///
    /// The default location is `tome.toml` inside the platform config
    /// directory, overridable with `TOME_CONFIG_DIR`.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit file path, then apply environment
    /// overrides. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
            toml::from_str::<Self>(&content)
                .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?
        } else {
            debug!(path = %path.display(), "config file absent, using defaults");
            Self::default()
        };

        config.source_path = Some(path.to_path_buf());
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Re-run the load-and-layer cycle against the same source path.
    pub fn reload(&mut self) -> Result<()> {
        let path = match self.source_path.clone() {
            Some(path) => path,
            None => Self::config_path()?,
        };
        *self = Self::load_from(&path)?;
        Ok(())
    }

    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    /// Absolute path of the index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.paths.root.join(&self.paths.index_file)
    }

    fn config_path() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(format!("{ENV_PREFIX}_CONFIG_DIR")) {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed).join("tome.toml"));
            }
        }

        let project_dirs = directories::ProjectDirs::from("io", "tome", "tome")
            .ok_or_else(|| Error::Config("failed to determine config directory".into()))?;
        Ok(project_dirs.config_dir().join("tome.toml"))
    }

    /// Apply `TOME_<SECTION>_<KEY>` overrides from the supplied lookup.
    ///
    /// Split out from [`Config::load_from`] so tests can drive it with a
    /// plain map instead of process-global environment state.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = get(&var("PATHS_ROOT")) {
            self.paths.root = PathBuf::from(value);
        }
        if let Some(value) = get(&var("PATHS_INDEX_FILE")) {
            self.paths.index_file = value;
        }
        if let Some(value) = get(&var("NETWORK_TIMEOUT_SECS")) {
            self.network.timeout_secs = parse_override(&var("NETWORK_TIMEOUT_SECS"), &value)?;
        }
        if let Some(value) = get(&var("NETWORK_MAX_WORKERS")) {
            self.network.max_workers = parse_override(&var("NETWORK_MAX_WORKERS"), &value)?;
        }
        if let Some(value) = get(&var("SEARCH_FALLBACK_WEIGHT")) {
            self.search.fallback_weight = parse_override(&var("SEARCH_FALLBACK_WEIGHT"), &value)?;
        }
        if let Some(value) = get(&var("SEARCH_STOP_WORDS")) {
            self.search.stop_words = split_list(&value);
        }
        if let Some(value) = get(&var("SEARCH_DOMAIN_WEIGHTS")) {
            self.search.domain_weights = parse_weight_pairs(&value)?;
        }
        Ok(())
    }
}

fn var(suffix: &str) -> String {
    format!("{ENV_PREFIX}_{suffix}")
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value '{value}' for {key}")))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parse `domain=weight` pairs, comma-separated.
fn parse_weight_pairs(value: &str) -> Result<BTreeMap<String, f64>> {
    let mut weights = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (domain, weight) = pair.split_once('=').ok_or_else(|| {
            Error::Config(format!("expected domain=weight, got '{pair}'"))
        })?;
        let weight: f64 = weight
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid weight in '{pair}'")))?;
        weights.insert(domain.trim().to_string(), weight);
    }
    Ok(weights)
}
