//! Persistence for the canonical index.
//!
//! The index is a single JSON file, loaded once per operation, mutated in
//! memory, and persisted atomically (temp file, fsync, rename) so a reader
//! never observes a partial write. The index is not designed for concurrent
//! multi-writer access; instead of relying on "nobody else happens to be
//! running this", every write path holds an exclusive lock on a sibling
//! `.lock` file for the whole load→mutate→save cycle.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::{CanonicalIndex, Config, Error, IndexEntry, Result};

/// Optional filters for [`IndexStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Keep only entries from this domain.
    pub domain: Option<String>,
    /// Keep only entries in this category.
    pub category: Option<String>,
}

impl ListFilter {
    fn matches(&self, entry: &IndexEntry) -> bool {
        self.domain.as_ref().is_none_or(|d| &entry.domain == d)
            && self.category.as_ref().is_none_or(|c| &entry.category == c)
    }
}

/// Load/save access to the canonical index file.
pub struct IndexStore {
    index_path: PathBuf,
}

impl IndexStore {
    /// Creates a store for an explicit index file path.
    #[must_use]
    pub const fn new(index_path: PathBuf) -> Self {
        Self { index_path }
    }

    /// Creates a store at the configured index location.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.index_path())
    }

    /// The index file path this store reads and writes.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Loads the index.
    ///
    /// A missing file loads as an empty index, since the index is lazily
    /// created. A file that exists but cannot be parsed is
    /// [`Error::Corruption`], never silently an empty index.
    pub fn load(&self) -> Result<CanonicalIndex> {
        if !self.index_path.exists() {
            debug!(path = %self.index_path.display(), "index file absent, starting empty");
            return Ok(CanonicalIndex::new());
        }

        let content = fs::read_to_string(&self.index_path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Corruption(format!(
                "index file {} is unreadable: {e}",
                self.index_path.display()
            ))
        })
    }

    /// Persists the index atomically, holding the write lock.
    ///
    /// Entries are written in the order the caller holds them; save never
    /// reorders beyond the caller's intent.
    pub fn save(&self, index: &CanonicalIndex) -> Result<()> {
        let _lock = self.acquire_lock()?;
        self.write_locked(index)
    }

    /// Runs one exclusive load→mutate→save cycle.
    ///
    /// The lock is held across the whole cycle and released on all exit
    /// paths, including when `mutate` fails (in which case nothing is
    /// written).
    pub fn update<T>(
        &self,
        mutate: impl FnOnce(&mut CanonicalIndex) -> Result<T>,
    ) -> Result<T> {
        let _lock = self.acquire_lock()?;
        let mut index = self.load()?;
        let outcome = mutate(&mut index)?;
        self.write_locked(&index)?;
        Ok(outcome)
    }

    /// Looks up one entry by `doc_id`.
    pub fn get(&self, doc_id: &str) -> Result<Option<IndexEntry>> {
        Ok(self.load()?.get(doc_id).cloned())
    }

    /// Inserts or replaces one entry, returning the previous one if any.
    pub fn put(&self, entry: IndexEntry) -> Result<Option<IndexEntry>> {
        self.update(|index| Ok(index.insert(entry)))
    }

    /// Removes one entry by `doc_id`.
    pub fn remove(&self, doc_id: &str) -> Result<Option<IndexEntry>> {
        self.update(|index| Ok(index.remove(doc_id)))
    }

    /// Lists entries in index order, optionally filtered by domain/category.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<IndexEntry>> {
        Ok(self
            .load()?
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    fn acquire_lock(&self) -> Result<fs::File> {
        if let Some(parent) = self.index_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_path = self.index_path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        lock.lock_exclusive()?;
        debug!(path = %lock_path.display(), "acquired index write lock");
        Ok(lock)
    }

    /// Writes the index file. The caller must hold the write lock.
    fn write_locked(&self, index: &CanonicalIndex) -> Result<()> {
        let tmp_path = self.index_path.with_extension("json.tmp");

        let tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut buf = BufWriter::new(tmp);
        serde_json::to_writer_pretty(&mut buf, index)?;
        buf.write_all(b"\n")?;
        buf.flush()?;
        let file = buf
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        match fs::rename(&tmp_path, &self.index_path) {
            Ok(()) => {},
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                fs::remove_file(&self.index_path)?;
                fs::rename(&tmp_path, &self.index_path)?;
            },
            Err(err) => {
                // Clean up the temp file so failed saves do not accumulate.
                let _ = fs::remove_file(&tmp_path);
                return Err(err.into());
            },
        }

        #[cfg(unix)]
        if let Some(parent) = self.index_path.parent() {
            if let Ok(dir) = OpenOptions::new().read(true).open(parent) {
                let _ = dir.sync_all();
            }
        }

        info!(
            path = %self.index_path.display(),
            entries = index.len(),
            "persisted index"
        );
        Ok(())
    }
}
