//! Drift reconciliation between the index, the filesystem, and the origin.
//!
//! A cleanup run walks a fixed pipeline: scan the index, classify each
//! entry (missing file, 404'd URL, or healthy), then either report what
//! would change (dry run) or apply the removals and persist. There is no
//! partial-apply terminal state: per-item failures are collected and
//! surfaced while the run still completes, and nothing rolls back prior
//! successful removals.
//!
//! Every applied action lands in an ordered cleanup log that renders into
//! a human-readable audit trail, so each removal stays traceable to its
//! `doc_id` and timestamp.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{CanonicalIndex, Fetcher, IndexStore, Result};

/// Whether a cleanup run mutates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupMode {
    /// Scan and report only; the filesystem and index are left untouched.
    #[default]
    DryRun,
    /// Remove stale entries (and orphaned files) and persist the index.
    Apply,
}

/// Kind of action recorded in the cleanup log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    /// A backing file was deleted from disk.
    RemoveFile,
    /// An entry was removed from the canonical index.
    RemoveIndexEntry,
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveFile => f.write_str("Remove File"),
            Self::RemoveIndexEntry => f.write_str("Remove Index Entry"),
        }
    }
}

/// One applied cleanup action.
#[derive(Debug, Clone)]
pub struct CleanupRecord {
    /// What was done.
    pub action: CleanupAction,
    /// The entry the action belongs to.
    pub doc_id: String,
    /// Affected file, when the action touched disk.
    pub filepath: Option<PathBuf>,
    /// When the action was performed.
    pub timestamp: DateTime<Utc>,
}

/// A per-item failure collected during an apply run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// The entry that could not be fully cleaned.
    pub doc_id: String,
    /// Why.
    pub reason: String,
}

/// Terminal summary of one cleanup run.
///
/// `mode == DryRun` is the `ReportOnly` terminal state: the counts describe
/// what *would* happen. `mode == Apply` is the `Applied` terminal state,
/// possibly with a non-empty `errors` list; there is no partial-apply
/// state.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutcome {
    /// Mode the run executed in.
    pub mode: CleanupMode,
    /// Entries (or URLs) inspected during the scan.
    pub checked: usize,
    /// Entries removed (apply) or that would be removed (dry run), in
    /// index order.
    pub removed_doc_ids: Vec<String>,
    /// Per-item failures; never causes a rollback.
    pub errors: Vec<CleanupFailure>,
}

impl CleanOutcome {
    /// Number of removed (or would-be-removed) entries.
    #[must_use]
    pub fn entries_removed(&self) -> usize {
        self.removed_doc_ids.len()
    }
}

/// Finds and removes index entries whose backing file or source URL is gone.
pub struct DriftCleaner<'a> {
    store: &'a IndexStore,
    base_dir: PathBuf,
    mode: CleanupMode,
    cleanup_log: Vec<CleanupRecord>,
}

impl<'a> DriftCleaner<'a> {
    /// Creates a cleaner in dry-run mode.
    #[must_use]
    pub const fn new(store: &'a IndexStore, base_dir: PathBuf) -> Self {
        Self {
            store,
            base_dir,
            mode: CleanupMode::DryRun,
            cleanup_log: Vec::new(),
        }
    }

    /// Sets the run mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: CleanupMode) -> Self {
        self.mode = mode;
        self
    }

    /// Entries whose `local_path` does not exist on disk, in index order.
    ///
    /// Pure read; never mutates and never fails on drift.
    #[must_use]
    pub fn find_missing_files(&self, index: &CanonicalIndex) -> Vec<(String, PathBuf)> {
        index
            .iter()
            .filter(|entry| !self.base_dir.join(&entry.local_path).exists())
            .map(|entry| (entry.doc_id.clone(), entry.local_path.clone()))
            .collect()
    }

    /// Local paths shared by more than one entry: a data-quality smell,
    /// legal in the index but worth surfacing.
    #[must_use]
    pub fn find_duplicate_paths(&self, index: &CanonicalIndex) -> Vec<(PathBuf, Vec<String>)> {
        let mut by_path: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for entry in index {
            by_path
                .entry(entry.local_path.clone())
                .or_default()
                .push(entry.doc_id.clone());
        }
        by_path
            .into_iter()
            .filter(|(_, doc_ids)| doc_ids.len() > 1)
            .collect()
    }

    /// Entries whose on-disk content no longer matches their recorded
    /// `content_hash`, in index order.
    ///
    /// Entries without a recorded hash or without a backing file are
    /// skipped; missing files are [`Self::find_missing_files`]'s finding.
    #[must_use]
    pub fn find_modified_files(&self, index: &CanonicalIndex) -> Vec<(String, PathBuf)> {
        index
            .iter()
            .filter_map(|entry| {
                let recorded = entry.content_hash.as_deref()?;
                let content = fs::read_to_string(self.base_dir.join(&entry.local_path)).ok()?;
                (crate::fetcher::content_hash(&content) != recorded)
                    .then(|| (entry.doc_id.clone(), entry.local_path.clone()))
            })
            .collect()
    }

    /// Entries whose source URL the origin confirms gone, in index order.
    ///
    /// Uses bounded-concurrency HEAD checks; timeouts and transport errors
    /// classify as unknown and are never reported here.
    pub async fn find_404_urls(
        &self,
        index: &CanonicalIndex,
        fetcher: &Fetcher,
        max_workers: usize,
    ) -> Vec<(String, String)> {
        let statuses = fetcher
            .check_urls(index.source_urls().into_iter().collect::<Vec<_>>(), max_workers)
            .await;

        index
            .iter()
            .filter(|entry| statuses.get(&entry.source_url).is_some_and(|s| s.is_gone()))
            .map(|entry| (entry.doc_id.clone(), entry.source_url.clone()))
            .collect()
    }

    /// Removes entries whose backing file is missing.
    ///
    /// In dry-run mode nothing is touched and the outcome reports what an
    /// apply run would remove. In apply mode the removals run inside one
    /// exclusive load→mutate→save cycle.
    pub fn clean_missing_files(&mut self) -> Result<CleanOutcome> {
        if self.mode == CleanupMode::DryRun {
            let index = self.store.load()?;
            let missing = self.find_missing_files(&index);
            return Ok(CleanOutcome {
                mode: CleanupMode::DryRun,
                checked: index.len(),
                removed_doc_ids: missing.into_iter().map(|(doc_id, _)| doc_id).collect(),
                errors: Vec::new(),
            });
        }

        let store = self.store;
        let base_dir = self.base_dir.clone();
        let log = &mut self.cleanup_log;

        store.update(move |index| {
            let missing: Vec<(String, PathBuf)> = index
                .iter()
                .filter(|entry| !base_dir.join(&entry.local_path).exists())
                .map(|entry| (entry.doc_id.clone(), entry.local_path.clone()))
                .collect();

            let checked = index.len();
            let mut removed_doc_ids = Vec::new();
            let mut errors = Vec::new();

            for (doc_id, local_path) in missing {
                if index.remove(&doc_id).is_some() {
                    info!(doc_id = %doc_id, path = %local_path.display(), "removing entry with missing file");
                    log.push(CleanupRecord {
                        action: CleanupAction::RemoveIndexEntry,
                        doc_id: doc_id.clone(),
                        filepath: Some(local_path),
                        timestamp: Utc::now(),
                    });
                    removed_doc_ids.push(doc_id);
                } else {
                    errors.push(CleanupFailure {
                        doc_id,
                        reason: "entry vanished between scan and removal".to_string(),
                    });
                }
            }

            Ok(CleanOutcome {
                mode: CleanupMode::Apply,
                checked,
                removed_doc_ids,
                errors,
            })
        })
    }

    /// Removes entries whose source URL the origin confirms gone, along
    /// with their now-orphaned backing files.
    ///
    /// A file that fails to delete is collected as a per-item failure; the
    /// entry removal stands regardless (best-effort, no rollback).
    pub async fn clean_stale_urls(
        &mut self,
        fetcher: &Fetcher,
        max_workers: usize,
    ) -> Result<CleanOutcome> {
        let index = self.store.load()?;
        let stale = self.find_404_urls(&index, fetcher, max_workers).await;
        let checked = index.source_urls().len();

        if self.mode == CleanupMode::DryRun {
            return Ok(CleanOutcome {
                mode: CleanupMode::DryRun,
                checked,
                removed_doc_ids: stale.into_iter().map(|(doc_id, _)| doc_id).collect(),
                errors: Vec::new(),
            });
        }

        let store = self.store;
        let base_dir = self.base_dir.clone();
        let log = &mut self.cleanup_log;

        store.update(move |index| {
            let mut removed_doc_ids = Vec::new();
            let mut errors = Vec::new();

            for (doc_id, source_url) in stale {
                let Some(entry) = index.remove(&doc_id) else {
                    errors.push(CleanupFailure {
                        doc_id,
                        reason: "entry vanished between scan and removal".to_string(),
                    });
                    continue;
                };

                info!(doc_id = %doc_id, url = %source_url, "removing entry with 404'd source");
                log.push(CleanupRecord {
                    action: CleanupAction::RemoveIndexEntry,
                    doc_id: doc_id.clone(),
                    filepath: Some(entry.local_path.clone()),
                    timestamp: Utc::now(),
                });

                let file = base_dir.join(&entry.local_path);
                match fs::remove_file(&file) {
                    Ok(()) => log.push(CleanupRecord {
                        action: CleanupAction::RemoveFile,
                        doc_id: doc_id.clone(),
                        filepath: Some(entry.local_path.clone()),
                        timestamp: Utc::now(),
                    }),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                    Err(err) => {
                        warn!(doc_id = %doc_id, path = %file.display(), error = %err, "failed to delete orphaned file");
                        errors.push(CleanupFailure {
                            doc_id: doc_id.clone(),
                            reason: format!("failed to delete {}: {err}", file.display()),
                        });
                    },
                }

                removed_doc_ids.push(doc_id);
            }

            Ok(CleanOutcome {
                mode: CleanupMode::Apply,
                checked,
                removed_doc_ids,
                errors,
            })
        })
    }

    /// Actions applied so far in this run, in order.
    #[must_use]
    pub fn records(&self) -> &[CleanupRecord] {
        &self.cleanup_log
    }

    /// Renders the cleanup log grouped by action kind.
    #[must_use]
    pub fn generate_audit_log(&self) -> String {
        use std::fmt::Write as _;

        if self.cleanup_log.is_empty() {
            return "No cleanup actions recorded.\n".to_string();
        }

        let mut report = String::from("=== Cleanup audit log ===\n");
        for action in [CleanupAction::RemoveFile, CleanupAction::RemoveIndexEntry] {
            let records: Vec<&CleanupRecord> = self
                .cleanup_log
                .iter()
                .filter(|r| r.action == action)
                .collect();
            if records.is_empty() {
                continue;
            }

            let _ = writeln!(report, "\n{action} ({}):", records.len());
            for record in records {
                let _ = write!(
                    report,
                    "  [{}] {}",
                    record.timestamp.to_rfc3339(),
                    record.doc_id
                );
                if let Some(path) = &record.filepath {
                    let _ = write!(report, " ({})", path.display());
                }
                report.push('\n');
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexEntry;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(doc_id: &str, source_url: &str, local_path: &str) -> IndexEntry {
        IndexEntry {
            doc_id: doc_id.to_string(),
            source_url: source_url.to_string(),
            domain: "docs.example.com".to_string(),
            category: "guide".to_string(),
            local_path: PathBuf::from(local_path),
            title: doc_id.to_string(),
            keywords: Vec::new(),
            published_at: None,
            content_hash: None,
            last_verified_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Builds a corpus of three entries, only two of which have files.
    fn seeded(dir: &tempfile::TempDir) -> IndexStore {
        let store = IndexStore::new(dir.path().join("index.json"));
        fs::write(dir.path().join("kept.md"), "# Kept\n").unwrap();
        fs::write(dir.path().join("other.md"), "# Other\n").unwrap();
        store
            .update(|index| {
                index.insert(entry("kept", "https://docs.example.com/kept", "kept.md"));
                index.insert(entry("lost", "https://docs.example.com/lost", "lost.md"));
                index.insert(entry("other", "https://docs.example.com/other", "other.md"));
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn finds_exactly_the_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir);
        let cleaner = DriftCleaner::new(&store, dir.path().to_path_buf());

        let missing = cleaner.find_missing_files(&store.load().unwrap());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, "lost");
        assert_eq!(missing[0].1, PathBuf::from("lost.md"));
    }

    #[test]
    fn finds_duplicate_path_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir);
        store
            .update(|index| {
                index.insert(entry("twin", "https://docs.example.com/twin", "kept.md"));
                Ok(())
            })
            .unwrap();

        let cleaner = DriftCleaner::new(&store, dir.path().to_path_buf());
        let dupes = cleaner.find_duplicate_paths(&store.load().unwrap());
        assert_eq!(dupes.len(), 1);
        assert_eq!(dupes[0].0, PathBuf::from("kept.md"));
        assert_eq!(dupes[0].1, vec!["kept".to_string(), "twin".to_string()]);
    }

    #[test]
    fn detects_locally_modified_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.json"));
        fs::write(dir.path().join("stable.md"), "# Stable\n").unwrap();
        fs::write(dir.path().join("edited.md"), "# Edited\n").unwrap();
        store
            .update(|index| {
                let mut stable = entry("stable", "https://docs.example.com/s", "stable.md");
                stable.content_hash = Some(crate::fetcher::content_hash("# Stable\n"));
                index.insert(stable);
                let mut edited = entry("edited", "https://docs.example.com/e", "edited.md");
                edited.content_hash = Some(crate::fetcher::content_hash("# Original\n"));
                index.insert(edited);
                // No hash recorded: never reported
                index.insert(entry("unhashed", "https://docs.example.com/u", "stable.md"));
                Ok(())
            })
            .unwrap();

        let cleaner = DriftCleaner::new(&store, dir.path().to_path_buf());
        let modified = cleaner.find_modified_files(&store.load().unwrap());
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].0, "edited");
    }

    #[test]
    fn dry_run_reports_without_touching_anything() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir);
        let index_bytes = fs::read(store.index_path()).unwrap();

        let mut cleaner = DriftCleaner::new(&store, dir.path().to_path_buf());
        let first = cleaner.clean_missing_files().unwrap();
        let second = cleaner.clean_missing_files().unwrap();

        assert_eq!(first.mode, CleanupMode::DryRun);
        assert_eq!(first.checked, 3);
        assert_eq!(first.entries_removed(), 1);
        assert_eq!(first.removed_doc_ids, vec!["lost".to_string()]);
        // Back-to-back dry runs agree and mutate nothing
        assert_eq!(first, second);
        assert_eq!(fs::read(store.index_path()).unwrap(), index_bytes);
        assert_eq!(store.load().unwrap().len(), 3);
        assert!(cleaner.records().is_empty());
        assert!(cleaner.generate_audit_log().contains("No cleanup actions"));
    }

    #[test]
    fn apply_removes_and_persists_missing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir);

        let mut cleaner =
            DriftCleaner::new(&store, dir.path().to_path_buf()).with_mode(CleanupMode::Apply);
        let outcome = cleaner.clean_missing_files().unwrap();

        assert_eq!(outcome.mode, CleanupMode::Apply);
        assert_eq!(outcome.entries_removed(), 1);
        assert!(outcome.errors.is_empty());

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.get("lost").is_none());
        assert!(reloaded.get("kept").is_some());

        // Every removal is traceable in the audit log
        let audit = cleaner.generate_audit_log();
        assert!(audit.contains("Remove Index Entry (1):"));
        assert!(audit.contains("lost"));
        assert!(audit.contains("lost.md"));
    }

    #[tokio::test]
    async fn confirms_only_actual_404s() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/healthy"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.json"));
        let base = server.uri();
        store
            .update(|index| {
                index.insert(entry("h", &format!("{base}/healthy"), "h.md"));
                index.insert(entry("g", &format!("{base}/gone"), "g.md"));
                index.insert(entry("s", &format!("{base}/slow"), "s.md"));
                Ok(())
            })
            .unwrap();

        let fetcher = Fetcher::with_timeout(Duration::from_millis(200)).unwrap();
        let cleaner = DriftCleaner::new(&store, dir.path().to_path_buf());
        let stale = cleaner
            .find_404_urls(&store.load().unwrap(), &fetcher, 4)
            .await;

        // The timeout URL is unknown, not stale; the healthy one is healthy
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, "g");
    }

    #[tokio::test]
    async fn stale_url_cleanup_removes_entry_and_file() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/kept"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/dead"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.json"));
        fs::write(dir.path().join("kept.md"), "# Kept\n").unwrap();
        fs::write(dir.path().join("dead.md"), "# Dead\n").unwrap();
        let base = server.uri();
        store
            .update(|index| {
                index.insert(entry("kept", &format!("{base}/kept"), "kept.md"));
                index.insert(entry("dead", &format!("{base}/dead"), "dead.md"));
                Ok(())
            })
            .unwrap();

        let fetcher = Fetcher::with_timeout(Duration::from_secs(2)).unwrap();
        let mut cleaner =
            DriftCleaner::new(&store, dir.path().to_path_buf()).with_mode(CleanupMode::Apply);
        let outcome = cleaner.clean_stale_urls(&fetcher, 4).await.unwrap();

        assert_eq!(outcome.removed_doc_ids, vec!["dead".to_string()]);
        assert!(outcome.errors.is_empty());
        assert!(store.load().unwrap().get("dead").is_none());
        assert!(!dir.path().join("dead.md").exists());
        assert!(dir.path().join("kept.md").exists());

        let audit = cleaner.generate_audit_log();
        assert!(audit.contains("Remove Index Entry (1):"));
        assert!(audit.contains("Remove File (1):"));
    }
}
