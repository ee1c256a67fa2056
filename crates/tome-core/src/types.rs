//! Core data types: index entries and the canonical index mapping.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Metadata for one indexed document.
///
/// `doc_id` is the primary key: globally unique and stable across re-scrapes
/// of the same URL. `local_path` is relative to the configured base
/// directory and must reference an existing file for the entry to be
/// considered live. Unknown keys produced by the scrape pipeline are kept in
/// the `extra` bag rather than threaded through as an open dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Stable unique identifier for the document.
    pub doc_id: String,
    /// The page the document was scraped from.
    pub source_url: String,
    /// Source domain, used for ranking weights.
    pub domain: String,
    /// Coarse content category, used for filtering.
    pub category: String,
    /// Document location relative to the configured base directory.
    pub local_path: PathBuf,
    /// Document title.
    pub title: String,
    /// Keywords in insertion order (order is a relevance tie-break input).
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Publication date, when the source exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<NaiveDate>,
    /// Base64 SHA-256 of the document content at last scrape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// When the source URL was last confirmed reachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
    /// Untyped extension bag for scraper-specific metadata.
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Insertion-ordered mapping from `doc_id` to [`IndexEntry`].
///
/// Persisted as a single JSON object with one top-level key per `doc_id`.
/// Entry order is meaningful (diff-friendliness, deterministic fallback
/// ranking), so load/save round-trips never reorder beyond the caller's
/// intent. A `BTreeMap` would sort caller-authored files on save, which is
/// exactly the reordering this type exists to avoid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalIndex {
    entries: Vec<IndexEntry>,
}

impl CanonicalIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry by `doc_id`.
    #[must_use]
    pub fn get(&self, doc_id: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.doc_id == doc_id)
    }

    /// Inserts or replaces an entry.
    ///
    /// A replaced entry keeps its position; a new entry is appended. Returns
    /// the previous entry when one existed.
    pub fn insert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        match self.entries.iter_mut().find(|e| e.doc_id == entry.doc_id) {
            Some(slot) => Some(std::mem::replace(slot, entry)),
            None => {
                self.entries.push(entry);
                None
            },
        }
    }

    /// Removes an entry by `doc_id`, preserving the order of the rest.
    pub fn remove(&mut self, doc_id: &str) -> Option<IndexEntry> {
        let pos = self.entries.iter().position(|e| e.doc_id == doc_id)?;
        Some(self.entries.remove(pos))
    }

    /// Iterates entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// All indexed source URLs, deduplicated.
    #[must_use]
    pub fn source_urls(&self) -> BTreeSet<String> {
        self.entries.iter().map(|e| e.source_url.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a CanonicalIndex {
    type Item = &'a IndexEntry;
    type IntoIter = std::slice::Iter<'a, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for CanonicalIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.doc_id, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CanonicalIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct IndexVisitor;

        impl<'de> Visitor<'de> for IndexVisitor {
            type Value = CanonicalIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of doc_id to index entry")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut index = CanonicalIndex {
                    entries: Vec::with_capacity(access.size_hint().unwrap_or(0)),
                };

                while let Some((key, entry)) = access.next_entry::<String, IndexEntry>()? {
                    if entry.doc_id != key {
                        return Err(de::Error::custom(format!(
                            "entry under key '{key}' declares doc_id '{}'",
                            entry.doc_id
                        )));
                    }
                    if index.get(&key).is_some() {
                        return Err(de::Error::custom(format!("duplicate doc_id '{key}'")));
                    }
                    index.entries.push(entry);
                }

                Ok(index)
            }
        }

        deserializer.deserialize_map(IndexVisitor)
    }
}
