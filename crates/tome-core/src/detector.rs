//! Change detection between a remote sitemap and the indexed URL set.
//!
//! Pure set algebra: a URL on the site but not in the index is new, a URL
//! in the index but no longer on the site is removed. No fuzzy URL
//! normalization happens here; callers canonicalize before diffing.

use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Result of diffing the sitemap URL set against the indexed URL set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    /// URLs on the site that are not indexed yet.
    pub new_urls: BTreeSet<String>,
    /// URLs still indexed that the site no longer lists.
    pub removed_urls: BTreeSet<String>,
}

impl ChangeSet {
    /// True when the index and the sitemap agree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_urls.is_empty() && self.removed_urls.is_empty()
    }
}

/// Computes `(sitemap − indexed, indexed − sitemap)`.
#[must_use]
pub fn detect_changes(
    sitemap_urls: &BTreeSet<String>,
    indexed_urls: &BTreeSet<String>,
) -> ChangeSet {
    ChangeSet {
        new_urls: sitemap_urls.difference(indexed_urls).cloned().collect(),
        removed_urls: indexed_urls.difference(sitemap_urls).cloned().collect(),
    }
}

/// Renders a human-readable change summary.
///
/// Purely a presentation function with no side effects. URLs are listed in
/// sorted order so the same inputs always render the same report.
#[must_use]
pub fn generate_report(
    new_urls: &BTreeSet<String>,
    removed_urls: &BTreeSet<String>,
    indexed_urls: &BTreeSet<String>,
    label: &str,
) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "=== Change report: {label} ===");
    let _ = writeln!(report, "Indexed URLs:  {}", indexed_urls.len());
    let _ = writeln!(report, "New on site:   {}", new_urls.len());
    let _ = writeln!(report, "Gone from site: {}", removed_urls.len());

    if new_urls.is_empty() && removed_urls.is_empty() {
        let _ = writeln!(report, "\nIndex and sitemap agree; no drift detected.");
        return report;
    }

    if !new_urls.is_empty() {
        let _ = writeln!(report, "\nNew URLs (not indexed yet):");
        for url in new_urls {
            let _ = writeln!(report, "  + {url}");
        }
    }

    if !removed_urls.is_empty() {
        let _ = writeln!(report, "\nRemoved URLs (still indexed):");
        for url in removed_urls {
            let _ = writeln!(report, "  - {url}");
        }
    }

    report
}
