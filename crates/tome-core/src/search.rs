//! Deterministic ranked search over the canonical index.
//!
//! The scoring model is intentionally explainable: a configured per-domain
//! multiplier times the sum of a title/keyword match score and a subsection
//! match score, both normalized by query length. No fuzzy matching, no
//! learned relevance. A document whose title never mentions the query can
//! still rank when a deeply nested subsection matches, which is how
//! structurally buried content surfaces.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::{
    CanonicalIndex, Config, Heading, IndexEntry, Result, SectionExtractor, heading,
};

/// Content access seam between the ranker and the scraped corpus.
pub trait CorpusReader {
    /// Returns the document's text, or `None` when the backing file is
    /// absent (drift must not crash ranking).
    fn read_document(&self, entry: &IndexEntry) -> Result<Option<String>>;
}

/// Reads documents from `base_dir/local_path`.
pub struct FileCorpusReader {
    base_dir: PathBuf,
}

impl FileCorpusReader {
    /// Creates a reader rooted at an explicit base directory.
    #[must_use]
    pub const fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Creates a reader rooted at the configured base directory.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.paths.root.clone())
    }
}

impl CorpusReader for FileCorpusReader {
    fn read_document(&self, entry: &IndexEntry) -> Result<Option<String>> {
        let path = self.base_dir.join(&entry.local_path);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    /// Identifier of the matched document.
    pub doc_id: String,
    /// Final score: `domain_weight * (title_score + subsection_score)`.
    pub score: f64,
    /// Best-matching subsection title, when a subsection contributed.
    pub matched_subsection: Option<String>,
}

/// Scores and orders index entries against a query.
pub struct SearchRanker {
    domain_weights: std::collections::BTreeMap<String, f64>,
    fallback_weight: f64,
    stop_words: BTreeSet<String>,
}

impl SearchRanker {
    /// Builds a ranker from the configured weights and stop words.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            domain_weights: config.search.domain_weights.clone(),
            fallback_weight: config.search.fallback_weight,
            stop_words: config
                .search
                .stop_words
                .iter()
                .map(|w| heading::normalize(w))
                .collect(),
        }
    }

    /// Ranks every index entry against `query`.
    ///
    /// An empty or all-stop-word query yields no matches (not an error),
    /// as does an empty index. Entries scoring zero are omitted. Ties are
    /// broken by ascending `doc_id` so output is deterministic.
    pub fn rank(
        &self,
        query: &str,
        index: &CanonicalIndex,
        corpus: &dyn CorpusReader,
    ) -> Result<Vec<RankedHit>> {
        let terms = self.query_terms(query);
        if terms.is_empty() {
            debug!("query reduced to no terms after stop-word filtering");
            return Ok(Vec::new());
        }

        let mut extractor = SectionExtractor::new()?;
        let mut hits = Vec::new();

        for entry in index {
            // The weight argument is derived fresh from this candidate's own
            // domain, inside the loop body. Nothing weight-related survives
            // from one iteration to the next.
            let weight = self.domain_weight(&entry.domain);
            let title_score = self.title_keyword_score(entry, &terms);
            let (subsection_score, matched_subsection) =
                self.subsection_score(entry, &terms, corpus, &mut extractor)?;

            let score = weight * (title_score + subsection_score);
            if score > 0.0 {
                hits.push(RankedHit {
                    doc_id: entry.doc_id.clone(),
                    score,
                    matched_subsection,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        Ok(hits)
    }

    /// Weight for one candidate's domain; absent domains use the fallback.
    #[must_use]
    pub fn domain_weight(&self, domain: &str) -> f64 {
        self.domain_weights
            .get(domain)
            .copied()
            .unwrap_or(self.fallback_weight)
    }

    /// Distinct normalized query terms, stop words removed, order kept.
    fn query_terms(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        heading::tokenize(query)
            .into_iter()
            .filter(|term| !self.stop_words.contains(term))
            .filter(|term| seen.insert(term.clone()))
            .collect()
    }

    /// Fraction of query terms present in the entry's title + keywords.
    #[allow(clippy::cast_precision_loss)]
    fn title_keyword_score(&self, entry: &IndexEntry, terms: &[String]) -> f64 {
        let mut tokens: BTreeSet<String> = heading::tokenize(&entry.title).into_iter().collect();
        for keyword in &entry.keywords {
            tokens.extend(heading::tokenize(keyword));
        }

        let matched = terms.iter().filter(|t| tokens.contains(*t)).count();
        matched as f64 / terms.len() as f64
    }

    /// Best per-heading match over the document's subsections.
    ///
    /// A query term found in a heading title counts 1.0, a term found only
    /// in the section body counts 0.5, normalized by query length. Missing
    /// or unparsable documents contribute zero; ranking must survive drift.
    #[allow(clippy::cast_precision_loss)]
    fn subsection_score(
        &self,
        entry: &IndexEntry,
        terms: &[String],
        corpus: &dyn CorpusReader,
        extractor: &mut SectionExtractor,
    ) -> Result<(f64, Option<String>)> {
        let Some(content) = corpus.read_document(entry)? else {
            debug!(doc_id = %entry.doc_id, "backing file missing, scoring title only");
            return Ok((0.0, None));
        };

        let headings = match extractor.parse_headings(&content) {
            Ok(headings) => headings,
            Err(err) => {
                warn!(doc_id = %entry.doc_id, error = %err, "skipping unparsable document");
                return Ok((0.0, None));
            },
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut best: Option<(f64, &Heading)> = None;

        for h in &headings {
            let title_tokens: BTreeSet<String> = heading::tokenize(&h.title).into_iter().collect();
            let body_tokens = section_body_tokens(&lines, h);

            let mut points = 0.0;
            for term in terms {
                if title_tokens.contains(term) {
                    points += 1.0;
                } else if body_tokens.contains(term) {
                    points += 0.5;
                }
            }

            let score = points / terms.len() as f64;
            if score <= 0.0 {
                continue;
            }
            // An ancestor's body contains its children's text, so ties go
            // to the deeper heading; remaining ties keep document order.
            let better = match best {
                None => true,
                Some((best_score, best_heading)) => {
                    matches!(
                        score.partial_cmp(&best_score),
                        Some(Ordering::Greater)
                    ) || (matches!(score.partial_cmp(&best_score), Some(Ordering::Equal))
                        && h.level > best_heading.level)
                },
            };
            if better {
                best = Some((score, h));
            }
        }

        Ok(best.map_or((0.0, None), |(score, h)| {
            (score, Some(h.title.clone()))
        }))
    }
}

fn section_body_tokens(lines: &[&str], h: &Heading) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    // Body starts after the heading line itself.
    for line in lines
        .iter()
        .skip(h.start_line)
        .take(h.end_line.saturating_sub(h.start_line))
    {
        tokens.extend(heading::tokenize(line));
    }
    tokens
}
