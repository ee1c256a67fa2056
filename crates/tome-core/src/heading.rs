//! Heading and query text normalization.
//!
//! Scraped markdown headings routinely carry link syntax, HTML entities,
//! and mixed-width punctuation. Ranking compares *tokens*, so queries,
//! titles, keywords, and headings all funnel through the same pipeline:
//! markdown links reduced to their labels, entities decoded, NFKD
//! normalization with combining marks dropped, punctuation folded to
//! spaces, lowercase.

use html_escape::decode_html_entities;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Reduce markdown links to their labels and decode HTML entities.
///
/// `[Getting Started](https://docs.example.com/start)` becomes
/// `Getting Started`; a stray `[` without a matching link tail is kept
/// verbatim.
#[must_use]
pub fn clean_heading(raw: &str) -> String {
    let stripped = strip_links(raw);
    decode_html_entities(&stripped).trim().to_string()
}

/// Lowercased, diacritic-free, punctuation-folded form of `text`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_was_space = true;

    for ch in text.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        for lower in ch.to_lowercase() {
            if lower.is_alphanumeric() {
                out.push(lower);
                prev_was_space = false;
            } else if !prev_was_space {
                out.push(' ');
                prev_was_space = true;
            }
        }
    }

    out.trim_end().to_string()
}

/// Tokens of the normalized form of `text`.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(&clean_heading(text))
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

fn strip_links(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = memchr::memchr(b'[', rest.as_bytes()) {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match split_link(after) {
            Some((label, tail)) => {
                out.push_str(label);
                rest = tail;
            },
            None => {
                out.push('[');
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}

/// Split `label](url)…` into the label and the text after the closing
/// parenthesis, honoring nested parentheses inside the URL.
fn split_link(after_open: &str) -> Option<(&str, &str)> {
    let close = after_open.find("](")?;
    let label = &after_open[..close];
    let url_rest = &after_open[close + 2..];

    let mut depth = 1usize;
    for (i, ch) in url_rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((label, &url_rest[i + 1..]));
                }
            },
            _ => {},
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_reduce_to_labels() {
        assert_eq!(
            clean_heading("[Getting Started](https://docs.example.com/start)"),
            "Getting Started"
        );
        assert_eq!(
            clean_heading("See [the guide](https://a.dev/g) and [API](https://a.dev/api)"),
            "See the guide and API"
        );
    }

    #[test]
    fn nested_parens_in_url_are_handled() {
        assert_eq!(
            clean_heading("[Wiki](https://en.wikipedia.org/wiki/Rust_(film))!"),
            "Wiki!"
        );
    }

    #[test]
    fn unmatched_bracket_is_kept() {
        assert_eq!(clean_heading("array[0] syntax"), "array[0] syntax");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(clean_heading("Tips &amp; Tricks"), "Tips & Tricks");
    }

    #[test]
    fn normalize_folds_case_punctuation_and_diacritics() {
        assert_eq!(normalize("Configuring the `HTTP/2` client"), "configuring the http 2 client");
        assert_eq!(normalize("Café menü"), "cafe menu");
        assert_eq!(normalize("  spaced   out  "), "spaced out");
    }

    #[test]
    fn tokenize_combines_cleanup_and_normalization() {
        assert_eq!(
            tokenize("[Async I/O](https://docs.example.com/io) &amp; Timers"),
            vec!["async", "i", "o", "timers"]
        );
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!!").is_empty());
    }
}
