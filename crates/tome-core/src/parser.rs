//! Markdown heading structure and subsection extraction.
//!
//! A document's structure is its ordered ATX heading sequence. Extraction
//! is a pure parse over one document's text: it never touches the index or
//! the filesystem. Section boundaries follow the nesting rule: a section
//! runs from its heading up to (but not including) the next heading at the
//! same or a shallower level, so child headings are included and siblings
//! and ancestors terminate it.

use tree_sitter::{Node, Parser, TreeCursor};
use tracing::warn;

use crate::{Error, Result};

/// One heading with its section bounds.
///
/// Line numbers are 1-based and inclusive; `end_line` is the last line of
/// the heading's section under the boundary rule above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Marker count (`##` → 2).
    pub level: usize,
    /// Heading text without the markers, as written.
    pub title: String,
    /// Line the heading appears on.
    pub start_line: usize,
    /// Last line of the heading's section.
    pub end_line: usize,
}

/// Parses heading structure and extracts bounded subsections.
pub struct SectionExtractor {
    parser: Parser,
}

impl SectionExtractor {
    /// Creates an extractor with the markdown grammar loaded.
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_md::LANGUAGE.into())
            .map_err(|e| Error::Parse(format!("failed to load markdown grammar: {e}")))?;
        Ok(Self { parser })
    }

    /// Parses the ATX heading sequence of `text`, in document order.
    ///
    /// A document with no headings yields an empty sequence. Localized
    /// syntax errors do not abort the parse; tree-sitter error nodes are
    /// tolerated and the remaining headings are still returned.
    pub fn parse_headings(&mut self, text: &str) -> Result<Vec<Heading>> {
        let tree = self
            .parser
            .parse(text, None)
            .ok_or_else(|| Error::Parse("markdown parse produced no tree".into()))?;

        let root = tree.root_node();
        if root.has_error() {
            warn!("markdown parse tree contains errors, extracting what remains");
        }

        let mut raw = Vec::new();
        let mut cursor = root.walk();
        collect_headings(&mut cursor, text, &mut raw);

        let total_lines = text.lines().count();
        Ok(bound_sections(raw, total_lines))
    }

    /// Extracts the section titled `title`, or `None` when no heading
    /// matches.
    ///
    /// Matching is a case-sensitive exact comparison against the heading
    /// text as written. The returned content starts at the matching heading
    /// line and runs through the end of its section.
    pub fn extract_section(&mut self, text: &str, title: &str) -> Result<Option<String>> {
        let headings = self.parse_headings(text)?;
        let Some(heading) = headings.iter().find(|h| h.title == title) else {
            return Ok(None);
        };

        let section: Vec<&str> = text
            .lines()
            .skip(heading.start_line - 1)
            .take(heading.end_line - heading.start_line + 1)
            .collect();
        Ok(Some(section.join("\n")))
    }
}

/// Walk every node, collecting `(level, title, start_line)` per ATX heading.
fn collect_headings(cursor: &mut TreeCursor, text: &str, out: &mut Vec<(usize, String, usize)>) {
    loop {
        let node = cursor.node();
        if node.kind() == "atx_heading" {
            out.push((
                heading_level(node),
                heading_text(node, text),
                node.start_position().row + 1,
            ));
        }

        if cursor.goto_first_child() {
            continue;
        }
        if cursor.goto_next_sibling() {
            continue;
        }
        loop {
            if !cursor.goto_parent() {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

fn heading_level(node: Node) -> usize {
    for child in node.children(&mut node.walk()) {
        match child.kind() {
            "atx_h1_marker" => return 1,
            "atx_h2_marker" => return 2,
            "atx_h3_marker" => return 3,
            "atx_h4_marker" => return 4,
            "atx_h5_marker" => return 5,
            "atx_h6_marker" => return 6,
            _ => {},
        }
    }
    1
}

fn heading_text(node: Node, text: &str) -> String {
    for child in node.children(&mut node.walk()) {
        if child.kind() == "inline" {
            return text[child.byte_range()].trim().to_string();
        }
    }
    // Marker-only heading or grammar variation: take the raw line.
    text[node.byte_range()]
        .trim_start_matches('#')
        .trim()
        .to_string()
}

/// Assign each heading its section end line.
///
/// A section ends immediately before the next heading whose level is less
/// than or equal to its own; the last such section runs to end of document.
fn bound_sections(raw: Vec<(usize, String, usize)>, total_lines: usize) -> Vec<Heading> {
    let mut headings = Vec::with_capacity(raw.len());
    for (i, (level, title, start_line)) in raw.iter().enumerate() {
        let end_line = raw[i + 1..]
            .iter()
            .find(|(next_level, _, _)| next_level <= level)
            .map_or(total_lines, |(_, _, next_start)| next_start - 1);
        headings.push(Heading {
            level: *level,
            title: title.clone(),
            start_line: *start_line,
            end_line,
        });
    }
    headings
}
