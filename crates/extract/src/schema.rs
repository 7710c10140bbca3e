use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalizer::{normalize_concept, strip_list_marker};

/// A (subject, relation, object) fact extracted from text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// Parse one `Subject | Relation | Object` line.
    ///
    /// Returns `None` unless the line has exactly three non-empty fields.
    /// Markdown table rows and header/separator rows are tolerated.
    pub fn parse_line(line: &str) -> Option<Triple> {
        let line = strip_list_marker(line.trim()).trim();
        if !line.contains('|') {
            return None;
        }

        let line = line.strip_prefix('|').unwrap_or(line);
        let line = line.strip_suffix('|').unwrap_or(line);

        let raw: Vec<&str> = line.split('|').collect();
        if raw.len() != 3 {
            return None;
        }

        // Markdown table separator: ---|:---:|---
        if raw
            .iter()
            .all(|p| p.trim().chars().all(|c| matches!(c, '-' | ':')))
        {
            return None;
        }

        let parts: Vec<String> = raw.iter().map(|p| normalize_concept(p)).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        let is_header = parts[0].eq_ignore_ascii_case("subject")
            && parts[1].eq_ignore_ascii_case("relation")
            && parts[2].eq_ignore_ascii_case("object");
        if is_header {
            return None;
        }

        Some(Triple::new(parts[0].clone(), parts[1].clone(), parts[2].clone()))
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.subject, self.relation, self.object)
    }
}

/// Parse every valid triple line of a model response, in order.
pub fn parse_triple_lines(response: &str) -> Vec<Triple> {
    response.lines().filter_map(Triple::parse_line).collect()
}

/// How a chunk's triples were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Parsed,
    TooShort,
    Unparseable,
    ModelFailed,
}

impl ExtractionOutcome {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, ExtractionOutcome::Parsed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedChunk {
    pub chunk_id: String,
    pub index: usize,
    pub triples: Vec<Triple>,
    pub outcome: ExtractionOutcome,
}
