use render::{RenderEdge, RenderGraph, RenderNode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::error::DrawingError;

/// Labels longer than this many words are drawn as the generic label.
pub const MAX_LABEL_WORDS: usize = 3;
pub const GENERIC_LABEL: &str = "relates to";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingConcept {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingRelationship {
    pub source: String,
    pub target: String,
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    GENERIC_LABEL.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingStructure {
    #[serde(rename = "type", default = "default_structure_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

fn default_structure_type() -> String {
    "network".to_string()
}

/// Concepts and relationships read off a drawing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingExtraction {
    pub concepts: Vec<DrawingConcept>,
    pub relationships: Vec<DrawingRelationship>,
    pub structure: DrawingStructure,
}

impl DrawingExtraction {
    /// Decode and validate a vision model reply.
    pub fn from_model_response(raw: &str) -> Result<Self, DrawingError> {
        let repaired = extract::repair::repair_model_json(raw);
        let extraction: Self = serde_json::from_str(&repaired)?;
        extraction.validate()?;
        Ok(extraction)
    }

    /// Two linked placeholder concepts, used when a drawing cannot be read.
    pub fn mock() -> Self {
        Self {
            concepts: vec![
                DrawingConcept {
                    id: "c1".to_string(),
                    name: "Concept 1".to_string(),
                    description: "First concept".to_string(),
                },
                DrawingConcept {
                    id: "c2".to_string(),
                    name: "Concept 2".to_string(),
                    description: "Second concept".to_string(),
                },
            ],
            relationships: vec![DrawingRelationship {
                source: "c1".to_string(),
                target: "c2".to_string(),
                label: GENERIC_LABEL.to_string(),
            }],
            structure: DrawingStructure {
                kind: "network".to_string(),
                root: Some("c1".to_string()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), DrawingError> {
        if self.concepts.is_empty() {
            return Err(DrawingError::Validation("no concepts found".to_string()));
        }

        let mut ids = HashSet::new();
        for concept in &self.concepts {
            if concept.id.trim().is_empty() {
                return Err(DrawingError::Validation(format!(
                    "concept '{}' has an empty id",
                    concept.name
                )));
            }
            if !ids.insert(concept.id.as_str()) {
                return Err(DrawingError::Validation(format!(
                    "duplicate concept id '{}'",
                    concept.id
                )));
            }
        }

        for rel in &self.relationships {
            for endpoint in [&rel.source, &rel.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(DrawingError::Validation(format!(
                        "relationship references unknown concept '{}'",
                        endpoint
                    )));
                }
            }
        }

        Ok(())
    }

    fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.concepts
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
            .unwrap_or(id)
    }

    /// Plain-text description built from the structured data.
    pub fn describe(&self) -> String {
        let names: Vec<&str> = self.concepts.iter().map(|c| c.name.as_str()).collect();
        let mut text = format!("Digitized concept map with concepts: {}\n\nConcepts:\n", names.join(", "));

        for concept in &self.concepts {
            let description = if concept.description.trim().is_empty() {
                concept.name.as_str()
            } else {
                concept.description.as_str()
            };
            let _ = writeln!(text, "{}: {}", concept.name, description);
        }

        text.push_str("\nRelationships:\n");
        for rel in &self.relationships {
            let _ = writeln!(
                text,
                "{} {} {}",
                self.name_of(&rel.source),
                rel.label,
                self.name_of(&rel.target)
            );
        }

        text.trim_end().to_string()
    }

    /// Diagram view, with wordy relationship labels simplified.
    pub fn to_render_graph(&self) -> RenderGraph {
        let nodes = self
            .concepts
            .iter()
            .map(|c| RenderNode {
                id: c.id.clone(),
                label: c.name.clone(),
                description: Some(c.description.clone()).filter(|d| !d.trim().is_empty()),
            })
            .collect();

        let edges = self
            .relationships
            .iter()
            .map(|rel| RenderEdge {
                source: rel.source.clone(),
                target: rel.target.clone(),
                label: simplify_label(&rel.label),
            })
            .collect();

        let root = self
            .structure
            .root
            .clone()
            .filter(|root| self.concepts.iter().any(|c| &c.id == root))
            .or_else(|| self.concepts.first().map(|c| c.id.clone()));

        RenderGraph { nodes, edges, root }
    }
}

pub fn simplify_label(label: &str) -> String {
    let words = label.split_whitespace().count();
    if words == 0 || words > MAX_LABEL_WORDS {
        GENERIC_LABEL.to_string()
    } else {
        label.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"```json
{
  "concepts": [
    {"id": "c1", "name": "Water", "description": "H2O"},
    {"id": "c2", "name": "Cloud"}
  ],
  "relationships": [
    {"source": "c1", "target": "c2", "label": "evaporates and condenses into"}
  ],
  "structure": {"type": "network", "root": "c1"}
}
```"#;

    #[test]
    fn parses_fenced_reply() {
        let extraction = DrawingExtraction::from_model_response(REPLY).unwrap();
        assert_eq!(extraction.concepts.len(), 2);
        assert_eq!(extraction.concepts[1].description, "");
        assert_eq!(extraction.structure.root.as_deref(), Some("c1"));
    }

    #[test]
    fn missing_keys_fail_to_parse() {
        let result = DrawingExtraction::from_model_response(r#"{"concepts": [], "relationships": []}"#);
        assert!(matches!(result, Err(DrawingError::InvalidJson(_))));
    }

    #[test]
    fn validation_rules() {
        let mut e = DrawingExtraction::mock();
        assert!(e.validate().is_ok());

        e.relationships[0].target = "c9".to_string();
        assert!(matches!(e.validate(), Err(DrawingError::Validation(_))));

        let mut e = DrawingExtraction::mock();
        e.concepts[1].id = "c1".to_string();
        assert!(matches!(e.validate(), Err(DrawingError::Validation(_))));

        let mut e = DrawingExtraction::mock();
        e.concepts[0].id = "  ".to_string();
        assert!(e.validate().is_err());

        let mut e = DrawingExtraction::mock();
        e.concepts.clear();
        e.relationships.clear();
        assert!(e.validate().is_err());
    }

    #[test]
    fn wordy_labels_are_simplified() {
        assert_eq!(simplify_label("leads to"), "leads to");
        assert_eq!(simplify_label("is a kind of"), "relates to");
        assert_eq!(simplify_label("  "), "relates to");

        let graph = DrawingExtraction::from_model_response(REPLY).unwrap().to_render_graph();
        assert_eq!(graph.edges[0].label, "relates to");
        assert_eq!(graph.nodes[0].description.as_deref(), Some("H2O"));
        assert_eq!(graph.nodes[1].description, None);
        assert_eq!(graph.root.as_deref(), Some("c1"));
    }

    #[test]
    fn description_lists_concepts_and_links() {
        let text = DrawingExtraction::mock().describe();
        assert!(text.starts_with("Digitized concept map with concepts: Concept 1, Concept 2"));
        assert!(text.contains("Concept 1: First concept"));
        assert!(text.ends_with("Concept 1 relates to Concept 2"));
    }
}
