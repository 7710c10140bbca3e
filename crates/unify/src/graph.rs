use extract::{Triple, normalize_concept};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::GraphParseError;
use extract::repair::repair_model_json;

/// Top-level key of the serialized concept map.
pub const CONCEPT_MAP_KEY: &str = "concept_map";

/// Relation label -> ordered target concept names.
pub type Relations = IndexMap<String, Vec<String>>;

/// Unified concept graph: concept name -> outgoing relations.
///
/// Insertion order is kept, so the first concept is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptGraph {
    concepts: IndexMap<String, Relations>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic tree built straight from triples.
    ///
    /// The first triple's subject is the root; every distinct triple
    /// becomes exactly one edge.
    pub fn from_triples(triples: &[Triple]) -> Self {
        let mut graph = Self::new();
        for triple in triples {
            graph.add_triple(triple);
        }
        graph
    }

    /// Single-node graph handed to the renderer when unification fails outright.
    pub fn error_graph() -> Self {
        let mut graph = Self::new();
        graph.add_concept("Error");
        graph
    }

    /// Parse a model response into a validated graph.
    ///
    /// Code fences, surrounding prose and trailing commas are repaired first.
    pub fn from_model_response(raw: &str) -> Result<Self, GraphParseError> {
        let repaired = repair_model_json(raw);

        let value: serde_json::Value =
            serde_json::from_str(&repaired).map_err(GraphParseError::Syntax)?;
        if !value.is_object() {
            return Err(GraphParseError::NotAnObject);
        }

        // Decode from the text again so the model's key order survives.
        let envelope: RawEnvelope =
            serde_json::from_str(&repaired).map_err(GraphParseError::Shape)?;
        let raw_map = envelope.concept_map.ok_or(GraphParseError::MissingKey)?;

        let mut graph = Self::new();
        for (concept, relations) in raw_map {
            let concept = normalize_concept(&concept);
            if concept.is_empty() {
                continue;
            }
            graph.add_concept(&concept);

            for (relation, targets) in relations.unwrap_or_default() {
                let relation = normalize_concept(&relation);
                if relation.is_empty() {
                    continue;
                }
                for target in targets.into_vec() {
                    let target = normalize_concept(&target);
                    if !target.is_empty() {
                        graph.add_relation(&concept, &relation, &target);
                    }
                }
            }
        }

        if graph.is_empty() {
            return Err(GraphParseError::Empty);
        }
        Ok(graph)
    }

    pub fn add_concept(&mut self, name: &str) -> &mut Relations {
        self.concepts.entry(name.to_string()).or_default()
    }

    /// Add `subject -relation-> object`. Returns false when the edge already exists.
    pub fn add_relation(&mut self, subject: &str, relation: &str, object: &str) -> bool {
        let targets = self
            .add_concept(subject)
            .entry(relation.to_string())
            .or_default();

        if targets.iter().any(|t| t == object) {
            return false;
        }
        targets.push(object.to_string());
        true
    }

    pub fn add_triple(&mut self, triple: &Triple) -> bool {
        self.add_relation(&triple.subject, &triple.relation, &triple.object)
    }

    pub fn root(&self) -> Option<&str> {
        self.concepts.keys().next().map(String::as_str)
    }

    /// Number of concepts with their own entry (subjects).
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.concepts.contains_key(name)
    }

    pub fn relations(&self, name: &str) -> Option<&Relations> {
        self.concepts.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Relations)> {
        self.concepts.iter()
    }

    /// Every edge as (subject, relation, object), in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.concepts.iter().flat_map(|(subject, relations)| {
            relations.iter().flat_map(move |(relation, targets)| {
                targets
                    .iter()
                    .map(move |target| (subject.as_str(), relation.as_str(), target.as_str()))
            })
        })
    }

    pub fn edge_count(&self) -> usize {
        self.concepts
            .values()
            .flat_map(|relations| relations.values())
            .map(Vec::len)
            .sum()
    }

    /// All concept names (subjects and objects), ordered by first appearance.
    pub fn concept_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for (subject, relations) in &self.concepts {
            if seen.insert(subject.as_str()) {
                names.push(subject.as_str());
            }
            for target in relations.values().flatten() {
                if seen.insert(target.as_str()) {
                    names.push(target.as_str());
                }
            }
        }

        names
    }

    /// `{"concept_map": {...}}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ CONCEPT_MAP_KEY: self })
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    concept_map: Option<IndexMap<String, Option<IndexMap<String, RawTargets>>>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTargets {
    Many(Vec<String>),
    One(String),
}

impl RawTargets {
    fn into_vec(self) -> Vec<String> {
        match self {
            RawTargets::Many(targets) => targets,
            RawTargets::One(target) => vec![target],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_subject_is_merged() {
        let graph = ConceptGraph::from_triples(&[
            Triple::new("A", "causes", "B"),
            Triple::new("C", "is", "D"),
            Triple::new("A", "causes", "E"),
            Triple::new("A", "needs", "F"),
        ]);

        assert_eq!(graph.iter().filter(|(k, _)| k.as_str() == "A").count(), 1);
        let a = graph.relations("A").unwrap();
        assert_eq!(a["causes"], vec!["B", "E"]);
        assert_eq!(a["needs"], vec!["F"]);
        assert_eq!(graph.root(), Some("A"));
    }

    #[test]
    fn fallback_tree_has_each_triple_once() {
        let triples = vec![
            Triple::new("Water", "forms", "Clouds"),
            Triple::new("Clouds", "produce", "Rain"),
            Triple::new("Water", "forms", "Clouds"),
            Triple::new("Rain", "feeds", "Rivers"),
        ];
        let graph = ConceptGraph::from_triples(&triples);

        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(
            edges,
            vec![
                ("Water", "forms", "Clouds"),
                ("Clouds", "produce", "Rain"),
                ("Rain", "feeds", "Rivers"),
            ]
        );
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn mutual_relations_keep_both_keys() {
        let graph = ConceptGraph::from_triples(&[
            Triple::new("A", "is", "B"),
            Triple::new("B", "is", "A"),
        ]);

        assert!(graph.contains_key("A"));
        assert!(graph.contains_key("B"));
        assert_eq!(graph.concept_names(), vec!["A", "B"]);
    }

    #[test]
    fn parses_fenced_response_with_trailing_commas() {
        let raw = r#"```json
{
  "concept_map": {
    "Photosynthesis": {
      "converts": ["Sunlight",],
      "produces": ["Chemical energy", "Oxygen",],
    },
    "Chemical energy": {
      "stored in": "Glucose"
    },
  }
}
```"#;

        let graph = ConceptGraph::from_model_response(raw).unwrap();
        assert_eq!(graph.root(), Some("Photosynthesis"));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.relations("Chemical energy").unwrap()["stored in"], vec!["Glucose"]);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn keeps_model_key_order() {
        let raw = r#"{"concept_map": {"Zebra": {"eats": ["Grass"]}, "Apple": {"is": ["Fruit"]}}}"#;
        let graph = ConceptGraph::from_model_response(raw).unwrap();
        assert_eq!(graph.root(), Some("Zebra"));
    }

    #[test]
    fn rejects_missing_key_and_bad_shapes() {
        assert!(matches!(
            ConceptGraph::from_model_response(r#"{"graph": {}}"#),
            Err(GraphParseError::MissingKey)
        ));
        assert!(matches!(
            ConceptGraph::from_model_response("[1, 2]"),
            Err(GraphParseError::NotAnObject)
        ));
        assert!(matches!(
            ConceptGraph::from_model_response("not json at all"),
            Err(GraphParseError::Syntax(_))
        ));
        assert!(matches!(
            ConceptGraph::from_model_response(r#"{"concept_map": {"A": {"r": [{"B": 1}]}}}"#),
            Err(GraphParseError::Shape(_))
        ));
        assert!(matches!(
            ConceptGraph::from_model_response(r#"{"concept_map": {}}"#),
            Err(GraphParseError::Empty)
        ));
    }

    #[test]
    fn serializes_under_designated_key() {
        let graph = ConceptGraph::from_triples(&[Triple::new("A", "is", "B")]);
        let json = graph.to_json();
        assert_eq!(json[CONCEPT_MAP_KEY]["A"]["is"][0], "B");
    }

    #[test]
    fn error_graph_is_single_node() {
        let graph = ConceptGraph::error_graph();
        assert_eq!(graph.concept_names(), vec!["Error"]);
        assert_eq!(graph.edge_count(), 0);
    }
}
