use extract::{TextGenerationService, Triple};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::components::bridge_components;
use crate::graph::ConceptGraph;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifierConfig {
    /// Link isolated components to the root after unification.
    pub bridge_components: bool,
    /// Relation label used for those links.
    pub bridge_relation: String,
}

impl Default for UnifierConfig {
    fn default() -> Self {
        Self {
            bridge_components: true,
            bridge_relation: "relates to".to_string(),
        }
    }
}

/// Where the unified graph came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphSource {
    Model,
    FallbackTree,
    ErrorGraph,
}

#[derive(Debug, Clone)]
pub struct UnifiedGraph {
    pub graph: ConceptGraph,
    pub source: GraphSource,
    pub bridges_added: usize,
}

#[derive(Clone)]
pub struct GraphUnifier {
    service: Arc<dyn TextGenerationService>,
    config: UnifierConfig,
}

impl GraphUnifier {
    pub fn new(service: Arc<dyn TextGenerationService>) -> Self {
        Self::with_config(service, UnifierConfig::default())
    }

    pub fn with_config(service: Arc<dyn TextGenerationService>, config: UnifierConfig) -> Self {
        Self { service, config }
    }

    /// Merge triples from every chunk into one connected concept graph.
    pub async fn unify(&self, triples: &[Triple]) -> UnifiedGraph {
        if triples.is_empty() {
            warn!("No triples to unify, returning error graph");
            return self.finish(ConceptGraph::error_graph(), GraphSource::ErrorGraph);
        }

        let prompt = build_unify_prompt(triples);

        let generation = match self.service.generate(&prompt).await {
            Ok(generation) => generation,
            Err(e) => {
                error!(error = %e, "Error generating concept map JSON");
                return self.finish(ConceptGraph::error_graph(), GraphSource::ErrorGraph);
            }
        };

        match ConceptGraph::from_model_response(&generation.text) {
            Ok(graph) => {
                info!(
                    concepts = graph.len(),
                    edges = graph.edge_count(),
                    "Unified concept map from model response"
                );
                self.finish(graph, GraphSource::Model)
            }
            Err(e) => {
                let preview: String = generation.text.chars().take(100).collect();
                error!(
                    error = %e,
                    raw_response = %preview,
                    "Error parsing concept map JSON, rebuilding from triples"
                );
                self.fallback(triples)
            }
        }
    }

    /// Deterministic graph from the raw triples, no model call.
    pub fn fallback(&self, triples: &[Triple]) -> UnifiedGraph {
        if triples.is_empty() {
            return self.finish(ConceptGraph::error_graph(), GraphSource::ErrorGraph);
        }
        self.finish(ConceptGraph::from_triples(triples), GraphSource::FallbackTree)
    }

    fn finish(&self, mut graph: ConceptGraph, source: GraphSource) -> UnifiedGraph {
        let bridges_added = if self.config.bridge_components {
            bridge_components(&mut graph, &self.config.bridge_relation)
        } else {
            0
        };

        UnifiedGraph {
            graph,
            source,
            bridges_added,
        }
    }
}

pub fn build_unify_prompt(triples: &[Triple]) -> String {
    let triple_text = triples
        .iter()
        .map(Triple::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You have the following conceptual triples extracted from text:
{}

Your task:
1. Combine all references into a SINGLE integrated concept map, unifying duplicates.
2. If there are multiple seemingly unrelated root concepts, discover or create
   bridging relationships so that the final map is one interconnected web
   (no isolated sub-maps).
3. Each concept may appear as a "Subject" in some triples and as an "Object" in others.
   If so, unify them into the same concept node.
4. Produce valid JSON with exactly one top-level key: "concept_map".
   Example minimal structure (showing the shape, not your data):

{{
  "concept_map": {{
    "Concept1": {{
      "RelationA": ["ChildA", "ChildB"],
      "RelationB": ["ChildC"]
    }},
    "Concept2": {{
      "RelationC": ["ChildD"]
    }}
  }}
}}

- No extra text or explanations.
- If bridging relationships are implied or can be logically inferred, add them.
- Return ONLY valid JSON."#,
        triple_text
    )
}
