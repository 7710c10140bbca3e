pub mod concepts;
pub mod error;
pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod repair;
pub mod retry;
pub mod schema;

pub use concepts::{
    ConceptFrequency, KeyConceptExtractor, KeyConcepts, count_concepts_in_text, parse_key_concepts,
};
pub use error::{KeyConceptError, LlmError};
pub use llm::{Generation, ImageInput, OllamaClient, TextGenerationService, VisionService};
pub use normalizer::normalize_concept;
pub use retry::RetryPolicy;
pub use schema::{ExtractedChunk, ExtractionOutcome, Triple, parse_triple_lines};

use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Chunks with fewer trimmed characters than this skip the model call.
    pub min_chunk_chars: usize,
    /// Number of leading words used to name the fallback concept.
    pub fallback_topic_words: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: 10,
            fallback_topic_words: 3,
        }
    }
}

#[derive(Clone)]
pub struct TripleExtractor {
    service: Arc<dyn TextGenerationService>,
    config: ExtractorConfig,
}

impl TripleExtractor {
    pub fn new(service: Arc<dyn TextGenerationService>) -> Self {
        Self::with_config(service, ExtractorConfig::default())
    }

    pub fn with_config(service: Arc<dyn TextGenerationService>, config: ExtractorConfig) -> Self {
        Self { service, config }
    }

    /// Extract triples from a chunk of text. Always returns at least one triple.
    pub async fn extract(&self, text: &str) -> Vec<Triple> {
        self.extract_with_outcome(text).await.0
    }

    /// Extract from a chunk with metadata
    pub async fn extract_chunk(&self, chunk_id: String, index: usize, text: &str) -> ExtractedChunk {
        let (triples, outcome) = self.extract_with_outcome(text).await;

        ExtractedChunk {
            chunk_id,
            index,
            triples,
            outcome,
        }
    }

    pub async fn extract_with_outcome(&self, text: &str) -> (Vec<Triple>, ExtractionOutcome) {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.config.min_chunk_chars {
            warn!(
                chars = trimmed.chars().count(),
                "Input text is too short for meaningful triple extraction"
            );
            return (
                vec![Triple::new("Concept", "is", "Empty or too short")],
                ExtractionOutcome::TooShort,
            );
        }

        let prompt = prompt::build_triple_prompt(trimmed);

        match self.service.generate(&prompt).await {
            Ok(generation) => {
                let triples = parse_triple_lines(&generation.text);
                if triples.is_empty() {
                    info!(
                        preview = %preview(trimmed),
                        "No parseable triples in model response, using fallback triple"
                    );
                    let topic = self.leading_words(trimmed);
                    return (
                        vec![Triple::new(topic, "is related to", "the topic of interest")],
                        ExtractionOutcome::Unparseable,
                    );
                }

                (triples, ExtractionOutcome::Parsed)
            }
            Err(e) => {
                error!(error = %e, model = self.service.model_name(), "Error extracting triples");
                (self.model_failure_triples(trimmed), ExtractionOutcome::ModelFailed)
            }
        }
    }

    /// What a chunk contributes when the model could not be consulted.
    pub fn model_failure_chunk(&self, chunk_id: String, index: usize, text: &str) -> ExtractedChunk {
        ExtractedChunk {
            chunk_id,
            index,
            triples: self.model_failure_triples(text.trim()),
            outcome: ExtractionOutcome::ModelFailed,
        }
    }

    fn model_failure_triples(&self, text: &str) -> Vec<Triple> {
        vec![Triple::new(self.leading_words(text), "is", "the main concept")]
    }

    fn leading_words(&self, text: &str) -> String {
        text.split_whitespace()
            .take(self.config.fallback_topic_words)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerationService for ScriptedModel {
        async fn generate(&self, _prompt: &str) -> Result<Generation, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(Generation::new(text.clone())),
                Err(()) => Err(LlmError::Timeout(std::time::Duration::from_secs(60))),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn empty_input_yields_single_fallback_without_model_call() {
        let model = ScriptedModel::replying("A | is | B");
        let extractor = TripleExtractor::new(model.clone());

        let (triples, outcome) = extractor.extract_with_outcome("").await;

        assert_eq!(triples, vec![Triple::new("Concept", "is", "Empty or too short")]);
        assert_eq!(outcome, ExtractionOutcome::TooShort);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_input_skips_model() {
        let model = ScriptedModel::replying("A | is | B");
        let extractor = TripleExtractor::new(model.clone());

        let triples = extractor.extract("  tiny  ").await;

        assert_eq!(triples.len(), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn parses_model_lines() {
        let model = ScriptedModel::replying(
            "Photosynthesis | converts | sunlight\nPhotosynthesis | produces | chemical energy\n",
        );
        let extractor = TripleExtractor::new(model);

        let triples = extractor
            .extract("Photosynthesis converts sunlight into chemical energy.")
            .await;

        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].subject, "Photosynthesis");
        assert_eq!(triples[1].object, "chemical energy");
    }

    #[tokio::test]
    async fn unparseable_response_falls_back_to_leading_words() {
        let model = ScriptedModel::replying("I could not find any triples, sorry.");
        let extractor = TripleExtractor::new(model);

        let extracted = extractor
            .extract_chunk("c1".to_string(), 0, "Mitochondria produce cellular energy in cells.")
            .await;

        assert_eq!(extracted.outcome, ExtractionOutcome::Unparseable);
        assert_eq!(
            extracted.triples,
            vec![Triple::new(
                "Mitochondria produce cellular",
                "is related to",
                "the topic of interest"
            )]
        );
    }

    #[tokio::test]
    async fn model_failure_is_contained() {
        let extractor = TripleExtractor::new(ScriptedModel::failing());

        let (triples, outcome) = extractor
            .extract_with_outcome("Rivers carry sediment to the sea.")
            .await;

        assert_eq!(outcome, ExtractionOutcome::ModelFailed);
        assert_eq!(triples, vec![Triple::new("Rivers carry sediment", "is", "the main concept")]);
    }

    #[test]
    fn model_failure_chunk_matches_failed_call() {
        let extractor = TripleExtractor::new(ScriptedModel::failing());
        let chunk = extractor.model_failure_chunk("c7".to_string(), 7, "  Glaciers carve deep valleys.");

        assert_eq!(chunk.index, 7);
        assert_eq!(chunk.outcome, ExtractionOutcome::ModelFailed);
        assert_eq!(chunk.triples, vec![Triple::new("Glaciers carve deep", "is", "the main concept")]);
    }
}
