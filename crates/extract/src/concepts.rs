//! Key concepts of a text and how often the text mentions each one.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::KeyConceptError;
use crate::llm::TextGenerationService;
use crate::normalizer::normalize_concept;
use crate::prompt::build_key_concepts_prompt;
use crate::repair::{repair_model_json_array, strip_code_fences};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptFrequency {
    pub concept: String,
    pub frequency: usize,
}

impl ConceptFrequency {
    pub fn new(concept: impl Into<String>, frequency: usize) -> Self {
        Self {
            concept: concept.into(),
            frequency,
        }
    }
}

/// Concepts as the model listed them, plus the ones actually found in the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyConcepts {
    pub concepts: Vec<String>,
    /// Only concepts mentioned at least once, in listing order.
    pub frequencies: Vec<ConceptFrequency>,
}

/// Parse a model reply into concept names.
///
/// Takes a JSON array of strings (or of objects with a `concept`/`name`
/// field), fenced or surrounded by prose. Names are normalized and
/// case-insensitive duplicates dropped.
pub fn parse_key_concepts(raw: &str) -> Result<Vec<String>, KeyConceptError> {
    let direct = serde_json::from_str::<Value>(strip_code_fences(raw)).ok();
    let value = match direct {
        Some(value @ Value::Array(_)) => value,
        _ => serde_json::from_str::<Value>(&repair_model_json_array(raw))
            .map_err(|e| KeyConceptError::Parse(e.to_string()))?,
    };

    let Value::Array(items) = value else {
        return Err(KeyConceptError::Parse("expected a JSON array".to_string()));
    };

    let mut seen = HashSet::new();
    let mut concepts = Vec::new();
    for item in items {
        let name = match &item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map
                .get("concept")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str),
            _ => None,
        };
        let Some(name) = name.map(normalize_concept).filter(|n| !n.is_empty()) else {
            debug!(item = %item, "Skipping key concept entry");
            continue;
        };
        if seen.insert(name.to_lowercase()) {
            concepts.push(name);
        }
    }

    if concepts.is_empty() {
        return Err(KeyConceptError::Empty);
    }
    Ok(concepts)
}

/// Case-insensitive whole-word occurrence counts. Concepts never mentioned are left out.
pub fn count_concepts_in_text(text: &str, concepts: &[String]) -> Vec<ConceptFrequency> {
    let mut frequencies = Vec::new();

    for concept in concepts {
        let words: Vec<String> = concept.split_whitespace().map(regex::escape).collect();
        if words.is_empty() {
            continue;
        }

        let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
        let mut pattern = String::new();
        if is_word(concept.trim().chars().next()) {
            pattern.push_str(r"\b");
        }
        pattern.push_str(&words.join(r"\s+"));
        if is_word(concept.trim().chars().last()) {
            pattern.push_str(r"\b");
        }

        let matcher = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!(concept = %concept, error = %e, "Could not build concept matcher");
                continue;
            }
        };

        let count = matcher.find_iter(text).count();
        if count > 0 {
            frequencies.push(ConceptFrequency::new(concept.clone(), count));
        }
    }

    frequencies
}

/// Asks a text model for the key concepts of a passage.
#[derive(Clone)]
pub struct KeyConceptExtractor {
    service: Arc<dyn TextGenerationService>,
}

impl KeyConceptExtractor {
    pub fn new(service: Arc<dyn TextGenerationService>) -> Self {
        Self { service }
    }

    pub async fn extract(&self, text: &str) -> Result<Vec<String>, KeyConceptError> {
        let prompt = build_key_concepts_prompt(text.trim());
        let generation = self.service.generate(&prompt).await?;
        parse_key_concepts(&generation.text)
    }

    /// Concepts plus their counts in `text`.
    pub async fn extract_with_counts(&self, text: &str) -> Result<KeyConcepts, KeyConceptError> {
        let concepts = self.extract(text).await?;
        let frequencies = count_concepts_in_text(text, &concepts);

        info!(
            concepts = concepts.len(),
            mentioned = frequencies.len(),
            model = self.service.model_name(),
            "Extracted key concepts"
        );
        Ok(KeyConcepts {
            concepts,
            frequencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::Generation;
    use async_trait::async_trait;

    struct Reply(Result<&'static str, ()>);

    #[async_trait]
    impl TextGenerationService for Reply {
        async fn generate(&self, _prompt: &str) -> Result<Generation, LlmError> {
            match self.0 {
                Ok(text) => Ok(Generation::new(text)),
                Err(()) => Err(LlmError::Unavailable("offline".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "reply"
        }
    }

    #[test]
    fn parses_fenced_array() {
        let raw = "```json\n[\"photosynthesis\", \"carbon dioxide\", \"ATP\"]\n```";
        assert_eq!(
            parse_key_concepts(raw).unwrap(),
            vec!["photosynthesis", "carbon dioxide", "ATP"]
        );
    }

    #[test]
    fn falls_back_to_outermost_brackets() {
        let raw = "Here are the concepts: [\"chlorophyll\", \"light energy\",] Let me know!";
        assert_eq!(parse_key_concepts(raw).unwrap(), vec!["chlorophyll", "light energy"]);
    }

    #[test]
    fn accepts_objects_and_drops_duplicates() {
        let raw = r#"[{"concept": "Glucose", "frequency": 3}, {"name": "glucose"}, "  **Oxygen** ", 42, ""]"#;
        assert_eq!(parse_key_concepts(raw).unwrap(), vec!["Glucose", "Oxygen"]);
    }

    #[test]
    fn rejects_non_arrays_and_empty_lists() {
        assert!(matches!(parse_key_concepts("no concepts here"), Err(KeyConceptError::Parse(_))));
        assert!(matches!(parse_key_concepts("{\"a\": 1}"), Err(KeyConceptError::Parse(_))));
        assert!(matches!(parse_key_concepts("[]"), Err(KeyConceptError::Empty)));
    }

    #[test]
    fn counts_whole_words_case_insensitively() {
        let text = "Photosynthesis makes sugar. photosynthesis needs light; PHOTOSYNTHESIS is old. \
                    Sugars differ from sugar.";
        let concepts = vec![
            "photosynthesis".to_string(),
            "sugar".to_string(),
            "nitrogen".to_string(),
        ];

        assert_eq!(
            count_concepts_in_text(text, &concepts),
            vec![ConceptFrequency::new("photosynthesis", 3), ConceptFrequency::new("sugar", 2)]
        );
    }

    #[test]
    fn counts_multiword_and_symbol_concepts() {
        let text = "Carbon\ndioxide enters. carbon dioxide leaves. C++ and c++ are languages.";
        let concepts = vec!["carbon dioxide".to_string(), "C++".to_string()];

        assert_eq!(
            count_concepts_in_text(text, &concepts),
            vec![ConceptFrequency::new("carbon dioxide", 2), ConceptFrequency::new("C++", 2)]
        );
    }

    #[tokio::test]
    async fn extractor_counts_model_concepts() {
        let extractor = KeyConceptExtractor::new(Arc::new(Reply(Ok("[\"cell\", \"membrane\", \"virus\"]"))));
        let result = extractor
            .extract_with_counts("The cell membrane protects the cell.")
            .await
            .unwrap();

        assert_eq!(result.concepts.len(), 3);
        assert_eq!(
            result.frequencies,
            vec![ConceptFrequency::new("cell", 2), ConceptFrequency::new("membrane", 1)]
        );
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let extractor = KeyConceptExtractor::new(Arc::new(Reply(Err(()))));
        let result = extractor.extract_with_counts("The cell membrane protects the cell.").await;
        assert!(matches!(result, Err(KeyConceptError::Model(_))));
    }
}
