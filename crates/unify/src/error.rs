use thiserror::Error;

/// Why a model response could not become a concept graph.
#[derive(Error, Debug)]
pub enum GraphParseError {
    #[error("Response is not valid JSON: {0}")]
    Syntax(serde_json::Error),

    #[error("Response JSON is not an object")]
    NotAnObject,

    #[error("Missing 'concept_map' key in response")]
    MissingKey,

    #[error("Concept map has the wrong shape: {0}")]
    Shape(serde_json::Error),

    #[error("Concept map contains no concepts")]
    Empty,
}
