pub mod components;
pub mod error;
pub mod graph;
pub mod unifier;

pub use components::{bridge_components, connected_components};
pub use error::GraphParseError;
pub use graph::{CONCEPT_MAP_KEY, ConceptGraph, Relations};
pub use unifier::{GraphSource, GraphUnifier, UnifiedGraph, UnifierConfig, build_unify_prompt};
