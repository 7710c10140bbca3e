use extract::ExtractorConfig;
use ingest::ChunkerConfig;
use ocr::DrawingConfig;
use render::RenderConfig;
use unify::UnifierConfig;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on chunk extractions in flight per request.
    pub max_concurrent_extractions: usize,
    /// Trimmed inputs shorter than this skip the models entirely.
    pub min_input_chars: usize,
    pub chunker: ChunkerConfig,
    pub extractor: ExtractorConfig,
    pub unifier: UnifierConfig,
    pub render: RenderConfig,
    pub drawing: DrawingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_extractions: 5,
            min_input_chars: 5,
            chunker: ChunkerConfig::default(),
            extractor: ExtractorConfig::default(),
            unifier: UnifierConfig::default(),
            render: RenderConfig::default(),
            drawing: DrawingConfig::default(),
        }
    }
}
