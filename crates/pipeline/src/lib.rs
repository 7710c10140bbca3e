pub mod config;
pub mod map;
pub mod metrics;

pub use config::PipelineConfig;
pub use map::{FrequencyMapOutput, KeyConceptsOutput, MapOutput, MapType};
pub use metrics::{Metrics, MetricsSnapshot, TimedOperation};

use extract::{ExtractedChunk, KeyConceptExtractor, TextGenerationService, Triple, TripleExtractor, VisionService};
use ingest::Chunk;
use ocr::{DrawingConcept, DrawingProcessor, DrawingRelationship, DrawingResult, DrawingStructure};
use render::{ChartKind, ImageFormat, LayoutStyle, RenderEdge, RenderGraph, RenderNode, RenderedImage, Renderer};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use unify::{ConceptGraph, GraphSource, GraphUnifier};

/// Rendered concept map plus the structure behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ConceptMapOutput {
    pub image: String,
    pub format: ImageFormat,
    pub layout_style: LayoutStyle,
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    pub concept_map: ConceptGraph,
    pub graph_source: GraphSource,
    pub chunk_count: usize,
    pub triple_count: usize,
}

#[derive(Clone)]
pub struct ConceptMapPipeline {
    extractor: TripleExtractor,
    key_concepts: KeyConceptExtractor,
    unifier: GraphUnifier,
    renderer: Renderer,
    drawings: DrawingProcessor,
    config: Arc<PipelineConfig>,
    metrics: Arc<Metrics>,
}

impl ConceptMapPipeline {
    pub fn new(
        text_model: Arc<dyn TextGenerationService>,
        vision_model: Arc<dyn VisionService>,
        config: PipelineConfig,
    ) -> Self {
        let renderer = Renderer::new(config.render.clone());

        Self {
            extractor: TripleExtractor::with_config(text_model.clone(), config.extractor.clone()),
            key_concepts: KeyConceptExtractor::new(text_model.clone()),
            unifier: GraphUnifier::with_config(text_model, config.unifier.clone()),
            drawings: DrawingProcessor::with_config(vision_model, renderer.clone(), config.drawing.clone()),
            renderer,
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Text in, the requested kind of map out.
    pub async fn generate_map(
        &self,
        text: &str,
        map_type: MapType,
        style: LayoutStyle,
        format: ImageFormat,
    ) -> MapOutput {
        match map_type.chart_kind() {
            None => MapOutput::ConceptMap(Box::new(self.generate_concept_map(text, style, format).await)),
            Some(kind) => MapOutput::Frequency(self.generate_frequency_map(text, kind, format).await),
        }
    }

    /// Key concepts of `text` with how often each is mentioned.
    pub async fn extract_key_concepts(&self, text: &str) -> KeyConceptsOutput {
        let trimmed = text.trim();

        let output = if trimmed.chars().count() < self.config.min_input_chars {
            warn!(chars = trimmed.chars().count(), "Input too short for key concepts");
            KeyConceptsOutput {
                error: Some("Input too short to extract key concepts".to_string()),
                ..KeyConceptsOutput::default()
            }
        } else {
            match self.key_concepts.extract_with_counts(trimmed).await {
                Ok(found) => KeyConceptsOutput {
                    concepts: found.concepts,
                    frequencies: found.frequencies,
                    error: None,
                },
                Err(e) => {
                    error!(error = %e, "Key concept extraction failed");
                    KeyConceptsOutput {
                        error: Some(e.to_string()),
                        ..KeyConceptsOutput::default()
                    }
                }
            }
        };

        self.metrics.record_key_concepts(output.error.is_some());
        output
    }

    /// Word cloud or bubble chart of the key concepts. Always produces an image.
    pub async fn generate_frequency_map(&self, text: &str, kind: ChartKind, format: ImageFormat) -> FrequencyMapOutput {
        self.metrics.record_text_request();
        let found = self.extract_key_concepts(text).await;

        let image = match &found.error {
            Some(message) => {
                let message = format!("Error: {}", message);
                self.run_renderer(format, move |renderer| renderer.render_error(&message, format))
                    .await
            }
            None => {
                let frequencies = found.frequencies.clone();
                self.run_renderer(format, move |renderer| renderer.render_chart(&frequencies, kind, format))
                    .await
            }
        };

        FrequencyMapOutput {
            image: image.image,
            format: image.format,
            map_type: MapType::from(kind),
            concepts: found.concepts,
            frequencies: found.frequencies,
            error: found.error,
        }
    }

    /// Text in, rendered concept map out. Always produces a diagram.
    pub async fn generate_concept_map(
        &self,
        text: &str,
        style: LayoutStyle,
        format: ImageFormat,
    ) -> ConceptMapOutput {
        self.metrics.record_text_request();
        let trimmed = text.trim();

        let (unified, chunk_count, triple_count) = if trimmed.chars().count() < self.config.min_input_chars {
            warn!(chars = trimmed.chars().count(), "Input too short, rendering placeholder map");
            let triples = vec![Triple::new("Empty Input", "requires", "more content")];
            (self.unifier.fallback(&triples), 0, triples.len())
        } else {
            let chunks = ingest::ingest_text(trimmed, self.config.chunker.clone());
            let chunk_count = chunks.len();

            let timer = TimedOperation::start();
            let extracted = self.extract_chunks(chunks).await;
            let fallbacks = extracted.iter().filter(|c| c.outcome.is_fallback()).count();
            let triples: Vec<Triple> = extracted.into_iter().flat_map(|c| c.triples).collect();
            self.metrics
                .record_extract(timer.elapsed(), chunk_count, triples.len(), fallbacks);

            info!(
                chunks = chunk_count,
                triples = triples.len(),
                fallback_chunks = fallbacks,
                "Extracted triples"
            );

            let timer = TimedOperation::start();
            let unified = self.unifier.unify(&triples).await;
            self.metrics
                .record_unify(timer.elapsed(), unified.source != GraphSource::Model);

            (unified, chunk_count, triples.len())
        };

        let graph = RenderGraph::from_concept_graph(&unified.graph);
        let (nodes, edges) = (graph.nodes.clone(), graph.edges.clone());
        let image = self.render_blocking(graph, style, format).await;

        ConceptMapOutput {
            image: image.image,
            format: image.format,
            layout_style: style,
            nodes,
            edges,
            concept_map: unified.graph,
            graph_source: unified.source,
            chunk_count,
            triple_count,
        }
    }

    /// Extract every chunk with bounded concurrency; results come back in chunk order.
    ///
    /// A chunk whose task dies still contributes the model-failure triple.
    pub async fn extract_chunks(&self, chunks: Vec<Chunk>) -> Vec<ExtractedChunk> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_extractions.max(1)));
        let mut tasks = JoinSet::new();
        let submitted: Vec<(usize, String, String)> = chunks
            .iter()
            .map(|c| (c.index, c.chunk_id.clone(), c.text.clone()))
            .collect();

        for chunk in chunks {
            let extractor = self.extractor.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                extractor.extract_chunk(chunk.chunk_id, chunk.index, &chunk.text).await
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(extracted) => results.push(extracted),
                Err(e) => error!(error = %e, "Chunk extraction task failed"),
            }
        }

        if results.len() < submitted.len() {
            let finished: HashSet<usize> = results.iter().map(|c| c.index).collect();
            for (index, chunk_id, text) in submitted {
                if !finished.contains(&index) {
                    warn!(index, "Substituting fallback triple for lost chunk");
                    results.push(self.extractor.model_failure_chunk(chunk_id, index, &text));
                }
            }
        }

        results.sort_by_key(|c| c.index);
        results
    }

    pub async fn process_drawing_for_concept_map(&self, drawing: &str) -> DrawingResult {
        let result = self.drawings.process_drawing(drawing).await;
        self.metrics.record_drawing(result.fallback);
        result
    }

    /// Draw caller-supplied concepts as-is.
    pub async fn visualize_concepts(
        &self,
        concepts: &[DrawingConcept],
        relationships: &[DrawingRelationship],
        structure: Option<&DrawingStructure>,
        style: LayoutStyle,
        format: ImageFormat,
    ) -> RenderedImage {
        self.metrics.record_visualize();

        if concepts.is_empty() {
            warn!("No concepts to visualize, rendering placeholder");
            return self.renderer.render_error("No concepts to display", format);
        }

        let graph = RenderGraph {
            nodes: concepts
                .iter()
                .map(|c| RenderNode {
                    id: c.id.clone(),
                    label: c.name.clone(),
                    description: Some(c.description.clone()).filter(|d| !d.trim().is_empty()),
                })
                .collect(),
            edges: relationships
                .iter()
                .map(|r| RenderEdge {
                    source: r.source.clone(),
                    target: r.target.clone(),
                    label: r.label.clone(),
                })
                .collect(),
            root: structure.and_then(|s| s.root.clone()),
        };

        self.render_blocking(graph, style, format).await
    }

    async fn render_blocking(&self, graph: RenderGraph, style: LayoutStyle, format: ImageFormat) -> RenderedImage {
        self.run_renderer(format, move |renderer| renderer.render(&graph, style, format))
            .await
    }

    /// Layout and rasterization are CPU-bound; keep them off the async workers.
    async fn run_renderer<F>(&self, format: ImageFormat, job: F) -> RenderedImage
    where
        F: FnOnce(&Renderer) -> RenderedImage + Send + 'static,
    {
        let timer = TimedOperation::start();
        let renderer = self.renderer.clone();

        let image = match tokio::task::spawn_blocking(move || job(&renderer)).await {
            Ok(image) => image,
            Err(e) => {
                error!(error = %e, "Render task failed");
                self.renderer
                    .render_error(&format!("Error: rendering task failed: {}", e), format)
            }
        };

        self.metrics.record_render(timer.elapsed());
        image
    }
}
