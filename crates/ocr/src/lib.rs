pub mod error;
pub mod image;
pub mod prompt;
pub mod recognizer;
pub mod schema;

pub use error::DrawingError;
pub use image::{DrawingInput, PreparedImage, RasterOptions, RasterStage, prepare_image, rasterize_svg};
pub use recognizer::DrawingRecognizer;
pub use schema::{DrawingConcept, DrawingExtraction, DrawingRelationship, DrawingStructure, simplify_label};

use extract::VisionService;
use render::{ImageFormat, LayoutStyle, RenderedImage, Renderer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DrawingConfig {
    pub raster: RasterOptions,
    /// Style used to redraw recognized drawings.
    pub layout_style: LayoutStyle,
    pub format: ImageFormat,
    /// Make a second model call for a plain-text description.
    pub describe_with_model: bool,
    /// Returned when a drawing cannot be read.
    pub mock: DrawingExtraction,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            raster: RasterOptions::default(),
            layout_style: LayoutStyle::Network,
            format: ImageFormat::Svg,
            describe_with_model: true,
            mock: DrawingExtraction::mock(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawingResult {
    pub concepts: Vec<DrawingConcept>,
    pub relationships: Vec<DrawingRelationship>,
    pub structure: DrawingStructure,
    /// Base64 diagram.
    pub image: String,
    pub format: ImageFormat,
    pub raw_text: String,
    /// True when the mock extraction was substituted.
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Drawing in, redrawn concept map out. Never fails: unreadable drawings
/// produce the configured mock.
#[derive(Clone)]
pub struct DrawingProcessor {
    recognizer: DrawingRecognizer,
    renderer: Renderer,
    config: Arc<DrawingConfig>,
}

impl DrawingProcessor {
    pub fn new(service: Arc<dyn VisionService>, renderer: Renderer) -> Self {
        Self::with_config(service, renderer, DrawingConfig::default())
    }

    pub fn with_config(service: Arc<dyn VisionService>, renderer: Renderer, config: DrawingConfig) -> Self {
        Self {
            recognizer: DrawingRecognizer::new(service),
            renderer,
            config: Arc::new(config),
        }
    }

    pub async fn process_drawing(&self, drawing: &str) -> DrawingResult {
        let input = match DrawingInput::parse(drawing) {
            Ok(input) => input,
            Err(e) => return self.fallback(e.to_string()).await,
        };
        info!(kind = input.kind(), "Processing drawing");

        let options = self.config.raster.clone();
        let prepared = match tokio::task::spawn_blocking(move || prepare_image(input, &options)).await {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(e)) => return self.fallback(e.to_string()).await,
            Err(e) => return self.fallback(format!("image preparation panicked: {}", e)).await,
        };
        if prepared.stage == RasterStage::Placeholder {
            warn!("Drawing could not be rasterized, sending placeholder image");
        }

        let extraction = match self.recognizer.recognize(&prepared.image).await {
            Ok(extraction) => extraction,
            Err(e) => return self.fallback(e.to_string()).await,
        };

        let raw_text = if self.config.describe_with_model {
            self.recognizer.describe(&prepared.image, &extraction).await
        } else {
            extraction.describe()
        };

        let image = self.render_extraction(&extraction).await;
        DrawingResult {
            concepts: extraction.concepts,
            relationships: extraction.relationships,
            structure: extraction.structure,
            image: image.image,
            format: image.format,
            raw_text,
            fallback: false,
            error: None,
        }
    }

    async fn fallback(&self, reason: String) -> DrawingResult {
        error!(error = %reason, "Error processing drawing, returning mock result");

        let mock = self.config.mock.clone();
        let image = self.render_extraction(&mock).await;
        let raw_text = mock.describe();

        DrawingResult {
            concepts: mock.concepts,
            relationships: mock.relationships,
            structure: mock.structure,
            image: image.image,
            format: image.format,
            raw_text,
            fallback: true,
            error: Some(reason),
        }
    }

    /// Draw an extraction on the blocking pool.
    pub async fn render_extraction(&self, extraction: &DrawingExtraction) -> RenderedImage {
        let graph = extraction.to_render_graph();
        let renderer = self.renderer.clone();
        let (style, format) = (self.config.layout_style, self.config.format);

        match tokio::task::spawn_blocking(move || renderer.render(&graph, style, format)).await {
            Ok(image) => image,
            Err(e) => self
                .renderer
                .render_error(&format!("Error: rendering task failed: {}", e), format),
        }
    }
}
