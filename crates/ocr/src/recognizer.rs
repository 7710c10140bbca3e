use extract::{ImageInput, VisionService};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::DrawingError;
use crate::prompt::{DESCRIPTION_PROMPT, STRUCTURE_PROMPT};
use crate::schema::DrawingExtraction;

/// Reads concepts and relationships off a drawing with a vision model.
#[derive(Clone)]
pub struct DrawingRecognizer {
    service: Arc<dyn VisionService>,
}

impl DrawingRecognizer {
    pub fn new(service: Arc<dyn VisionService>) -> Self {
        Self { service }
    }

    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }

    pub async fn recognize(&self, image: &ImageInput) -> Result<DrawingExtraction, DrawingError> {
        info!(model = self.service.model_name(), bytes = image.data.len(), "Sending drawing to vision model");

        let generation = self.service.generate_with_image(STRUCTURE_PROMPT, image).await?;
        let extraction = DrawingExtraction::from_model_response(&generation.text)?;

        info!(
            concepts = extraction.concepts.len(),
            relationships = extraction.relationships.len(),
            "Extracted drawing structure"
        );
        Ok(extraction)
    }

    /// Plain-text description from a second model call, or built from `extraction`.
    pub async fn describe(&self, image: &ImageInput, extraction: &DrawingExtraction) -> String {
        match self.service.generate_with_image(DESCRIPTION_PROMPT, image).await {
            Ok(generation) if !generation.text.trim().is_empty() => generation.text.trim().to_string(),
            Ok(_) => {
                warn!("Vision model returned an empty description, building one locally");
                extraction.describe()
            }
            Err(e) => {
                warn!(error = %e, "Failed to get plain text description, building one locally");
                extraction.describe()
            }
        }
    }
}
