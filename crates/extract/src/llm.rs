use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::LlmError;
use crate::retry::RetryPolicy;

/// Text returned by a model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Encoded raster image handed to a vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageInput {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data,
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// Text-in, text-out generative model.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, LlmError>;

    fn model_name(&self) -> &str;
}

/// Image plus prompt in, text out.
#[async_trait]
pub trait VisionService: Send + Sync {
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImageInput,
    ) -> Result<Generation, LlmError>;

    fn model_name(&self) -> &str;
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new("http://localhost:11434".to_string(), "llama3".to_string())
    }
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self::with_options(base_url, model, Duration::from_secs(60), RetryPolicy::default())
    }

    pub fn with_options(
        base_url: String,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    error = %e,
                    timeout_secs = timeout.as_secs(),
                    "Failed to build HTTP client, using defaults without request timeout"
                );
                reqwest::Client::new()
            }
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
            retry,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_once(&self, prompt: &str, images: &[String]) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            images: images.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        Ok(ollama_response.response)
    }

    async fn send(&self, prompt: &str, images: &[String]) -> Result<Generation, LlmError> {
        let operation = if images.is_empty() {
            "ollama_generate"
        } else {
            "ollama_generate_vision"
        };

        let text = self
            .retry
            .retry_if(
                operation,
                || self.send_once(prompt, images),
                LlmError::is_retryable,
            )
            .await?;

        tracing::debug!(
            model = %self.model,
            response_chars = text.len(),
            "Model call completed"
        );

        Ok(Generation { text })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl TextGenerationService for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, LlmError> {
        self.send(prompt, &[]).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl VisionService for OllamaClient {
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImageInput,
    ) -> Result<Generation, LlmError> {
        if image.data.is_empty() {
            return Err(LlmError::Unavailable("empty image payload".to_string()));
        }
        self.send(prompt, &[image.to_base64()]).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
