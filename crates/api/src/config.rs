use anyhow::{Context, Result, bail};
use extract::{OllamaClient, RetryPolicy};
use pipeline::PipelineConfig;
use render::{RenderBackend, RenderConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub llm: LlmConfig,
    pub render: RenderSettings,
    pub bind_addr: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,     // Wide fan-out, short timeouts, few retries
    Accurate, // Narrow fan-out, patient timeouts and retries
    Balanced, // Default
}

impl FromStr for OperationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(OperationMode::Fast),
            "accurate" => Ok(OperationMode::Accurate),
            "balanced" => Ok(OperationMode::Balanced),
            other => bail!("unknown operation mode '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_extractions: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    pub backend: RenderBackend,
    pub graphviz_bin_dir: String,
    pub png_max_side: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            text_model: "llama3".to_string(),
            vision_model: "llava".to_string(),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        let render = RenderConfig::default();
        Self {
            backend: render.backend,
            graphviz_bin_dir: render.graphviz_bin_dir,
            png_max_side: render.png_max_side,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            concurrency: ConcurrencyConfig {
                max_concurrent_extractions: 5,
                request_timeout_secs: 60,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            llm: LlmConfig::default(),
            render: RenderSettings::default(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        Self {
            mode: OperationMode::Fast,
            concurrency: ConcurrencyConfig {
                max_concurrent_extractions: 20,
                request_timeout_secs: 30,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            ..Self::default()
        }
    }

    pub fn accurate_mode() -> Self {
        Self {
            mode: OperationMode::Accurate,
            concurrency: ConcurrencyConfig {
                max_concurrent_extractions: 3,
                request_timeout_secs: 120,
            },
            retry: RetryConfig {
                max_retries: 5,
                initial_backoff_ms: 2000,
                max_backoff_ms: 20000,
            },
            ..Self::default()
        }
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Mode preset first, then individual overrides.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("CONCEPT_MAP_MODE") {
            Some(mode) => Self::for_mode(mode.parse().context("invalid CONCEPT_MAP_MODE")?),
            None => Self::default(),
        };

        if let Some(url) = lookup("OLLAMA_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.llm.text_model = model;
        }
        if let Some(model) = lookup("OLLAMA_VISION_MODEL") {
            config.llm.vision_model = model;
        }
        if let Some(addr) = lookup("CONCEPT_MAP_BIND") {
            config.bind_addr = addr;
        }
        if let Some(backend) = lookup("CONCEPT_MAP_RENDER_BACKEND") {
            config.render.backend = backend
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid CONCEPT_MAP_RENDER_BACKEND")?;
        }
        if let Some(dir) = lookup("GRAPHVIZ_BIN_DIR") {
            config.render.graphviz_bin_dir = dir;
        }

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }

    pub fn text_client(&self) -> OllamaClient {
        self.client_for(&self.llm.text_model)
    }

    pub fn vision_client(&self) -> OllamaClient {
        self.client_for(&self.llm.vision_model)
    }

    fn client_for(&self, model: &str) -> OllamaClient {
        OllamaClient::with_options(
            self.llm.base_url.clone(),
            model.to_string(),
            Duration::from_secs(self.concurrency.request_timeout_secs),
            self.retry_policy(),
        )
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_concurrent_extractions: self.concurrency.max_concurrent_extractions,
            render: RenderConfig {
                backend: self.render.backend,
                graphviz_bin_dir: self.render.graphviz_bin_dir.clone(),
                png_max_side: self.render.png_max_side,
                ..RenderConfig::default()
            },
            ..PipelineConfig::default()
        }
    }
}
