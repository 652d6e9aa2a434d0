
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{ChatMessage, ChatModel, Embedder};
use crate::config::ServerConfig;

/// Blocking client for an OpenAI-compatible server such as LM Studio
///
/// Requests are sent once; there is no retry layer and, unless
/// [`OpenAiClient::with_timeout`] is used, no timeout.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base_url = config
            .server_url()
            .context("Failed to generate server URL from config")?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            agent: ureq::Agent::new_with_defaults(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Check that the server answers and that both configured models are loaded
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for server at {}", self.base_url);

        let models = self.list_models().context("Server did not answer")?;

        for wanted in [&self.embedding_model, &self.chat_model] {
            if !models.iter().any(|m| &m.id == wanted) {
                let available: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                anyhow::bail!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted,
                    available
                );
            }
        }

        info!(
            "Health check passed for server at {} with models {} and {}",
            self.base_url, self.embedding_model, self.chat_model
        );
        Ok(())
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("models")?;
        debug!("Fetching available models from {}", url);

        let response_text = self
            .agent
            .get(url.as_str())
            .header("Authorization", &self.authorization())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| describe_error(&e))
            .context("Failed to fetch models")?;

        let models: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models.data.len());
        Ok(models.data)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build {} URL", path))
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body)
            .with_context(|| format!("Failed to serialize {} request", path))?;

        self.agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &self.authorization())
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| describe_error(&e))
            .with_context(|| format!("Request to {} failed", url))
    }
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let response_text = self
            .post_json("embeddings", &request)
            .context("Failed to generate embeddings")?;

        let response: EmbeddingResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.data.len() != texts.len() {
            anyhow::bail!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            );
        }

        let vectors = order_by_index(response.data)?;
        debug!(
            "Generated {} embeddings with {} dimensions",
            vectors.len(),
            vectors.first().map_or(0, Vec::len)
        );
        Ok(vectors)
    }
}

impl ChatModel for OpenAiClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    #[inline]
    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            temperature,
            stream: false,
        };

        let response_text = self
            .post_json("chat/completions", &request)
            .context("Failed to generate completion")?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .context("Failed to parse completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Completion response contained no message")
    }
}

/// Put embeddings back in input order
///
/// Indices must be absent on every item (response already in order) or form
/// a permutation of `0..data.len()`.
fn order_by_index(data: Vec<EmbeddingData>) -> Result<Vec<Vec<f32>>> {
    if data.iter().all(|d| d.index.is_none()) {
        return Ok(data.into_iter().map(|d| d.embedding).collect());
    }

    let count = data.len();
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; count];
    for item in data {
        let Some(index) = item.index else {
            anyhow::bail!("Embedding response mixes indexed and unindexed items");
        };
        match slots.get_mut(index) {
            Some(slot @ None) => *slot = Some(item.embedding),
            Some(Some(_)) => anyhow::bail!("Embedding response repeats index {}", index),
            None => anyhow::bail!(
                "Embedding response index {} is out of range for {} inputs",
                index,
                count
            ),
        }
    }

    // Every slot is filled: `count` distinct indices below `count`
    Ok(slots.into_iter().flatten().collect())
}

fn describe_error(error: &ureq::Error) -> anyhow::Error {
    match error {
        ureq::Error::StatusCode(status) if *status >= 500 => {
            anyhow::anyhow!("Server error: HTTP {}", status)
        }
        ureq::Error::StatusCode(status) => anyhow::anyhow!("Client error: HTTP {}", status),
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
            anyhow::anyhow!("Could not connect to server: {}", error)
        }
        ureq::Error::Timeout(_) => anyhow::anyhow!("Request timed out: {}", error),
        _ => anyhow::anyhow!("Request error: {}", error),
    }
}
