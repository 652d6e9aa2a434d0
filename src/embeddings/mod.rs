// Embeddings module
// Text chunking plus the seams to the external embedding and chat services

pub mod chunking;
pub mod openai;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use chunking::{ChunkingConfig, Chunks, TextChunk, chunk_text};
pub use openai::OpenAiClient;

/// Produces one embedding vector per input text
///
/// Each call is a single round-trip to the embedding service; callers are
/// responsible for keeping `texts` within the service's batch limit.
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text, as done for questions at query time
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()])?;
        if vectors.len() != 1 {
            anyhow::bail!(
                "Expected exactly one embedding for query, got {}",
                vectors.len()
            );
        }
        Ok(vectors.remove(0))
    }
}

/// Non-streaming chat completion
pub trait ChatModel {
    /// Name of the underlying model, used in diagnostics
    fn model_name(&self) -> &str;

    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl<T: Embedder + ?Sized> Embedder for &T {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts)
    }
}

impl<T: ChatModel + ?Sized> ChatModel for &T {
    #[inline]
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    #[inline]
    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        (**self).complete(messages, temperature)
    }
}
