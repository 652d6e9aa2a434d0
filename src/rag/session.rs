use anyhow::Context;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::generator::{DEFAULT_TEMPERATURE, generate_answer};
use super::retriever::retrieve_context;
use crate::Result;
use crate::config::Config;
use crate::database::ChunkStore;
use crate::embeddings::{ChatModel, Embedder, OpenAiClient};

/// A loaded index together with the models used to query it
///
/// The store is read-only for the lifetime of the session.
pub struct RagSession<E, C> {
    store: ChunkStore,
    embedder: E,
    chat_model: C,
    top_k: usize,
    temperature: f32,
}

/// Answer to one question plus what it was grounded on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Model answer, or a marked error string when generation failed
    pub answer: String,
    pub sources: BTreeSet<String>,
    pub fragments: usize,
}

impl RagSession<OpenAiClient, OpenAiClient> {
    /// Load the persisted index from the configured directory and connect to the server
    #[inline]
    pub fn open(config: &Config) -> Result<Self> {
        let store = ChunkStore::load(&config.paths.index_dir)?;
        let client =
            OpenAiClient::new(&config.server).context("Failed to initialize server client")?;

        Ok(Self::new(store, client.clone(), client)
            .with_top_k(config.retrieval.top_k)
            .with_temperature(config.server.temperature))
    }
}

impl<E: Embedder, C: ChatModel> RagSession<E, C> {
    #[inline]
    pub fn new(store: ChunkStore, embedder: E, chat_model: C) -> Self {
        Self {
            store,
            embedder,
            chat_model,
            top_k: 4,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[inline]
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    #[inline]
    pub fn chat_model_name(&self) -> &str {
        self.chat_model.model_name()
    }

    /// Run the query pipeline for one question
    ///
    /// Fails only when the question cannot be embedded or searched; a failed
    /// completion is reported inside the returned answer.
    #[inline]
    pub fn ask(&self, question: &str) -> Result<QueryOutcome> {
        debug!("Embedding question ({} chars)", question.len());
        let query = self
            .embedder
            .embed_one(question)
            .context("Failed to embed the question")?;

        let retrieved = retrieve_context(&self.store, &query, self.top_k)?;
        info!(
            "Context built from {} fragments, {} unique sources",
            retrieved.fragments,
            retrieved.sources.len()
        );

        let answer = generate_answer(
            &self.chat_model,
            question,
            &retrieved.context,
            self.temperature,
        );

        Ok(QueryOutcome {
            answer,
            sources: retrieved.sources,
            fragments: retrieved.fragments,
        })
    }
}
