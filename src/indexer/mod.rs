// Indexer module
// Turns loaded documents into a persisted, row-aligned chunk store


use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::database::{ChunkRecord, ChunkStore};
use crate::embeddings::Embedder;
use crate::embeddings::chunking::{ChunkingConfig, chunk_text};
use crate::loader::{Document, load_documents};
use crate::{RagError, Result};

/// Ingestion pipeline: chunk, embed in batches, build the index
pub struct Indexer<E> {
    embedder: E,
    chunking_config: ChunkingConfig,
    batch_size: usize,
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks_created: usize,
    pub chunks_indexed: usize,
    pub dimension: usize,
    /// Description of the batch that stopped embedding early, if any
    pub failed_batch: Option<String>,
}

impl IngestReport {
    /// Whether every chunk made it into the index
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed_batch.is_none() && self.chunks_indexed == self.chunks_created
    }
}

impl<E: Embedder> Indexer<E> {
    #[inline]
    pub fn new(embedder: E, chunking_config: ChunkingConfig, batch_size: usize) -> Self {
        Self {
            embedder,
            chunking_config,
            batch_size: batch_size.max(1),
        }
    }

    #[inline]
    pub fn from_config(embedder: E, config: &Config) -> Self {
        Self::new(
            embedder,
            config.chunking.clone(),
            config.server.batch_size as usize,
        )
    }

    /// Load documents from `documents_dir`, index them and save into `index_dir`
    ///
    /// Nothing is written when there is nothing to index.
    #[inline]
    pub fn run(&self, documents_dir: &Path, index_dir: &Path) -> Result<IngestReport> {
        let documents = load_documents(documents_dir)?;
        if documents.is_empty() {
            error!(
                "No documents found in {}; nothing to index",
                documents_dir.display()
            );
            return Err(RagError::NoDocuments);
        }

        let (store, report) = self.build(&documents)?;
        store.save(index_dir)?;

        info!(
            "Indexed {}/{} chunks from {} documents into {}",
            report.chunks_indexed,
            report.chunks_created,
            report.documents,
            index_dir.display()
        );
        Ok(report)
    }

    /// Chunk and embed `documents` into an in-memory store
    ///
    /// A failing embedding batch stops the run; chunks embedded before it are
    /// kept and the rest are dropped from the metadata as well.
    #[inline]
    pub fn build(&self, documents: &[Document]) -> Result<(ChunkStore, IngestReport)> {
        let (mut records, raw_texts) = self.chunk_documents(documents);
        if records.is_empty() {
            return Err(RagError::NoDocuments);
        }

        let chunks_created = records.len();
        info!(
            "{} chunks created from {} documents",
            chunks_created,
            documents.len()
        );

        let (vectors, failed_batch) = self.embed_chunks(&raw_texts)?;
        if vectors.is_empty() {
            return Err(RagError::NothingEmbedded);
        }

        if vectors.len() < records.len() {
            warn!(
                "Only {} of {} chunks were embedded; the rest are left out of the index",
                vectors.len(),
                records.len()
            );
            records.truncate(vectors.len());
        }

        let store = ChunkStore::build(records, &vectors)?;
        let report = IngestReport {
            documents: documents.len(),
            chunks_created,
            chunks_indexed: store.len(),
            dimension: store.dimension(),
            failed_batch,
        };

        Ok((store, report))
    }

    /// Split every document, numbering chunks across the whole set
    fn chunk_documents(&self, documents: &[Document]) -> (Vec<ChunkRecord>, Vec<String>) {
        let mut records = Vec::new();
        let mut raw_texts = Vec::new();

        for document in documents {
            let before = records.len();
            for chunk in chunk_text(&document.text, &self.chunking_config) {
                records.push(ChunkRecord {
                    chunk_id: records.len(),
                    source: document.source.clone(),
                    text: chunk.text.to_string(),
                });
                raw_texts.push(chunk.raw.to_string());
            }

            if records.len() == before {
                debug!("Skipping {}: no text", document.source);
            } else {
                debug!(
                    "Split {} into {} chunks",
                    document.source,
                    records.len() - before
                );
            }
        }

        (records, raw_texts)
    }

    fn embed_chunks(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, Option<String>)> {
        let batch_count = texts.len().div_ceil(self.batch_size);
        let bar = if console::user_attended_stderr() {
            ProgressBar::new(batch_count as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
                    .map_err(anyhow::Error::from)?,
            )
        } else {
            ProgressBar::hidden()
        };

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        let mut failed_batch = None;

        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            let offset = batch_number * self.batch_size;
            bar.set_message(format!("chunks {}..{}", offset, offset + batch.len()));

            let expected_dimension = vectors.first().map(Vec::len);
            match self
                .embedder
                .embed(batch)
                .map_err(RagError::from)
                .and_then(|batch_vectors| {
                    check_batch(batch.len(), expected_dimension, &batch_vectors)?;
                    Ok(batch_vectors)
                }) {
                Ok(batch_vectors) => {
                    vectors.extend(batch_vectors);
                    bar.inc(1);
                }
                Err(e) => {
                    error!(
                        "Embedding batch {} (chunks starting at {}) failed: {}",
                        batch_number, offset, e
                    );
                    failed_batch = Some(format!(
                        "batch {} starting at chunk {}: {}",
                        batch_number, offset, e
                    ));
                    break;
                }
            }
        }

        bar.finish_and_clear();
        debug!("Generated {} embeddings", vectors.len());
        Ok((vectors, failed_batch))
    }
}

fn check_batch(
    expected_count: usize,
    expected_dimension: Option<usize>,
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(RagError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }

    let dimension = expected_dimension.or_else(|| vectors.first().map(Vec::len));
    if let Some(expected) = dimension {
        if expected == 0 {
            return Err(RagError::Embedding(
                "Embedding service returned empty vectors".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
    }

    Ok(())
}
