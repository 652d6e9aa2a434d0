// Database module
// Flat vector index plus the aligned chunk metadata persisted next to it

pub mod flat;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::RagError;

pub use flat::{FlatIndex, Neighbor};

pub const INDEX_FILE_NAME: &str = "vectors.index";
pub const METADATA_FILE_NAME: &str = "chunks.json";

/// Metadata for one indexed chunk; `chunk_id` equals its index row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: usize,
    pub source: String,
    pub text: String,
}

/// A search hit resolved to its chunk
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<'a> {
    pub record: &'a ChunkRecord,
    pub distance: f32,
}

/// Vector index and chunk metadata, kept row-aligned
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStore {
    index: FlatIndex,
    records: Vec<ChunkRecord>,
}

impl ChunkStore {
    /// Build a store from records and their vectors, in the same order
    #[inline]
    pub fn build(records: Vec<ChunkRecord>, vectors: &[Vec<f32>]) -> Result<Self, RagError> {
        if records.len() != vectors.len() {
            return Err(RagError::Misaligned {
                vectors: vectors.len(),
                records: records.len(),
            });
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        let mut index = FlatIndex::new(dimension);
        for vector in vectors {
            index.add(vector)?;
        }

        debug!(
            "Built flat index with {} rows of dimension {}",
            index.len(),
            dimension
        );

        Self::from_parts(index, records)
    }

    fn from_parts(index: FlatIndex, records: Vec<ChunkRecord>) -> Result<Self, RagError> {
        if index.len() != records.len() {
            return Err(RagError::Misaligned {
                vectors: index.len(),
                records: records.len(),
            });
        }
        if let Some((row, record)) = records
            .iter()
            .enumerate()
            .find(|(row, record)| record.chunk_id != *row)
        {
            return Err(RagError::Index(format!(
                "Chunk id {} stored at row {}",
                record.chunk_id, row
            )));
        }
        Ok(Self { index, records })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[inline]
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Distinct sources of all stored chunks
    #[inline]
    pub fn sources(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.source.as_str()).collect()
    }

    /// Nearest chunks to `query`, nearest first
    ///
    /// Rows without a metadata record are skipped. An empty store yields no
    /// results for any query.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult<'_>>, RagError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let neighbors = self.index.search(query, k)?;
        Ok(neighbors
            .into_iter()
            .filter_map(|neighbor| {
                self.records.get(neighbor.row).map(|record| SearchResult {
                    record,
                    distance: neighbor.distance,
                })
            })
            .collect())
    }

    /// Path of the index file inside `dir`
    #[inline]
    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    /// Path of the metadata file inside `dir`
    #[inline]
    pub fn metadata_path(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILE_NAME)
    }

    /// Whether both artifacts exist in `dir`
    #[inline]
    pub fn exists(dir: &Path) -> bool {
        Self::index_path(dir).is_file() && Self::metadata_path(dir).is_file()
    }

    /// Write the index and metadata files into `dir`, creating it if needed
    #[inline]
    pub fn save(&self, dir: &Path) -> Result<(), RagError> {
        fs::create_dir_all(dir)?;

        let index_path = Self::index_path(dir);
        let index_file = File::create(&index_path)?;
        self.index.write_to(BufWriter::new(index_file))?;

        let metadata_path = Self::metadata_path(dir);
        let mut metadata_file = BufWriter::new(File::create(&metadata_path)?);
        serde_json::to_writer_pretty(&mut metadata_file, &self.records)?;
        metadata_file.flush()?;

        info!(
            "Saved {} chunks to {} and {}",
            self.records.len(),
            index_path.display(),
            metadata_path.display()
        );
        Ok(())
    }

    /// Load a store written by [`ChunkStore::save`]
    #[inline]
    pub fn load(dir: &Path) -> Result<Self, RagError> {
        let index_path = Self::index_path(dir);
        let metadata_path = Self::metadata_path(dir);

        for path in [&index_path, &metadata_path] {
            if !path.is_file() {
                return Err(RagError::MissingArtifact(path.clone()));
            }
        }

        let index = FlatIndex::read_from(BufReader::new(File::open(&index_path)?))?;
        let records: Vec<ChunkRecord> =
            serde_json::from_reader(BufReader::new(File::open(&metadata_path)?))?;

        let store = Self::from_parts(index, records)?;
        info!(
            "Loaded {} chunks (dimension {}) from {}",
            store.len(),
            store.dimension(),
            dir.display()
        );
        Ok(store)
    }
}
