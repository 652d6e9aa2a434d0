use std::collections::BTreeSet;
use tracing::info;

use crate::Result;
use crate::database::ChunkStore;

/// Context assembled from the chunks nearest to a question
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    /// Labeled chunk blocks separated by blank lines, nearest first
    pub context: String,
    /// Distinct sources that contributed a chunk
    pub sources: BTreeSet<String>,
    /// Number of chunks in the context
    pub fragments: usize,
}

impl RetrievedContext {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments == 0
    }
}

/// Fetch the `top_k` chunks nearest to `query` and format them as context
#[inline]
pub fn retrieve_context(store: &ChunkStore, query: &[f32], top_k: usize) -> Result<RetrievedContext> {
    let results = store.search(query, top_k)?;

    let mut blocks = Vec::with_capacity(results.len());
    let mut sources = BTreeSet::new();
    for result in &results {
        blocks.push(format_block(&result.record.source, &result.record.text));
        sources.insert(result.record.source.clone());
    }

    info!(
        "Retrieved {} fragments from sources: {:?}",
        blocks.len(),
        sources
    );

    Ok(RetrievedContext {
        context: blocks.join("\n\n"),
        sources,
        fragments: blocks.len(),
    })
}

fn format_block(source: &str, text: &str) -> String {
    format!("--- Source: {} ---\n{}", source, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RagError;
    use crate::database::ChunkRecord;

    fn store() -> ChunkStore {
        let records = ["alpha", "beta", "gamma"]
            .iter()
            .enumerate()
            .map(|(i, text)| ChunkRecord {
                chunk_id: i,
                source: if i == 2 { "b.txt" } else { "a.txt" }.to_string(),
                text: (*text).to_string(),
            })
            .collect();
        ChunkStore::build(records, &[vec![0.0], vec![1.0], vec![10.0]]).expect("store builds")
    }

    #[test]
    fn formats_labeled_blocks_nearest_first() {
        let retrieved = retrieve_context(&store(), &[0.9], 2).expect("retrieval succeeds");

        assert_eq!(
            retrieved.context,
            "--- Source: a.txt ---\nbeta\n\n--- Source: a.txt ---\nalpha"
        );
        assert_eq!(retrieved.fragments, 2);
        assert_eq!(
            retrieved.sources.into_iter().collect::<Vec<_>>(),
            vec!["a.txt"]
        );
    }

    #[test]
    fn collects_distinct_sources() {
        let retrieved = retrieve_context(&store(), &[5.0], 4).expect("retrieval succeeds");

        assert_eq!(retrieved.fragments, 3);
        assert_eq!(
            retrieved.sources.into_iter().collect::<Vec<_>>(),
            vec!["a.txt", "b.txt"]
        );
        assert!(!retrieved.context.contains("Sources"));
    }

    #[test]
    fn empty_store_gives_empty_context() {
        let empty = ChunkStore::build(Vec::new(), &[]).expect("empty store builds");
        let retrieved = retrieve_context(&empty, &[1.0, 2.0], 4).expect("retrieval succeeds");

        assert!(retrieved.is_empty());
        assert_eq!(retrieved.context, "");
    }

    #[test]
    fn query_dimension_mismatch_is_an_error() {
        let retrieved = retrieve_context(&store(), &[1.0, 2.0], 4);
        assert!(matches!(retrieved, Err(RagError::DimensionMismatch { .. })));
    }

    #[test]
    fn zero_top_k_gives_empty_context() {
        let retrieved = retrieve_context(&store(), &[0.0], 0).expect("retrieval succeeds");
        assert!(retrieved.is_empty());
        assert_eq!(retrieved.context, "");
        assert!(retrieved.sources.is_empty());
    }
}
