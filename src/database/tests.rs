use super::*;
use tempfile::TempDir;

fn record(chunk_id: usize, source: &str, text: &str) -> ChunkRecord {
    ChunkRecord {
        chunk_id,
        source: source.to_string(),
        text: text.to_string(),
    }
}

fn sample_store() -> ChunkStore {
    let records = vec![
        record(0, "guide.txt", "Rust has ownership."),
        record(1, "guide.txt", "Borrowing is checked at compile time."),
        record(2, "manuals/español.pdf", "El préstamo es seguro. ✓"),
    ];
    let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
    ChunkStore::build(records, &vectors).expect("store builds")
}

#[test]
fn build_keeps_rows_aligned() {
    let store = sample_store();
    assert_eq!(store.len(), 3);
    assert_eq!(store.index.len(), store.records().len());
    assert_eq!(store.dimension(), 3);
    assert_eq!(
        store.sources().into_iter().collect::<Vec<_>>(),
        vec!["guide.txt", "manuals/español.pdf"]
    );
}

#[test]
fn build_rejects_length_mismatch() {
    let records = vec![record(0, "a.txt", "a"), record(1, "a.txt", "b")];
    let vectors = vec![vec![1.0, 2.0]];

    assert!(matches!(
        ChunkStore::build(records, &vectors),
        Err(RagError::Misaligned {
            vectors: 1,
            records: 2
        })
    ));
}

#[test]
fn build_rejects_mixed_dimensions() {
    let records = vec![record(0, "a.txt", "a"), record(1, "a.txt", "b")];
    let vectors = vec![vec![1.0, 2.0], vec![1.0, 2.0, 3.0]];

    assert!(matches!(
        ChunkStore::build(records, &vectors),
        Err(RagError::DimensionMismatch { .. })
    ));
}

#[test]
fn build_rejects_ids_that_do_not_match_rows() {
    let records = vec![record(0, "a.txt", "a"), record(5, "a.txt", "b")];
    let vectors = vec![vec![1.0], vec![2.0]];

    assert!(matches!(
        ChunkStore::build(records, &vectors),
        Err(RagError::Index(_))
    ));
}

#[test]
fn search_resolves_records() {
    let store = sample_store();
    let results = store.search(&[0.0, 0.9, 0.1], 2).expect("search succeeds");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].record.chunk_id, 1);
    assert_eq!(results[1].record.chunk_id, 2);
}

#[test]
fn search_never_fabricates_entries() {
    let store = sample_store();
    let results = store.search(&[1.0, 1.0, 1.0], 4).expect("search succeeds");
    assert_eq!(results.len(), 3);
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = temp_dir.path().join("rag_index");
    let store = sample_store();

    store.save(&dir).expect("store saves");
    assert!(ChunkStore::exists(&dir));

    let loaded = ChunkStore::load(&dir).expect("store loads");
    assert_eq!(loaded, store);
    assert_eq!(loaded.index.len(), loaded.records().len());
    assert_eq!(loaded.records()[2].text, "El préstamo es seguro. ✓");
}

#[test]
fn metadata_is_human_readable_json() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    sample_store().save(temp_dir.path()).expect("store saves");

    let json = fs::read_to_string(ChunkStore::metadata_path(temp_dir.path()))
        .expect("metadata is readable");
    assert!(json.contains('\n'));
    assert!(json.contains("español"));

    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value[0]["chunk_id"], 0);
    assert_eq!(value[0]["source"], "guide.txt");
    assert_eq!(value[1]["text"], "Borrowing is checked at compile time.");
}

#[test]
fn load_reports_missing_artifacts() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    match ChunkStore::load(temp_dir.path()) {
        Err(RagError::MissingArtifact(path)) => {
            assert_eq!(path, ChunkStore::index_path(temp_dir.path()));
        }
        other => panic!("expected missing artifact, got {:?}", other),
    }

    sample_store().save(temp_dir.path()).expect("store saves");
    fs::remove_file(ChunkStore::metadata_path(temp_dir.path())).expect("removes metadata");

    assert!(!ChunkStore::exists(temp_dir.path()));
    assert!(matches!(
        ChunkStore::load(temp_dir.path()),
        Err(RagError::MissingArtifact(_))
    ));
}

#[test]
fn load_rejects_misaligned_artifacts() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    sample_store().save(temp_dir.path()).expect("store saves");

    let records = vec![record(0, "guide.txt", "only one")];
    fs::write(
        ChunkStore::metadata_path(temp_dir.path()),
        serde_json::to_string(&records).expect("serializes"),
    )
    .expect("overwrites metadata");

    assert!(matches!(
        ChunkStore::load(temp_dir.path()),
        Err(RagError::Misaligned {
            vectors: 3,
            records: 1
        })
    ));
}
