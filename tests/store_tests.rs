//! End-to-end tests for the dataset vector store adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use vecstore::engine::{
    DatasetHandle, DatasetOptions, DeleteRequest, EngineVersion, ExecMode, InsertRequest,
    SearchRequest, SearchRows, VectorEngine,
};
use vecstore::{
    DatasetVectorStore, EmbeddingProvider, LocalVectorEngine, Metadata, QueryEmbedding, Result,
    SearchOptions, StoreConfig, StoreError,
};

const DIM: usize = 2;

/// Maps known texts to fixed embeddings; unknown texts embed to the origin.
struct MapProvider {
    vectors: HashMap<String, Vec<f32>>,
}

impl MapProvider {
    fn new(pairs: &[(&str, [f32; DIM])]) -> Self {
        Self {
            vectors: pairs.iter().map(|(text, v)| ((*text).to_string(), v.to_vec())).collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MapProvider {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectors.get(text).cloned().unwrap_or_else(|| vec![0.0; DIM]))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

fn corpus_provider() -> Arc<MapProvider> {
    Arc::new(MapProvider::new(&[
        ("alpha", [1.0, 0.0]),
        ("beta", [0.0, 1.0]),
        ("gamma", [1.0, 1.0]),
    ]))
}

async fn open_store(dir: &TempDir) -> DatasetVectorStore {
    let engine = Arc::new(LocalVectorEngine::new());
    DatasetVectorStore::open(
        StoreConfig::builder()
            .dataset_path(dir.path().join("ds").to_string_lossy())
            .verbose(false)
            .build()
            .unwrap(),
        engine,
        Some(corpus_provider()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn add_texts_returns_one_generated_id_per_text() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let ids = store.add_texts(&["alpha", "beta", "gamma"], None, None).await.unwrap();
    assert_eq!(ids.len(), 3);
    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn add_texts_preserves_caller_ids_in_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let wanted = vec!["a-1".to_string(), "b-2".to_string()];
    let ids = store.add_texts(&["alpha", "beta"], None, Some(wanted.clone())).await.unwrap();
    assert_eq!(ids, wanted);
}

#[tokio::test]
async fn omitted_metadatas_behave_like_empty_maps() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.add_texts(&["alpha"], None, None).await.unwrap();

    let docs = store
        .similarity_search(Some("alpha"), None, SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    // Only the search-injected embedding key is present.
    assert_eq!(docs[0].metadata.len(), 1);
    assert!(docs[0].metadata.contains_key("embedding"));

    let dir2 = TempDir::new().unwrap();
    let store2 = open_store(&dir2).await;
    store2.add_texts(&["alpha"], Some(vec![Metadata::new()]), None).await.unwrap();
    let docs2 = store2
        .similarity_search(Some("alpha"), None, SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(docs, docs2);
}

#[tokio::test]
async fn add_texts_rejects_mismatched_lengths() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let err = store
        .add_texts(&["alpha", "beta"], Some(vec![Metadata::new()]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    let err = store
        .add_texts(&["alpha"], None, Some(vec!["x".into(), "y".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn add_texts_without_provider_is_invalid() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(LocalVectorEngine::new());
    let store = DatasetVectorStore::open(
        StoreConfig::at(dir.path().join("ds").to_string_lossy()),
        engine,
        None,
    )
    .await
    .unwrap();

    let err = store.add_texts(&["alpha"], None, None).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn similarity_search_requires_exactly_one_input() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let err = store.similarity_search(None, None, SearchOptions::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    let err = store
        .similarity_search(
            Some("alpha"),
            Some(QueryEmbedding::Flat(vec![1.0, 0.0])),
            SearchOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn query_without_provider_is_invalid() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(LocalVectorEngine::new());
    let store = DatasetVectorStore::open(
        StoreConfig::at(dir.path().join("ds").to_string_lossy()),
        engine,
        None,
    )
    .await
    .unwrap();

    let err = store
        .similarity_search(Some("alpha"), None, SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    // A precomputed embedding needs no provider.
    let docs = store
        .similarity_search(None, Some(vec![1.0, 0.0].into()), SearchOptions::default())
        .await
        .unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn search_returns_engine_order_and_injects_embedding() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.add_texts(&["alpha", "beta", "gamma"], None, None).await.unwrap();

    let scored = store
        .similarity_search_with_score(
            None,
            Some(vec![1.0, 0.0].into()),
            SearchOptions::with_k(2),
        )
        .await
        .unwrap();

    // L2 from [1,0]: alpha at 0, gamma at 1, beta at sqrt(2).
    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].document.page_content, "alpha");
    assert_eq!(scored[1].document.page_content, "gamma");
    assert!(scored[0].score <= scored[1].score);
    assert_eq!(scored[0].document.metadata.get("embedding"), Some(&json!([1.0, 0.0])));
    assert_eq!(scored[1].document.metadata.get("embedding"), Some(&json!([1.0, 1.0])));
}

#[tokio::test]
async fn search_returns_fewer_than_k_when_dataset_is_small() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.add_texts(&["alpha"], None, None).await.unwrap();

    let docs = store
        .similarity_search(Some("alpha"), None, SearchOptions::with_k(10))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn batch_embedding_input_uses_first_row() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.add_texts(&["alpha", "beta"], None, None).await.unwrap();

    let flat = store
        .similarity_search(None, Some(vec![1.0, 0.0].into()), SearchOptions::default())
        .await
        .unwrap();
    let batched = store
        .similarity_search(
            None,
            Some(vec![vec![1.0, 0.0], vec![0.0, 1.0]].into()),
            SearchOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(flat, batched);
}

#[tokio::test]
async fn raw_query_with_scores_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let err = store.raw_query_search("select *", None, true).await.unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));

    let options = SearchOptions {
        raw_query: Some("select *".to_string()),
        ..SearchOptions::default()
    };
    let err = store
        .similarity_search_with_score(Some("alpha"), None, options)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));
}

#[tokio::test]
async fn from_texts_rejects_deprecated_embedding_option() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(LocalVectorEngine::new());
    let config = StoreConfig::builder()
        .dataset_path(dir.path().join("ds").to_string_lossy())
        .extra_option("embedding", json!("legacy"))
        .build()
        .unwrap();

    let err = DatasetVectorStore::from_texts(
        &["alpha"],
        config,
        engine,
        Some(corpus_provider()),
        None,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}

#[tokio::test]
async fn from_texts_opens_and_ingests() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(LocalVectorEngine::new());
    let store = DatasetVectorStore::from_texts(
        &["alpha", "beta"],
        StoreConfig::at(dir.path().join("ds").to_string_lossy()),
        engine,
        Some(corpus_provider()),
        None,
        None,
    )
    .await
    .unwrap();

    let docs = store
        .similarity_search(Some("beta"), None, SearchOptions::with_k(1))
        .await
        .unwrap();
    assert_eq!(docs[0].page_content, "beta");
}

#[tokio::test]
async fn fresh_datasets_use_the_id_field() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    assert_eq!(store.id_field(), "id");
}

#[tokio::test]
async fn legacy_datasets_resolve_the_ids_field() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ds");
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(
        path.join("dataset.json"),
        r#"{"id_field":"ids","records":[]}"#,
    )
    .unwrap();

    let engine = Arc::new(LocalVectorEngine::new());
    let store = DatasetVectorStore::open(
        StoreConfig::at(path.to_string_lossy()),
        engine,
        Some(corpus_provider()),
    )
    .await
    .unwrap();
    assert_eq!(store.id_field(), "ids");

    // Caller ids pass through under the legacy field name.
    let ids = store
        .add_texts(&["alpha"], None, Some(vec!["legacy-1".into()]))
        .await
        .unwrap();
    assert_eq!(ids, vec!["legacy-1".to_string()]);
}

#[tokio::test]
async fn delete_by_ids_then_delete_dataset() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let ids = store.add_texts(&["alpha", "beta"], None, None).await.unwrap();

    assert!(store.delete(Some(vec![ids[0].clone()]), None, false).await.unwrap());
    let docs = store
        .similarity_search(None, Some(vec![1.0, 0.0].into()), SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].page_content, "beta");

    assert!(store.delete_dataset().await.unwrap());
    let docs = store
        .similarity_search(None, Some(vec![1.0, 0.0].into()), SearchOptions::default())
        .await
        .unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn force_delete_by_path_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ds");
    let engine: Arc<dyn VectorEngine> = Arc::new(LocalVectorEngine::new());
    let store = DatasetVectorStore::open(
        StoreConfig::at(path.to_string_lossy()),
        Arc::clone(&engine),
        Some(corpus_provider()),
    )
    .await
    .unwrap();
    store.add_texts(&["alpha"], None, None).await.unwrap();

    let path = path.to_string_lossy().to_string();
    DatasetVectorStore::force_delete_by_path(&engine, &path).await.unwrap();
    assert!(!std::path::Path::new(&path).exists());
    // Destroying an already-deleted dataset succeeds.
    DatasetVectorStore::force_delete_by_path(&engine, &path).await.unwrap();
}

// ── version gate and raw-query shaping, against a stub backend ─────

struct StubEngine {
    version: EngineVersion,
    handle: Arc<StubDataset>,
}

#[derive(Default)]
struct StubDataset {
    rows: SearchRows,
}

#[async_trait]
impl VectorEngine for StubEngine {
    fn version(&self) -> EngineVersion {
        self.version
    }

    async fn open_dataset(&self, _options: &DatasetOptions) -> Result<Arc<dyn DatasetHandle>> {
        Ok(Arc::clone(&self.handle) as Arc<dyn DatasetHandle>)
    }

    async fn force_delete(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl DatasetHandle for StubDataset {
    fn tensors(&self) -> Vec<String> {
        vec!["id".into(), "text".into(), "metadata".into(), "embedding".into()]
    }

    async fn insert(&self, request: InsertRequest) -> Result<Vec<String>> {
        Ok(request.ids.unwrap_or_default())
    }

    async fn search(&self, _request: SearchRequest) -> Result<SearchRows> {
        Ok(self.rows.clone())
    }

    async fn query(&self, _raw_query: &str, _exec_mode: Option<ExecMode>) -> Result<SearchRows> {
        Ok(self.rows.clone())
    }

    async fn delete(&self, _request: DeleteRequest) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn outdated_engine_version_is_a_config_error() {
    let engine = Arc::new(StubEngine {
        version: EngineVersion::new(3, 6, 1),
        handle: Arc::new(StubDataset::default()),
    });
    let err = DatasetVectorStore::open(StoreConfig::default(), engine, None).await.unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}

#[tokio::test]
async fn raw_query_reshapes_rows_into_documents() {
    let mut meta = Metadata::new();
    meta.insert("lang".into(), json!("en"));
    let handle = Arc::new(StubDataset {
        rows: SearchRows {
            texts: vec!["hello".into()],
            metadatas: vec![meta.clone()],
            scores: Vec::new(),
            embeddings: Vec::new(),
        },
    });
    let engine = Arc::new(StubEngine { version: EngineVersion::new(3, 6, 2), handle });
    let store = DatasetVectorStore::open(StoreConfig::default(), engine, None).await.unwrap();

    let docs = store.raw_query_search("select * where lang == 'en'", None, false).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].page_content, "hello");
    assert_eq!(docs[0].metadata, meta);

    // The similarity entry point routes to the same path when a raw query
    // is present, even without an embedding source.
    let options = SearchOptions {
        raw_query: Some("select * where lang == 'en'".to_string()),
        ..SearchOptions::default()
    };
    let routed = store.similarity_search(Some("ignored"), None, options).await.unwrap();
    assert_eq!(routed, docs);
}
