//! The dataset-backed vector document store.
//!
//! [`DatasetVectorStore`] translates generic add-texts / search / delete
//! operations into calls against an [`EmbeddingProvider`] and a
//! [`VectorEngine`], and reshapes engine rows back into [`Document`]s.
//! Indexing, distance computation, and persistence all live behind the
//! engine; this layer does argument validation, embedding-function
//! resolution, result shaping, and id bookkeeping.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vecstore::{DatasetVectorStore, LocalVectorEngine, StoreConfig, SearchOptions};
//!
//! let engine = Arc::new(LocalVectorEngine::new());
//! let store = DatasetVectorStore::open(
//!     StoreConfig::at("./my_dataset"),
//!     engine,
//!     Some(Arc::new(my_provider)),
//! ).await?;
//!
//! store.add_texts(&["hello", "world"], None, None).await?;
//! let docs = store
//!     .similarity_search(Some("greeting"), None, SearchOptions::default())
//!     .await?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::document::{Document, Metadata, ScoredDocument};
use crate::embedding::EmbeddingProvider;
use crate::engine::{
    DatasetHandle, DeleteRequest, DistanceMetric, ExecMode, Filter, InsertRequest, SearchRequest,
    SearchRows, VectorEngine, MIN_ENGINE_VERSION,
};
use crate::error::{Result, StoreError};

/// A query embedding as supplied by a caller or an embedding backend.
///
/// Providers occasionally return a batch of one vector where a single
/// vector was asked for; [`QueryEmbedding::Batch`] absorbs that shape and
/// normalization takes the first row.
#[derive(Debug, Clone)]
pub enum QueryEmbedding {
    /// A single embedding vector.
    Flat(Vec<f32>),
    /// A batch of embedding vectors; only the first row is used.
    Batch(Vec<Vec<f32>>),
}

impl QueryEmbedding {
    /// Collapse into a single fixed-width vector.
    fn normalize(self) -> Result<Vec<f32>> {
        match self {
            QueryEmbedding::Flat(vector) => Ok(vector),
            QueryEmbedding::Batch(rows) => rows.into_iter().next().ok_or_else(|| {
                StoreError::InvalidArgument("embedding batch is empty".to_string())
            }),
        }
    }
}

impl From<Vec<f32>> for QueryEmbedding {
    fn from(vector: Vec<f32>) -> Self {
        QueryEmbedding::Flat(vector)
    }
}

impl From<Vec<Vec<f32>>> for QueryEmbedding {
    fn from(rows: Vec<Vec<f32>>) -> Self {
        QueryEmbedding::Batch(rows)
    }
}

/// Recognized search options and their defaults.
#[derive(Clone)]
pub struct SearchOptions {
    /// Number of documents to return. Defaults to 4.
    pub k: usize,
    /// Distance metric used to rank neighbors. Defaults to [`DistanceMetric::L2`].
    pub distance_metric: DistanceMetric,
    /// Optional filter applied before the distance search.
    pub filter: Option<Filter>,
    /// Per-call execution mode override.
    pub exec_mode: Option<ExecMode>,
    /// A query in the backend's native query language. When set, the
    /// search runs on the raw-query path and the embedding arguments are
    /// ignored.
    pub raw_query: Option<String>,
    /// Per-call embedding provider override, taking precedence over the
    /// provider configured at construction.
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 4,
            distance_metric: DistanceMetric::default(),
            filter: None,
            exec_mode: None,
            raw_query: None,
            embedding_provider: None,
        }
    }
}

impl SearchOptions {
    /// Options returning `k` results with everything else at defaults.
    pub fn with_k(k: usize) -> Self {
        Self { k, ..Self::default() }
    }
}

impl std::fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOptions")
            .field("k", &self.k)
            .field("distance_metric", &self.distance_metric)
            .field("filter", &self.filter)
            .field("exec_mode", &self.exec_mode)
            .field("raw_query", &self.raw_query)
            .field("has_provider_override", &self.embedding_provider.is_some())
            .finish()
    }
}

/// A document store backed by a vector engine dataset.
///
/// Construct with [`open`](DatasetVectorStore::open) or
/// [`from_texts`](DatasetVectorStore::from_texts). All state is resolved
/// at construction and read-only afterwards, so a store can be shared
/// across calls freely.
pub struct DatasetVectorStore {
    config: StoreConfig,
    engine: Arc<dyn VectorEngine>,
    dataset: Arc<dyn DatasetHandle>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    id_field: String,
}

impl std::fmt::Debug for DatasetVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetVectorStore")
            .field("config", &self.config)
            .field("id_field", &self.id_field)
            .field("has_embedding", &self.embedding.is_some())
            .finish()
    }
}

impl DatasetVectorStore {
    /// Open the dataset at `config.dataset_path`, creating it if absent.
    ///
    /// Resolves which id field name the dataset uses (`"ids"` on legacy
    /// datasets, `"id"` otherwise) so that caller-supplied ids can be
    /// passed through under either convention.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the engine's version is below
    /// [`MIN_ENGINE_VERSION`], and propagates engine errors from opening
    /// the dataset.
    pub async fn open(
        config: StoreConfig,
        engine: Arc<dyn VectorEngine>,
        embedding: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self> {
        let version = engine.version();
        if version < MIN_ENGINE_VERSION {
            return Err(StoreError::Config(format!(
                "engine version {version} is below the minimum supported {MIN_ENGINE_VERSION}; \
                 upgrade the backend"
            )));
        }

        let dataset = engine.open_dataset(&config.dataset_options()).await?;
        let id_field =
            if dataset.tensors().iter().any(|t| t == "ids") { "ids" } else { "id" }.to_string();

        info!(path = %config.dataset_path, %version, id_field = %id_field, "opened dataset");
        Ok(Self { config, engine, dataset, embedding, id_field })
    }

    /// Create a store at `config.dataset_path` and ingest `texts` in one
    /// step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the config's extra options carry
    /// the deprecated `embedding` key; pass the provider via the
    /// `embedding` argument instead.
    pub async fn from_texts(
        texts: &[&str],
        config: StoreConfig,
        engine: Arc<dyn VectorEngine>,
        embedding: Option<Arc<dyn EmbeddingProvider>>,
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<Self> {
        if config.extra.contains_key("embedding") {
            return Err(StoreError::Config(
                "the `embedding` option is deprecated; pass the embedding provider as the \
                 `embedding` argument"
                    .to_string(),
            ));
        }

        let store = Self::open(config, engine, embedding).await?;
        store.add_texts(texts, metadatas, ids).await?;
        Ok(store)
    }

    /// The configuration captured at construction.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The embedding provider configured at construction, if any.
    pub fn embedding_provider(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.embedding.as_ref()
    }

    /// The id field name resolved from the dataset at open time.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Embed `texts` and insert them into the dataset.
    ///
    /// `metadatas` defaults to one empty map per text. Returns the ids
    /// assigned to the new records, caller-provided or engine-generated,
    /// in input order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if no embedding provider is
    /// configured or if `metadatas`/`ids` lengths do not match `texts`.
    pub async fn add_texts(
        &self,
        texts: &[&str],
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>> {
        let metadatas = match metadatas {
            Some(metadatas) => {
                if metadatas.len() != texts.len() {
                    return Err(StoreError::InvalidArgument(format!(
                        "got {} metadatas for {} texts",
                        metadatas.len(),
                        texts.len()
                    )));
                }
                metadatas
            }
            None => (0..texts.len()).map(|_| Metadata::new()).collect(),
        };
        if let Some(ids) = &ids {
            if ids.len() != texts.len() {
                return Err(StoreError::InvalidArgument(format!(
                    "got {} ids for {} texts",
                    ids.len(),
                    texts.len()
                )));
            }
        }

        let provider = self.embedding.as_ref().ok_or_else(|| {
            StoreError::InvalidArgument(
                "an embedding provider is required to add texts".to_string(),
            )
        })?;
        let embeddings = provider.embed_documents(texts).await?;

        debug!(count = texts.len(), id_field = %self.id_field, "inserting texts");
        self.dataset
            .insert(InsertRequest {
                texts: texts.iter().map(|t| (*t).to_string()).collect(),
                metadatas,
                embeddings,
                id_field: self.id_field.clone(),
                ids,
            })
            .await
    }

    /// Execute a query in the backend's native query language and reshape
    /// the rows into documents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unsupported`] if `return_score` is set; the
    /// raw-query path has no per-row relevance scores.
    pub async fn raw_query_search(
        &self,
        raw_query: &str,
        exec_mode: Option<ExecMode>,
        return_score: bool,
    ) -> Result<Vec<Document>> {
        if return_score {
            return Err(StoreError::Unsupported(
                "scores cannot be returned for raw-query search".to_string(),
            ));
        }

        debug!(raw_query, "running raw query");
        let rows = self.dataset.query(raw_query, exec_mode).await?;
        let SearchRows { texts, metadatas, .. } = rows;
        Ok(texts
            .into_iter()
            .zip(metadatas)
            .map(|(text, metadata)| Document::new(text, metadata))
            .collect())
    }

    /// Return the documents most similar to a query text or embedding.
    ///
    /// Exactly one of `query` and `embedding` must be supplied. Results
    /// come back in engine order, each document's metadata enriched with
    /// an `"embedding"` key holding the record's stored vector.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if both or neither of
    /// `query` and `embedding` are given, or if only a query text is given
    /// and no embedding provider is available.
    pub async fn similarity_search(
        &self,
        query: Option<&str>,
        embedding: Option<QueryEmbedding>,
        options: SearchOptions,
    ) -> Result<Vec<Document>> {
        require_exactly_one(query.is_some(), embedding.is_some())?;
        let (documents, _) = self.search(query, embedding, &options, false).await?;
        Ok(documents)
    }

    /// Like [`similarity_search`](DatasetVectorStore::similarity_search),
    /// returning each document paired with its engine-reported score.
    ///
    /// # Errors
    ///
    /// In addition to the `similarity_search` errors, returns
    /// [`StoreError::Unsupported`] when `options.raw_query` is set.
    pub async fn similarity_search_with_score(
        &self,
        query: Option<&str>,
        embedding: Option<QueryEmbedding>,
        options: SearchOptions,
    ) -> Result<Vec<ScoredDocument>> {
        require_exactly_one(query.is_some(), embedding.is_some())?;
        let (documents, scores) = self.search(query, embedding, &options, true).await?;
        Ok(documents
            .into_iter()
            .zip(scores)
            .map(|(document, score)| ScoredDocument { document, score })
            .collect())
    }

    /// The shared search path behind the similarity entry points.
    ///
    /// Delegates to the raw-query path when `options.raw_query` is set;
    /// otherwise resolves an embedding (per-call provider override, then
    /// the construction provider) and runs the engine search.
    async fn search(
        &self,
        query: Option<&str>,
        embedding: Option<QueryEmbedding>,
        options: &SearchOptions,
        return_score: bool,
    ) -> Result<(Vec<Document>, Vec<f32>)> {
        if let Some(raw_query) = &options.raw_query {
            let documents =
                self.raw_query_search(raw_query, options.exec_mode, return_score).await?;
            return Ok((documents, Vec::new()));
        }

        let vector = match embedding {
            Some(embedding) => embedding.normalize()?,
            None => {
                let query = query.ok_or_else(|| {
                    StoreError::InvalidArgument(
                        "either a query text or an embedding must be supplied".to_string(),
                    )
                })?;
                let provider =
                    options.embedding_provider.as_ref().or(self.embedding.as_ref()).ok_or_else(
                        || {
                            StoreError::InvalidArgument(
                                "either an embedding or an embedding provider must be supplied"
                                    .to_string(),
                            )
                        },
                    )?;
                provider.embed_query(query).await?
            }
        };

        debug!(
            k = options.k,
            metric = %options.distance_metric,
            filtered = options.filter.is_some(),
            "running similarity search"
        );
        let rows = self
            .dataset
            .search(SearchRequest {
                embedding: vector,
                k: options.k,
                distance_metric: options.distance_metric,
                filter: options.filter.clone(),
                exec_mode: options.exec_mode,
                return_columns: ["text", "metadata", "embedding", "score"]
                    .iter()
                    .map(|c| (*c).to_string())
                    .collect(),
            })
            .await?;

        let SearchRows { texts, mut metadatas, scores, embeddings } = rows;
        for (metadata, vector) in metadatas.iter_mut().zip(embeddings) {
            metadata.insert(
                "embedding".to_string(),
                serde_json::to_value(vector).unwrap_or(Value::Null),
            );
        }

        let documents = texts
            .into_iter()
            .zip(metadatas)
            .map(|(text, metadata)| Document::new(text, metadata))
            .collect();
        Ok((documents, scores))
    }

    /// Delete records matching the given criteria.
    ///
    /// At least one criterion is expected, but enforcement is backend
    /// policy. Returns `true` on non-throwing completion.
    pub async fn delete(
        &self,
        ids: Option<Vec<String>>,
        filter: Option<Filter>,
        delete_all: bool,
    ) -> Result<bool> {
        self.dataset.delete(DeleteRequest { ids, filter, delete_all }).await?;
        Ok(true)
    }

    /// Delete every record in the currently open dataset.
    pub async fn delete_dataset(&self) -> Result<bool> {
        self.delete(None, None, true).await
    }

    /// Unconditionally destroy the dataset this store has open.
    ///
    /// Bypasses the open handle and removes the dataset at the configured
    /// path via the engine.
    pub async fn force_delete(&self) -> Result<()> {
        self.engine.force_delete(&self.config.dataset_path).await
    }

    /// Unconditionally destroy the dataset at `path`, without an open
    /// store instance.
    ///
    /// Idempotent on already-deleted paths.
    pub async fn force_delete_by_path(engine: &Arc<dyn VectorEngine>, path: &str) -> Result<()> {
        engine.force_delete(path).await
    }
}

fn require_exactly_one(has_query: bool, has_embedding: bool) -> Result<()> {
    if has_query == has_embedding {
        return Err(StoreError::InvalidArgument(
            "provide either a query text or a query embedding, but not both".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_flat_passes_through() {
        let vector = QueryEmbedding::Flat(vec![1.0, 2.0]).normalize().unwrap();
        assert_eq!(vector, vec![1.0, 2.0]);
    }

    #[test]
    fn normalize_batch_takes_first_row() {
        let vector = QueryEmbedding::Batch(vec![vec![1.0, 2.0], vec![3.0, 4.0]])
            .normalize()
            .unwrap();
        assert_eq!(vector, vec![1.0, 2.0]);
    }

    #[test]
    fn normalize_empty_batch_is_invalid() {
        let err = QueryEmbedding::Batch(Vec::new()).normalize().unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn exactly_one_argument_required() {
        assert!(require_exactly_one(true, false).is_ok());
        assert!(require_exactly_one(false, true).is_ok());
        assert!(require_exactly_one(true, true).is_err());
        assert!(require_exactly_one(false, false).is_err());
    }

    #[test]
    fn search_options_defaults() {
        let options = SearchOptions::default();
        assert_eq!(options.k, 4);
        assert_eq!(options.distance_metric, DistanceMetric::L2);
        assert!(options.filter.is_none());
        assert!(options.exec_mode.is_none());
        assert!(options.raw_query.is_none());
    }
}
