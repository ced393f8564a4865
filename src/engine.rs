//! The vector engine contract: traits and request/response types.
//!
//! The adapter in [`crate::store`] delegates all storage, indexing, and
//! distance computation to an engine behind these traits. A backend is
//! injected as an `Arc<dyn VectorEngine>`; opening a dataset yields an
//! `Arc<dyn DatasetHandle>` that the adapter calls for inserts, searches,
//! and deletes. [`crate::local::LocalVectorEngine`] is the in-process
//! reference backend.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Metadata;
use crate::error::Result;

/// The minimum engine version the adapter is compatible with.
///
/// [`crate::store::DatasetVectorStore::open`] rejects older backends with a
/// configuration error.
pub const MIN_ENGINE_VERSION: EngineVersion = EngineVersion::new(3, 6, 2);

/// A backend engine version, compared numerically field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineVersion {
    /// Major version component.
    pub major: u32,
    /// Minor version component.
    pub minor: u32,
    /// Patch version component.
    pub patch: u32,
}

impl EngineVersion {
    /// Create a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Where and how the engine executes a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// In-process execution on the client.
    #[default]
    Local,
    /// Native-accelerated execution on the client.
    ComputeEngine,
    /// Execution in a hosted managed service.
    TensorDb,
}

/// The distance function used to rank nearest neighbors.
///
/// For `L2`, `L1`, and `Max` a smaller score is closer; for `Cos` and
/// `Dot` a larger score is closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance.
    #[default]
    L2,
    /// Manhattan distance.
    L1,
    /// Chebyshev (L-infinity) distance.
    Max,
    /// Cosine similarity.
    Cos,
    /// Dot product.
    Dot,
}

impl DistanceMetric {
    /// Whether a larger score means a closer match under this metric.
    pub fn higher_is_closer(self) -> bool {
        matches!(self, DistanceMetric::Cos | DistanceMetric::Dot)
    }

    /// Order two scores from closest to farthest under this metric.
    pub fn compare(self, a: f32, b: f32) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        if self.higher_is_closer() {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceMetric::L2 => "L2",
            DistanceMetric::L1 => "L1",
            DistanceMetric::Max => "max",
            DistanceMetric::Cos => "cos",
            DistanceMetric::Dot => "dot",
        };
        f.write_str(name)
    }
}

/// A predicate applied to a record's text and metadata.
pub type FilterPredicate = Arc<dyn Fn(&str, &Metadata) -> bool + Send + Sync>;

/// A filter applied before the distance search.
#[derive(Clone)]
pub enum Filter {
    /// Key-value constraints on metadata fields, combined with AND
    /// semantics: a record matches only if every listed field equals the
    /// given value.
    Fields(HashMap<String, Value>),
    /// An arbitrary predicate over a record's text and metadata.
    Predicate(FilterPredicate),
}

impl Filter {
    /// Build a field filter from an iterator of key-value pairs.
    pub fn fields<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Filter::Fields(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wrap a predicate closure as a filter.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &Metadata) -> bool + Send + Sync + 'static,
    {
        Filter::Predicate(Arc::new(f))
    }

    /// Evaluate the filter against one record.
    pub fn matches(&self, text: &str, metadata: &Metadata) -> bool {
        match self {
            Filter::Fields(fields) => {
                fields.iter().all(|(key, value)| metadata.get(key) == Some(value))
            }
            Filter::Predicate(pred) => pred(text, metadata),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Options for opening or creating a dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetOptions {
    /// Filesystem path or backend URI locating the dataset.
    pub path: String,
    /// Access token for remote datasets, if the backend requires one.
    pub token: Option<String>,
    /// Open the dataset in read-only mode.
    pub read_only: bool,
    /// Execution mode for operations on this dataset.
    pub exec_mode: ExecMode,
    /// Print a dataset summary after each operation.
    pub verbose: bool,
    /// Worker count for parallel ingestion; interpreted by the backend.
    pub num_workers: usize,
    /// Batch size used when splitting ingestion work; interpreted by the
    /// backend.
    pub ingestion_batch_size: usize,
    /// Backend-specific options not modeled by this adapter.
    pub extra: HashMap<String, Value>,
}

/// A batch of records to insert into a dataset.
///
/// `texts`, `metadatas`, and `embeddings` are positionally aligned and of
/// equal length; `ids`, when present, is as well.
#[derive(Debug, Clone)]
pub struct InsertRequest {
    /// Text content, one entry per record.
    pub texts: Vec<String>,
    /// Metadata, one map per record.
    pub metadatas: Vec<Metadata>,
    /// Embedding vectors, one per record, all of equal dimensionality.
    pub embeddings: Vec<Vec<f32>>,
    /// The dataset's id field name as resolved at open time (`"ids"` on
    /// legacy datasets, `"id"` otherwise).
    pub id_field: String,
    /// Caller-supplied record ids; the engine generates ids when absent.
    pub ids: Option<Vec<String>>,
}

/// An embedding similarity search against a dataset.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The query embedding.
    pub embedding: Vec<f32>,
    /// Maximum number of results to return.
    pub k: usize,
    /// The distance function used to rank neighbors.
    pub distance_metric: DistanceMetric,
    /// Optional filter applied before the distance search.
    pub filter: Option<Filter>,
    /// Per-call execution mode override; `None` uses the dataset's mode.
    pub exec_mode: Option<ExecMode>,
    /// Columns the caller wants populated in the result rows.
    pub return_columns: Vec<String>,
}

/// Columnar search results.
///
/// All populated columns are positionally aligned: row `i` is described by
/// `texts[i]`, `metadatas[i]`, `scores[i]`, and `embeddings[i]`. Columns
/// the engine did not produce (for example scores on the raw-query path)
/// are empty.
#[derive(Debug, Clone, Default)]
pub struct SearchRows {
    /// Text content per row.
    pub texts: Vec<String>,
    /// Metadata per row.
    pub metadatas: Vec<Metadata>,
    /// Score per row, as computed by the engine's distance metric.
    pub scores: Vec<f32>,
    /// Stored embedding per row.
    pub embeddings: Vec<Vec<f32>>,
}

/// Criteria for deleting records from a dataset.
///
/// Which combinations are acceptable is backend policy; the adapter passes
/// the criteria through unchecked.
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    /// Delete the records with these ids.
    pub ids: Option<Vec<String>>,
    /// Delete the records matching this filter.
    pub filter: Option<Filter>,
    /// Delete every record in the dataset.
    pub delete_all: bool,
}

/// An opened dataset within a vector engine.
#[async_trait]
pub trait DatasetHandle: Send + Sync {
    /// The names of the columns (tensors) this dataset stores.
    fn tensors(&self) -> Vec<String>;

    /// Insert a batch of records and return their ids in input order.
    async fn insert(&self, request: InsertRequest) -> Result<Vec<String>>;

    /// Run an embedding similarity search.
    async fn search(&self, request: SearchRequest) -> Result<SearchRows>;

    /// Execute a query written in the backend's native query language.
    ///
    /// Rows come back without scores; the raw-query path has no notion of
    /// per-row relevance.
    async fn query(&self, raw_query: &str, exec_mode: Option<ExecMode>) -> Result<SearchRows>;

    /// Delete records matching the given criteria.
    async fn delete(&self, request: DeleteRequest) -> Result<()>;
}

impl std::fmt::Debug for dyn DatasetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetHandle")
            .field("tensors", &self.tensors())
            .finish()
    }
}

/// A vector engine backend capable of opening and destroying datasets.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    /// The backend's version, checked against [`MIN_ENGINE_VERSION`].
    fn version(&self) -> EngineVersion;

    /// Open the dataset at `options.path`, creating it if absent.
    async fn open_dataset(&self, options: &DatasetOptions) -> Result<Arc<dyn DatasetHandle>>;

    /// Unconditionally destroy the dataset at `path`.
    ///
    /// Idempotent: destroying an already-deleted path succeeds.
    async fn force_delete(&self, path: &str) -> Result<()>;
}
