//! In-process vector engine with JSON-on-disk dataset persistence.
//!
//! This module provides [`LocalVectorEngine`], a reference
//! [`VectorEngine`] that scans records in memory and persists each dataset
//! as a JSON file under its path. It is suitable for development, testing,
//! and small datasets; it only runs in [`ExecMode::Local`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::Metadata;
use crate::engine::{
    DatasetHandle, DatasetOptions, DeleteRequest, DistanceMetric, EngineVersion, ExecMode,
    InsertRequest, SearchRequest, SearchRows, VectorEngine,
};
use crate::error::{Result, StoreError};

const BACKEND: &str = "local";

/// The version this engine reports.
pub const LOCAL_ENGINE_VERSION: EngineVersion = EngineVersion::new(3, 7, 0);

/// The file each dataset is persisted to under its path.
const DATASET_FILE: &str = "dataset.json";

/// An in-process [`VectorEngine`] that persists datasets as JSON files.
///
/// Dataset state is cached per path, so two stores opened at the same
/// path share one dataset. Each open produces its own handle carrying
/// the requested `read_only`/`verbose` mode; a read-only open of an
/// already-open dataset still rejects writes.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use vecstore::{DatasetVectorStore, LocalVectorEngine, StoreConfig};
///
/// let engine = Arc::new(LocalVectorEngine::new());
/// let store = DatasetVectorStore::open(StoreConfig::at("./data"), engine, None).await?;
/// ```
#[derive(Debug, Default)]
pub struct LocalVectorEngine {
    datasets: RwLock<HashMap<String, Arc<DatasetState>>>,
}

impl LocalVectorEngine {
    /// Create a new engine with no open datasets.
    pub fn new() -> Self {
        Self::default()
    }
}

fn engine_err(message: impl Into<String>) -> StoreError {
    StoreError::Engine { backend: BACKEND.to_string(), message: message.into() }
}

fn io_err(context: &str, e: std::io::Error) -> StoreError {
    engine_err(format!("{context}: {e}"))
}

fn dataset_key(path: &str) -> String {
    path.trim_end_matches('/').to_string()
}

#[async_trait]
impl VectorEngine for LocalVectorEngine {
    fn version(&self) -> EngineVersion {
        LOCAL_ENGINE_VERSION
    }

    async fn open_dataset(&self, options: &DatasetOptions) -> Result<Arc<dyn DatasetHandle>> {
        if options.exec_mode != ExecMode::Local {
            return Err(StoreError::Unsupported(format!(
                "the local engine only supports the local execution mode, got {:?}",
                options.exec_mode
            )));
        }

        let key = dataset_key(&options.path);
        let mut datasets = self.datasets.write().await;
        let state = match datasets.get(&key) {
            Some(state) => Arc::clone(state),
            None => {
                let state = Arc::new(
                    DatasetState::open(Path::new(&options.path), options.read_only).await?,
                );
                datasets.insert(key, Arc::clone(&state));
                state
            }
        };

        Ok(Arc::new(LocalDataset {
            state,
            read_only: options.read_only,
            verbose: options.verbose,
        }) as Arc<dyn DatasetHandle>)
    }

    async fn force_delete(&self, path: &str) -> Result<()> {
        self.datasets.write().await.remove(&dataset_key(path));
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                info!(path, "destroyed dataset");
                Ok(())
            }
            // Destroying a dataset that is already gone succeeds.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("failed to remove dataset directory", e)),
        }
    }
}

/// One stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: String,
    text: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

/// The on-disk shape of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetFile {
    /// Which id column name this dataset was created with. Legacy
    /// datasets use `"ids"`, newer ones `"id"`.
    id_field: String,
    records: Vec<Record>,
}

/// Dataset state shared by every handle open at one path.
#[derive(Debug)]
struct DatasetState {
    path: PathBuf,
    id_field: String,
    records: RwLock<Vec<Record>>,
}

impl DatasetState {
    async fn open(path: &Path, read_only: bool) -> Result<Self> {
        let file = path.join(DATASET_FILE);
        let contents = match tokio::fs::read_to_string(&file).await {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_err("failed to read dataset file", e)),
        };

        let (id_field, records, created) = match contents {
            Some(contents) => {
                let data: DatasetFile = serde_json::from_str(&contents)
                    .map_err(|e| engine_err(format!("corrupt dataset file: {e}")))?;
                (data.id_field, data.records, false)
            }
            None if read_only => {
                return Err(engine_err(format!(
                    "dataset at {} does not exist and cannot be created read-only",
                    path.display()
                )));
            }
            None => {
                tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|e| io_err("failed to create dataset directory", e))?;
                ("id".to_string(), Vec::new(), true)
            }
        };

        debug!(path = %path.display(), records = records.len(), "opened local dataset");
        let state =
            Self { path: path.to_path_buf(), id_field, records: RwLock::new(records) };
        if created {
            state.persist(&[]).await?;
        }
        Ok(state)
    }

    async fn persist(&self, records: &[Record]) -> Result<()> {
        let data = DatasetFile { id_field: self.id_field.clone(), records: records.to_vec() };
        let contents = serde_json::to_string(&data)
            .map_err(|e| engine_err(format!("failed to serialize dataset: {e}")))?;
        tokio::fs::write(self.path.join(DATASET_FILE), contents)
            .await
            .map_err(|e| io_err("failed to write dataset file", e))
    }
}

/// One open view of a local dataset.
///
/// Carries the `read_only`/`verbose` mode of the open that produced it;
/// the record state itself is shared across all handles at the path.
#[derive(Debug)]
pub struct LocalDataset {
    state: Arc<DatasetState>,
    read_only: bool,
    verbose: bool,
}

impl LocalDataset {
    fn guard_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(engine_err("dataset is open read-only"));
        }
        Ok(())
    }

    fn summarize(&self, operation: &str, records: &[Record]) {
        if self.verbose {
            info!(
                path = %self.state.path.display(),
                operation,
                records = records.len(),
                "dataset summary"
            );
        }
    }
}

/// Score a stored embedding against the query under the given metric.
fn score(metric: DistanceMetric, stored: &[f32], query: &[f32]) -> f32 {
    match metric {
        DistanceMetric::L2 => stored
            .iter()
            .zip(query)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt(),
        DistanceMetric::L1 => stored.iter().zip(query).map(|(a, b)| (a - b).abs()).sum(),
        DistanceMetric::Max => stored
            .iter()
            .zip(query)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max),
        DistanceMetric::Cos => {
            let dot: f32 = stored.iter().zip(query).map(|(a, b)| a * b).sum();
            let norm_a: f32 = stored.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return 0.0;
            }
            dot / (norm_a * norm_b)
        }
        DistanceMetric::Dot => stored.iter().zip(query).map(|(a, b)| a * b).sum(),
    }
}

#[async_trait]
impl DatasetHandle for LocalDataset {
    fn tensors(&self) -> Vec<String> {
        vec![
            self.state.id_field.clone(),
            "text".to_string(),
            "metadata".to_string(),
            "embedding".to_string(),
        ]
    }

    async fn insert(&self, request: InsertRequest) -> Result<Vec<String>> {
        self.guard_writable()?;

        let count = request.texts.len();
        if request.metadatas.len() != count || request.embeddings.len() != count {
            return Err(engine_err(format!(
                "misaligned insert: {} texts, {} metadatas, {} embeddings",
                count,
                request.metadatas.len(),
                request.embeddings.len()
            )));
        }
        if let Some(ids) = &request.ids {
            if ids.len() != count {
                return Err(engine_err(format!(
                    "misaligned insert: {} texts, {} ids",
                    count,
                    ids.len()
                )));
            }
            if request.id_field != self.state.id_field {
                return Err(engine_err(format!(
                    "unknown tensor `{}`; this dataset stores ids under `{}`",
                    request.id_field, self.state.id_field
                )));
            }
        }

        let mut records = self.state.records.write().await;
        let dimensions =
            records.first().map(|r| r.embedding.len()).or(request.embeddings.first().map(Vec::len));
        if let Some(dimensions) = dimensions {
            if let Some(bad) = request.embeddings.iter().find(|e| e.len() != dimensions) {
                return Err(engine_err(format!(
                    "embedding dimensionality mismatch: expected {dimensions}, got {}",
                    bad.len()
                )));
            }
        }

        let ids: Vec<String> = match request.ids {
            Some(ids) => ids,
            None => (0..count).map(|_| Uuid::new_v4().to_string()).collect(),
        };

        let rows = request
            .texts
            .into_iter()
            .zip(request.metadatas)
            .zip(request.embeddings)
            .zip(ids.iter().cloned())
            .map(|(((text, metadata), embedding), id)| Record { id, text, metadata, embedding });
        records.extend(rows);

        self.state.persist(&records).await?;
        self.summarize("insert", &records);
        debug!(count, "inserted records");
        Ok(ids)
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchRows> {
        if let Some(mode) = request.exec_mode {
            if mode != ExecMode::Local {
                return Err(StoreError::Unsupported(format!(
                    "the local engine only supports the local execution mode, got {mode:?}"
                )));
            }
        }

        let records = self.state.records.read().await;
        if let Some(record) = records.first() {
            if record.embedding.len() != request.embedding.len() {
                return Err(engine_err(format!(
                    "query dimensionality {} does not match dataset dimensionality {}",
                    request.embedding.len(),
                    record.embedding.len()
                )));
            }
        }

        let mut scored: Vec<(&Record, f32)> = records
            .iter()
            .filter(|record| {
                request
                    .filter
                    .as_ref()
                    .map_or(true, |filter| filter.matches(&record.text, &record.metadata))
            })
            .map(|record| {
                (record, score(request.distance_metric, &record.embedding, &request.embedding))
            })
            .collect();
        scored.sort_by(|a, b| request.distance_metric.compare(a.1, b.1));
        scored.truncate(request.k);

        let mut rows = SearchRows::default();
        for (record, record_score) in scored {
            rows.texts.push(record.text.clone());
            rows.metadatas.push(record.metadata.clone());
            rows.scores.push(record_score);
            rows.embeddings.push(record.embedding.clone());
        }
        self.summarize("search", &records);
        Ok(rows)
    }

    async fn query(&self, _raw_query: &str, _exec_mode: Option<ExecMode>) -> Result<SearchRows> {
        Err(StoreError::Unsupported(
            "raw queries require the compute_engine or tensor_db execution modes".to_string(),
        ))
    }

    async fn delete(&self, request: DeleteRequest) -> Result<()> {
        self.guard_writable()?;
        if request.ids.is_none() && request.filter.is_none() && !request.delete_all {
            return Err(engine_err("no deletion criteria given"));
        }

        let mut records = self.state.records.write().await;
        let before = records.len();
        if request.delete_all {
            records.clear();
        } else {
            records.retain(|record| {
                let by_id = request
                    .ids
                    .as_ref()
                    .is_some_and(|ids| ids.iter().any(|id| *id == record.id));
                let by_filter = request
                    .filter
                    .as_ref()
                    .is_some_and(|filter| filter.matches(&record.text, &record.metadata));
                !(by_id || by_filter)
            });
        }

        self.state.persist(&records).await?;
        self.summarize("delete", &records);
        debug!(removed = before - records.len(), "deleted records");
        Ok(())
    }
}
