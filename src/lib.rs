//! Dataset-backed vector document store.
//!
//! `vecstore` adapts a pluggable vector engine to a generic document-store
//! interface: open a dataset, ingest texts with embeddings, search by
//! similarity or in the backend's native query language, and delete
//! records. The engine owns indexing, distance computation, and
//! persistence; the adapter owns argument validation, embedding-function
//! resolution, result shaping, and id bookkeeping.
//!
//! # Architecture
//!
//! - [`DatasetVectorStore`] — the adapter and main entry point.
//! - [`EmbeddingProvider`] — turns text into vectors; implement it for
//!   your embedding backend, or use the `openai` feature.
//! - [`VectorEngine`] / [`engine::DatasetHandle`] — the backend contract.
//!   [`LocalVectorEngine`] is the in-process reference backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vecstore::{DatasetVectorStore, LocalVectorEngine, SearchOptions, StoreConfig};
//!
//! let engine = Arc::new(LocalVectorEngine::new());
//! let store = DatasetVectorStore::from_texts(
//!     &["the quick brown fox", "jumped over the lazy dog"],
//!     StoreConfig::at("./animals"),
//!     engine,
//!     Some(Arc::new(my_provider)),
//!     None,
//!     None,
//! )
//! .await?;
//!
//! let docs = store
//!     .similarity_search(Some("fox"), None, SearchOptions::default())
//!     .await?;
//! ```

pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod local;
#[cfg(feature = "openai")]
pub mod openai;
pub mod store;

pub use config::{StoreConfig, StoreConfigBuilder, DEFAULT_DATASET_PATH};
pub use document::{Document, Metadata, ScoredDocument};
pub use embedding::EmbeddingProvider;
pub use engine::{
    DatasetHandle, DatasetOptions, DeleteRequest, DistanceMetric, EngineVersion, ExecMode, Filter,
    InsertRequest, SearchRequest, SearchRows, VectorEngine, MIN_ENGINE_VERSION,
};
pub use error::{Result, StoreError};
pub use local::LocalVectorEngine;
pub use store::{DatasetVectorStore, QueryEmbedding, SearchOptions};
