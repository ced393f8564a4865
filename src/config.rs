//! Store configuration.
//!
//! [`StoreConfig`] replaces ad-hoc keyword passthrough with an explicit
//! structure enumerating every recognized option and its default. Options
//! the adapter does not model are carried in `extra` and handed to the
//! backend untouched.

use std::collections::HashMap;

use serde_json::Value;

use crate::engine::{DatasetOptions, ExecMode};
use crate::error::{Result, StoreError};

/// The default location for a dataset when none is given.
pub const DEFAULT_DATASET_PATH: &str = "./vecstore/";

/// Configuration captured at store construction.
///
/// Read-only after construction; safe to share across calls.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to an existing dataset, or where to create a new one.
    pub dataset_path: String,
    /// Access token for remote datasets.
    pub token: Option<String>,
    /// Open the dataset in read-only mode.
    pub read_only: bool,
    /// Batch size used when splitting ingestion work.
    pub ingestion_batch_size: usize,
    /// Worker count for parallel ingestion; `0` disables parallelism.
    pub num_workers: usize,
    /// Print a dataset summary after each operation.
    pub verbose: bool,
    /// Execution mode for engine operations.
    pub exec_mode: ExecMode,
    /// Backend-specific options passed through to the engine.
    pub extra: HashMap<String, Value>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dataset_path: DEFAULT_DATASET_PATH.to_string(),
            token: None,
            read_only: false,
            ingestion_batch_size: 1000,
            num_workers: 0,
            verbose: true,
            exec_mode: ExecMode::default(),
            extra: HashMap::new(),
        }
    }
}

impl StoreConfig {
    /// Create a new builder for constructing a [`StoreConfig`].
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Create a config for the dataset at `path` with all other options at
    /// their defaults.
    pub fn at(path: impl Into<String>) -> Self {
        Self { dataset_path: path.into(), ..Self::default() }
    }

    /// The options handed to the engine when opening the dataset.
    pub fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            path: self.dataset_path.clone(),
            token: self.token.clone(),
            read_only: self.read_only,
            exec_mode: self.exec_mode,
            verbose: self.verbose,
            num_workers: self.num_workers,
            ingestion_batch_size: self.ingestion_batch_size,
            extra: self.extra.clone(),
        }
    }
}

/// Builder for constructing a validated [`StoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the dataset location.
    pub fn dataset_path(mut self, path: impl Into<String>) -> Self {
        self.config.dataset_path = path.into();
        self
    }

    /// Set the access token for remote datasets.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Open the dataset in read-only mode.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the ingestion batch size.
    pub fn ingestion_batch_size(mut self, size: usize) -> Self {
        self.config.ingestion_batch_size = size;
        self
    }

    /// Set the worker count for parallel ingestion.
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    /// Enable or disable per-operation dataset summaries.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Set the execution mode.
    pub fn exec_mode(mut self, mode: ExecMode) -> Self {
        self.config.exec_mode = mode;
        self
    }

    /// Add a backend-specific option passed through to the engine.
    pub fn extra_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.extra.insert(key.into(), value);
        self
    }

    /// Build the [`StoreConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if:
    /// - `dataset_path` is empty
    /// - `ingestion_batch_size == 0`
    pub fn build(self) -> Result<StoreConfig> {
        if self.config.dataset_path.is_empty() {
            return Err(StoreError::Config("dataset_path must not be empty".to_string()));
        }
        if self.config.ingestion_batch_size == 0 {
            return Err(StoreError::Config(
                "ingestion_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}
