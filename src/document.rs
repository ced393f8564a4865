//! Data types for documents produced by search.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key-value metadata attached to a stored record or returned document.
pub type Metadata = HashMap<String, Value>;

/// A unit of text content with metadata, produced by search.
///
/// Documents are immutable once constructed; search enriches the metadata
/// with an `"embedding"` key carrying the record's stored vector before
/// the document is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the record.
    pub page_content: String,
    /// Key-value metadata associated with the record.
    pub metadata: Metadata,
}

impl Document {
    /// Create a document from text content and metadata.
    pub fn new(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Self { page_content: page_content.into(), metadata }
    }
}

/// A retrieved [`Document`] paired with its relevance score.
///
/// Whether a higher or lower score is better depends on the distance
/// metric the search ran with; the adapter preserves engine order and
/// does not re-sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The retrieved document.
    pub document: Document,
    /// The score reported by the engine for this document.
    pub score: f32,
}
