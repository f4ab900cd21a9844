//! Ledger store abstraction.
//!
//! The underlying document database is an external collaborator; this module
//! only pins down the contract the core consumes: point get/put, partial
//! update with server-side merge, and ordered prefix-range queries with one
//! secondary index over `material_id`.

use serde_json::{Map, Value};
use thiserror::Error;

pub mod keys;
pub mod memory;

pub use memory::MemoryLedgerStore;

/// A stored record. Top-level keys are attribute names.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Conditional write failed for {partition_key}/{sort_key}")]
    ConditionFailed {
        partition_key: String,
        sort_key: String,
    },
    #[error("Store operation failed: {0}")]
    OperationFailed(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Secondary indexes the core may query through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexName {
    /// Transactions indexed by their `material_id` attribute, across locations.
    Material,
}

/// Options for [`LedgerStore::query_prefix`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    pub descending: bool,
    pub index: Option<IndexName>,
}

impl QueryOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn descending() -> Self {
        Self {
            descending: true,
            ..Self::default()
        }
    }

    pub fn on_index(index: IndexName) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }
}

/// Key-value contract consumed by the inventory core.
///
/// `update` merges the given fields into the stored document and creates the
/// document when absent, mirroring the upsert behavior of managed document
/// stores. Callers that require merge-into-existing must check existence
/// first.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Full overwrite of one record.
    async fn put(
        &self,
        partition_key: &str,
        sort_key: &str,
        record: Document,
    ) -> Result<(), StoreError>;

    /// Partial field update with server-side merge; returns the merged record.
    async fn update(
        &self,
        partition_key: &str,
        sort_key: &str,
        delta: Document,
    ) -> Result<Document, StoreError>;

    /// Records under `partition_key` whose sort key starts with
    /// `sort_key_prefix`, ordered by sort key. With `IndexName::Material`,
    /// `partition_key` is interpreted as a material id and the scan runs over
    /// the secondary index instead of the base table.
    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
        options: QueryOptions,
    ) -> Result<Vec<Document>, StoreError>;
}

/// Serializes a value into a [`Document`].
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::OperationFailed(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserializes a [`Document`] back into a typed record.
pub fn from_document<T: serde::de::DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
