//! Bulk write abstraction for the document store.
//!
//! The [`DocumentSink`] trait is the only thing the pipeline knows about the
//! store: submit a batch of upserts keyed by document id and get back a
//! per-item failure report. The Elasticsearch client in the `arxiv-harvest`
//! package implements it; [`memory::InMemorySink`] backs the tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::NormalizedDocument;

/// Insert-or-overwrite of one document in a named collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertAction {
    pub index: String,
    pub id: String,
    pub source: NormalizedDocument,
}

impl UpsertAction {
    pub fn new(index: &str, doc: NormalizedDocument) -> Self {
        Self {
            index: index.to_string(),
            id: doc.id.clone(),
            source: doc,
        }
    }
}

/// A document the store refused inside an otherwise delivered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub status: u16,
    pub reason: String,
}

/// Outcome of one bulk call.
///
/// `submitted` is the attempted batch size; exact success counts come from
/// subtracting `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub submitted: usize,
    pub failures: Vec<ItemFailure>,
}

impl BulkReport {
    pub fn succeeded(&self) -> usize {
        self.submitted.saturating_sub(self.failures.len())
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// A store that accepts batched upserts.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Submit all actions in one call.
    ///
    /// Per-item rejections are returned in the report. An `Err` means the
    /// batch as a whole could not be delivered.
    async fn bulk_upsert(&self, actions: &[UpsertAction]) -> Result<BulkReport>;
}
