//! In-memory [`DocumentSink`] implementation for testing.
//!
//! Documents live in a `HashMap` keyed by `(index, id)` behind a
//! `std::sync::RwLock`, so repeated upserts overwrite exactly like the real
//! store. Specific ids can be configured to be rejected to exercise partial
//! batch failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::NormalizedDocument;

use super::{BulkReport, DocumentSink, ItemFailure, UpsertAction};

pub struct InMemorySink {
    docs: RwLock<HashMap<(String, String), NormalizedDocument>>,
    rejected_ids: HashSet<String>,
    calls: AtomicUsize,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            rejected_ids: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reject these ids with a mapping error instead of storing them.
    pub fn with_rejected_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Number of documents stored in `index`.
    pub fn count(&self, index: &str) -> usize {
        self.docs
            .read()
            .unwrap()
            .keys()
            .filter(|(i, _)| i == index)
            .count()
    }

    pub fn get(&self, index: &str, id: &str) -> Option<NormalizedDocument> {
        self.docs
            .read()
            .unwrap()
            .get(&(index.to_string(), id.to_string()))
            .cloned()
    }

    /// Sorted ids stored in `index`.
    pub fn ids(&self, index: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .docs
            .read()
            .unwrap()
            .keys()
            .filter(|(i, _)| i == index)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// How many bulk calls reached the sink.
    pub fn bulk_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSink for InMemorySink {
    async fn bulk_upsert(&self, actions: &[UpsertAction]) -> Result<BulkReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut failures = Vec::new();
        let mut docs = self.docs.write().unwrap();
        for action in actions {
            if self.rejected_ids.contains(&action.id) {
                failures.push(ItemFailure {
                    id: action.id.clone(),
                    status: 400,
                    reason: "document_parsing_exception: rejected by test sink".to_string(),
                });
                continue;
            }
            docs.insert(
                (action.index.clone(), action.id.clone()),
                action.source.clone(),
            );
        }

        Ok(BulkReport {
            submitted: actions.len(),
            failures,
        })
    }
}
