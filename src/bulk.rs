//! Bulk indexer: one page of documents, one bulk call.

use anyhow::Result;
use arxiv_harvest_core::{BulkReport, DocumentSink, NormalizedDocument, UpsertAction};

/// Max per-item failures spelled out in the log for one batch.
const LOGGED_FAILURES: usize = 5;

pub struct BulkIndexer<'a> {
    sink: &'a dyn DocumentSink,
    index: String,
}

impl<'a> BulkIndexer<'a> {
    pub fn new(sink: &'a dyn DocumentSink, index: &str) -> Self {
        Self {
            sink,
            index: index.to_string(),
        }
    }

    /// Upsert `docs` keyed by id. An empty batch makes no call.
    ///
    /// Rejected documents are logged and returned in the report; only a batch
    /// that could not be delivered at all is an `Err`.
    pub async fn index(&self, docs: Vec<NormalizedDocument>) -> Result<BulkReport> {
        if docs.is_empty() {
            return Ok(BulkReport::default());
        }

        let actions: Vec<UpsertAction> = docs
            .into_iter()
            .map(|d| UpsertAction::new(&self.index, d))
            .collect();
        let report = self.sink.bulk_upsert(&actions).await?;

        if report.has_failures() {
            tracing::warn!(
                index = %self.index,
                submitted = report.submitted,
                rejected = report.failures.len(),
                "bulk batch partially rejected"
            );
            for f in report.failures.iter().take(LOGGED_FAILURES) {
                tracing::warn!(id = %f.id, status = f.status, reason = %f.reason, "document rejected");
            }
        }
        Ok(report)
    }
}
