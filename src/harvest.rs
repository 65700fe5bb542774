//! Harvest driver: pages through one window until the server stops issuing
//! continuation tokens.
//!
//! ```text
//! FETCHING ──ok──▶ FILTERING ──▶ INDEXING ──token──▶ WAITING ──delay──▶ FETCHING
//!    │                              │
//!    └──err──▶ FAILED               └──no token──▶ DONE
//! ```
//!
//! Pages are strictly sequential; the only suspension points are the two
//! network calls and the politeness delay.

use std::time::Duration;

use arxiv_harvest_core::filter::filter_documents;
use arxiv_harvest_core::{parse_record, HarvestWindow, NormalizedDocument};

use crate::bulk::BulkIndexer;
use crate::error::{FetchError, HarvestError};
use crate::oai::{Page, PageSource};
use crate::progress::{HarvestProgressEvent, HarvestProgressReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Fetching,
    Filtering,
    Indexing,
    Waiting,
    Done,
    Failed,
}

enum Step {
    Fetching,
    Filtering(Page),
    Indexing(Vec<NormalizedDocument>),
    Waiting,
    Done,
    Failed(FetchError),
}

impl Step {
    fn state(&self) -> DriverState {
        match self {
            Step::Fetching => DriverState::Fetching,
            Step::Filtering(_) => DriverState::Filtering,
            Step::Indexing(_) => DriverState::Indexing,
            Step::Waiting => DriverState::Waiting,
            Step::Done => DriverState::Done,
            Step::Failed(_) => DriverState::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub category_prefixes: Vec<String>,
    /// Pause between pages.
    pub delay: Duration,
}

/// What one window produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Documents submitted to the store (attempted, not necessarily accepted).
    pub total: u64,
    pub pages: u32,
    pub rejected: u64,
    /// Records that parsed to no document.
    pub unparsed: u64,
}

pub struct HarvestDriver<'a> {
    source: &'a dyn PageSource,
    indexer: BulkIndexer<'a>,
    options: HarvestOptions,
    progress: &'a dyn HarvestProgressReporter,
}

impl<'a> HarvestDriver<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        indexer: BulkIndexer<'a>,
        options: HarvestOptions,
        progress: &'a dyn HarvestProgressReporter,
    ) -> Self {
        Self {
            source,
            indexer,
            options,
            progress,
        }
    }

    pub fn progress(&self) -> &dyn HarvestProgressReporter {
        self.progress
    }

    /// Harvest `window` to exhaustion.
    ///
    /// A fetch failure ends in FAILED and is returned with the page number
    /// and the count submitted so far. A bulk request that cannot be
    /// delivered is returned as [`HarvestError::Index`].
    pub async fn run(&self, window: &HarvestWindow) -> Result<WindowOutcome, HarvestError> {
        let mut outcome = WindowOutcome::default();
        let mut token: Option<String> = None;
        let mut step = Step::Fetching;

        loop {
            tracing::trace!(state = ?step.state(), page = outcome.pages, "driver step");
            step = match step {
                Step::Fetching => {
                    outcome.pages += 1;
                    match self.source.fetch_page(window, token.as_deref()).await {
                        Ok(page) => Step::Filtering(page),
                        Err(e) => Step::Failed(e),
                    }
                }
                Step::Filtering(page) => {
                    token = page.next_token;
                    let mut parsed = Vec::with_capacity(page.records.len());
                    for record in &page.records {
                        match parse_record(record) {
                            Some(doc) => parsed.push(doc),
                            None => {
                                outcome.unparsed += 1;
                                tracing::debug!(
                                    identifier = record.identifier().unwrap_or("?"),
                                    "record has no usable arXiv id"
                                );
                            }
                        }
                    }
                    Step::Indexing(filter_documents(
                        parsed,
                        window,
                        &self.options.category_prefixes,
                    ))
                }
                Step::Indexing(docs) => {
                    let added = docs.len();
                    let report = self.indexer.index(docs).await.map_err(HarvestError::Index)?;
                    outcome.total += report.submitted as u64;
                    outcome.rejected += report.failures.len() as u64;

                    self.progress.report(HarvestProgressEvent::Page {
                        page: outcome.pages,
                        added,
                        failed: report.failures.len(),
                        total: outcome.total,
                    });

                    if token.is_some() {
                        Step::Waiting
                    } else {
                        Step::Done
                    }
                }
                Step::Waiting => {
                    if !self.options.delay.is_zero() {
                        tokio::time::sleep(self.options.delay).await;
                    }
                    Step::Fetching
                }
                Step::Done => {
                    tracing::info!(
                        window = %window,
                        pages = outcome.pages,
                        total = outcome.total,
                        rejected = outcome.rejected,
                        unparsed = outcome.unparsed,
                        "window exhausted"
                    );
                    return Ok(outcome);
                }
                Step::Failed(source) => {
                    tracing::error!(
                        window = %window,
                        page = outcome.pages,
                        indexed = outcome.total,
                        stage = source.stage(),
                        error = %source,
                        "page fetch failed"
                    );
                    return Err(HarvestError::Page {
                        page: outcome.pages,
                        indexed: outcome.total,
                        source,
                    });
                }
            };
        }
    }
}
