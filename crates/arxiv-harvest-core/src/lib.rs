//! # arxiv-harvest core
//!
//! Pure logic for the arXiv harvester: the normalized document model, a
//! namespace-aware XML element tree, OAI record parsing, date/category
//! filtering, calendar-month planning and the bulk sink abstraction.
//!
//! This crate contains no tokio, reqwest, or filesystem I/O. The HTTP
//! collaborators (OAI endpoint, Elasticsearch) live in the `arxiv-harvest`
//! package, which drives everything here.

pub mod filter;
pub mod models;
pub mod months;
pub mod record;
pub mod sink;
pub mod xml;

pub use models::{HarvestWindow, NormalizedDocument, ValidationError};
pub use months::{plan_months, MonthPlan, MonthWindow, YearMonth};
pub use record::{parse_record, RawRecord};
pub use sink::{BulkReport, DocumentSink, ItemFailure, UpsertAction};
