//! # arxiv-harvest
//!
//! Harvests arXiv paper metadata over OAI-PMH and bulk-loads it into an
//! Elasticsearch index.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ OAI-PMH page │──▶│ parse+filter │──▶│ bulk indexer │──▶│ Elasticsearch │
//! │   fetcher    │   │    (core)    │   │              │   │     index     │
//! └──────▲───────┘   └──────────────┘   └──────────────┘   └───────────────┘
//!        │ resumptionToken
//!        └── harvest driver ◀── backfill runner (one window per month)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest init                                   # create the index
//! harvest sync --from 2026-01-01 --until 2026-01-31
//! harvest sync --start 2024-01 --end 2024-12 --cs-only
//! harvest indices
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`error`] | Fetch and harvest error types |
//! | [`oai`] | OAI-PMH `ListRecords` page fetcher |
//! | [`elastic`] | Elasticsearch REST client |
//! | [`schema`] | Index mappings |
//! | [`bulk`] | Bulk indexer |
//! | [`harvest`] | Per-window harvest driver |
//! | [`backfill`] | Month-by-month backfill runner |
//! | [`checkpoint`] | Resumable backfill state |
//! | [`progress`] | Progress reporting |
//! | [`ingest`] | `harvest sync` orchestration |
//! | [`indices`] | Index administration commands |
//!
//! Parsing, filtering and month planning live in `arxiv-harvest-core`.

pub mod backfill;
pub mod bulk;
pub mod checkpoint;
pub mod config;
pub mod elastic;
pub mod error;
pub mod harvest;
pub mod indices;
pub mod ingest;
pub mod logging;
pub mod oai;
pub mod progress;
pub mod schema;
