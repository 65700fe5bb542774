//! `harvest sync` orchestration.
//!
//! Validates the requested range before touching the network, makes sure
//! the target index exists, then runs either a single window or a month
//! backfill through the harvest driver and prints the summary.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use arxiv_harvest_core::months::describe;
use arxiv_harvest_core::{plan_months, HarvestWindow, MonthPlan, ValidationError};
use chrono::NaiveDate;

use crate::backfill::{BackfillRunner, BackfillSummary};
use crate::bulk::BulkIndexer;
use crate::checkpoint::Checkpoint;
use crate::config::{validate_index_name, Config, IndexConfig, MonthErrorPolicy};
use crate::elastic::EsClient;
use crate::harvest::{HarvestDriver, HarvestOptions};
use crate::oai::OaiClient;
use crate::progress::{HarvestProgressEvent, ProgressMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// One `YYYY-MM-DD..YYYY-MM-DD` window.
    Range { from: String, until: String },
    /// Inclusive `YYYY-MM` months, one window each.
    Backfill { start: String, end: String },
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Category prefixes given on the command line; empty means use config.
    pub categories: Vec<String>,
    pub cs_only: bool,
    pub index: Option<String>,
    pub progress: ProgressMode,
    pub continue_on_error: bool,
    pub resume: bool,
    pub dry_run: bool,
}

/// A validated harvest plan.
#[derive(Debug)]
pub enum Plan {
    Range(HarvestWindow),
    Months(MonthPlan),
}

pub fn plan(mode: &SyncMode, today: NaiveDate) -> Result<Plan, ValidationError> {
    match mode {
        SyncMode::Range { from, until } => Ok(Plan::Range(HarvestWindow::new(from, until, today)?)),
        SyncMode::Backfill { start, end } => Ok(Plan::Months(plan_months(start, end, today)?)),
    }
}

/// Command-line prefixes (plus `cs.` for `--cs-only`) replace the configured
/// ones; with neither, the configured list applies.
pub fn effective_categories(config: &Config, cli: &[String], cs_only: bool) -> Vec<String> {
    let mut prefixes: Vec<String> = cli.to_vec();
    if cs_only && !prefixes.iter().any(|p| p == "cs.") {
        prefixes.push("cs.".to_string());
    }
    if prefixes.is_empty() {
        prefixes = config.filter.category_prefixes.clone();
    }
    prefixes
}

fn target_index(config: &Config, opts: &SyncOptions) -> Result<IndexConfig> {
    match &opts.index {
        Some(name) => {
            validate_index_name(name)?;
            Ok(IndexConfig {
                name: name.clone(),
                schema: config.index.schema,
            })
        }
        None => Ok(config.index.clone()),
    }
}

/// Run `harvest sync`. Returns the number of documents submitted.
pub async fn run_sync(config: &Config, opts: &SyncOptions, today: NaiveDate) -> Result<u64> {
    let plan = plan(&opts.mode, today).context("invalid sync range")?;
    let index = target_index(config, opts)?;
    let categories = effective_categories(config, &opts.categories, opts.cs_only);
    if categories.iter().any(|p| p.is_empty()) {
        bail!("--category must not be empty");
    }

    let policy = if opts.continue_on_error {
        MonthErrorPolicy::Skip
    } else {
        config.backfill.on_month_error
    };
    if opts.resume && config.backfill.checkpoint_path.is_none() {
        bail!("--resume needs backfill.checkpoint_path in the config file");
    }

    if opts.dry_run {
        print_plan(plan, &index.name, &categories);
        return Ok(0);
    }

    let es = EsClient::new(&config.elasticsearch)?;
    let schema = index.effective_schema();
    if es
        .ensure_index(&index.name, schema)
        .await
        .with_context(|| format!("failed to prepare index '{}'", index.name))?
    {
        println!("Created index '{}' ({} schema)", index.name, schema.as_str());
    }

    let oai = OaiClient::new(&config.oai)?;
    let reporter = opts.progress.reporter();
    let driver = HarvestDriver::new(
        &oai,
        BulkIndexer::new(&es, &index.name),
        HarvestOptions {
            category_prefixes: categories,
            delay: Duration::from_millis(config.oai.delay_ms),
        },
        reporter.as_ref(),
    );

    match plan {
        Plan::Range(window) => {
            reporter.report(HarvestProgressEvent::WindowStarted {
                label: None,
                from: window.from_date().to_string(),
                until: window.until_date().to_string(),
            });
            let outcome = driver.run(&window).await?;
            println!("Done. Indexed {} papers into '{}'", outcome.total, index.name);
            Ok(outcome.total)
        }
        Plan::Months(months) => {
            let mut runner = BackfillRunner::new(&driver, policy);
            if let Some(path) = &config.backfill.checkpoint_path {
                let checkpoint = Checkpoint::load(path, &index.name)?;
                tracing::info!(
                    path = %checkpoint.path().display(),
                    completed = checkpoint.len(),
                    resume = opts.resume,
                    "loaded checkpoint"
                );
                runner = runner.with_checkpoint(checkpoint, opts.resume);
            }
            let summary = runner.run(months).await?;
            print_backfill_summary(&summary, &index.name);

            if !summary.failed.is_empty() {
                let labels: Vec<&str> = summary.failed.iter().map(|f| f.label.as_str()).collect();
                bail!(
                    "{} month(s) failed and were skipped: {}",
                    labels.len(),
                    labels.join(", ")
                );
            }
            Ok(summary.total)
        }
    }
}

fn print_plan(plan: Plan, index: &str, categories: &[String]) {
    println!("Dry run: would harvest into '{}'", index);
    let count = match plan {
        Plan::Range(window) => {
            println!("  {}", window);
            1
        }
        Plan::Months(months) => {
            let windows: Vec<_> = months.collect();
            println!("  {}", describe(&windows));
            for m in &windows {
                println!("  {}  {}", m.label, m.window);
            }
            windows.len()
        }
    };
    let cats = if categories.is_empty() {
        "all".to_string()
    } else {
        categories.join(", ")
    };
    println!("{} window(s); categories: {}", count, cats);
}

fn print_backfill_summary(summary: &BackfillSummary, index: &str) {
    if !summary.resumed.is_empty() || !summary.failed.is_empty() {
        println!(
            "Months: {} harvested, {} already done, {} failed",
            summary.harvested.len(),
            summary.resumed.len(),
            summary.failed.len()
        );
        for f in &summary.failed {
            println!("  {} [{}]: {}", f.label, f.stage, f.message);
        }
    }
    println!("Done. Indexed {} papers into '{}'", summary.total, index);
}
