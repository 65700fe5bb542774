//! Month-by-month backfill.
//!
//! Runs the harvest driver once per planned month, in order. What happens
//! when a month fails is decided by [`MonthErrorPolicy`]: `abort` stops the
//! whole backfill, `skip` logs the month, records it in the summary and
//! moves on. With a checkpoint, each month is recorded only after its window
//! was exhausted, and resumed runs skip recorded months.

use arxiv_harvest_core::MonthWindow;

use crate::checkpoint::Checkpoint;
use crate::config::MonthErrorPolicy;
use crate::error::HarvestError;
use crate::harvest::HarvestDriver;
use crate::progress::HarvestProgressEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthFailure {
    pub label: String,
    pub stage: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    /// `(label, submitted)` for every month harvested in this run.
    pub harvested: Vec<(String, u64)>,
    /// Months skipped because the checkpoint already had them.
    pub resumed: Vec<String>,
    pub failed: Vec<MonthFailure>,
    pub total: u64,
}

pub struct BackfillRunner<'a> {
    driver: &'a HarvestDriver<'a>,
    policy: MonthErrorPolicy,
    checkpoint: Option<Checkpoint>,
    resume: bool,
}

impl<'a> BackfillRunner<'a> {
    pub fn new(driver: &'a HarvestDriver<'a>, policy: MonthErrorPolicy) -> Self {
        Self {
            driver,
            policy,
            checkpoint: None,
            resume: false,
        }
    }

    /// Record completed months in `checkpoint`; skip those already in it
    /// when `resume` is set.
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint, resume: bool) -> Self {
        self.checkpoint = Some(checkpoint);
        self.resume = resume;
        self
    }

    pub async fn run<I>(mut self, plan: I) -> Result<BackfillSummary, HarvestError>
    where
        I: IntoIterator<Item = MonthWindow>,
    {
        let mut summary = BackfillSummary::default();
        let progress = self.driver.progress();

        for month in plan {
            if self.resume {
                let recorded = self.checkpoint.as_ref().and_then(|c| c.completed(&month.label));
                if let Some(done) = recorded.filter(|r| r.covers(month.until_date())) {
                    tracing::info!(month = %month.label, indexed = done.indexed, "already harvested");
                    progress.report(HarvestProgressEvent::MonthSkipped {
                        label: month.label.clone(),
                        reason: "already in checkpoint".to_string(),
                    });
                    summary.resumed.push(month.label);
                    continue;
                }
                if let Some(partial) = recorded {
                    tracing::info!(
                        month = %month.label,
                        harvested_until = %partial.until,
                        "month was only partly harvested, running it again"
                    );
                }
            }

            progress.report(HarvestProgressEvent::WindowStarted {
                label: Some(month.label.clone()),
                from: month.from_date().to_string(),
                until: month.until_date().to_string(),
            });

            match self.driver.run(&month.window).await {
                Ok(outcome) => {
                    summary.total += outcome.total;
                    if let Some(cp) = self.checkpoint.as_mut() {
                        cp.record(&month.label, month.until_date(), outcome.total)?;
                    }
                    summary.harvested.push((month.label, outcome.total));
                }
                Err(e) => match self.policy {
                    MonthErrorPolicy::Abort => {
                        return Err(HarvestError::Month {
                            label: month.label,
                            completed: summary.total,
                            source: Box::new(e),
                        });
                    }
                    MonthErrorPolicy::Skip => {
                        tracing::error!(
                            month = %month.label,
                            stage = e.stage(),
                            error = %e,
                            "month failed, continuing"
                        );
                        progress.report(HarvestProgressEvent::MonthSkipped {
                            label: month.label.clone(),
                            reason: e.to_string(),
                        });
                        summary.failed.push(MonthFailure {
                            label: month.label,
                            stage: e.stage(),
                            message: e.to_string(),
                        });
                    }
                },
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::BulkIndexer;
    use crate::error::FetchError;
    use crate::harvest::testing::ScriptedSource;
    use crate::harvest::HarvestOptions;
    use crate::oai::fixtures::record;
    use crate::progress::{NoProgress, RecordingProgress};
    use arxiv_harvest_core::plan_months;
    use arxiv_harvest_core::sink::memory::InMemorySink;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn plan(start: &str, end: &str) -> Vec<MonthWindow> {
        plan_at(start, end, today())
    }

    fn plan_at(start: &str, end: &str, today: NaiveDate) -> Vec<MonthWindow> {
        plan_months(start, end, today).unwrap().collect()
    }

    fn opts() -> HarvestOptions {
        HarvestOptions {
            category_prefixes: vec![],
            delay: Duration::ZERO,
        }
    }

    fn month_page(id: &str, created: &str) -> Result<crate::oai::Page, FetchError> {
        ScriptedSource::page(&record(id, created, "cs.DS"))
    }

    #[tokio::test]
    async fn runs_every_month_in_order() {
        let source = ScriptedSource::new(vec![
            month_page("2401.00001", "2024-01-10"),
            month_page("2402.00001", "2024-02-29"),
            month_page("2403.00001", "2024-03-31"),
        ]);
        let sink = InMemorySink::new();
        let progress = RecordingProgress::default();
        let driver = HarvestDriver::new(&source, BulkIndexer::new(&sink, "papers"), opts(), &progress);

        let summary = BackfillRunner::new(&driver, MonthErrorPolicy::Abort)
            .run(plan("2024-01", "2024-03"))
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.harvested.len(), 3);
        assert_eq!(
            source.windows(),
            vec![
                "2024-01-01..2024-01-31",
                "2024-02-01..2024-02-29",
                "2024-03-01..2024-03-31"
            ]
        );
        assert_eq!(sink.count("papers"), 3);
        assert!(progress.events().contains(&HarvestProgressEvent::WindowStarted {
            label: Some("2024-02".into()),
            from: "2024-02-01".into(),
            until: "2024-02-29".into(),
        }));
    }

    #[tokio::test]
    async fn abort_policy_stops_at_the_failed_month() {
        let source = ScriptedSource::new(vec![
            month_page("2401.00001", "2024-01-10"),
            Err(FetchError::Transport("HTTP 503".into())),
            month_page("2403.00001", "2024-03-31"),
        ]);
        let sink = InMemorySink::new();
        let driver = HarvestDriver::new(&source, BulkIndexer::new(&sink, "papers"), opts(), &NoProgress);

        let err = BackfillRunner::new(&driver, MonthErrorPolicy::Abort)
            .run(plan("2024-01", "2024-03"))
            .await
            .unwrap_err();

        match err {
            HarvestError::Month { label, completed, .. } => {
                assert_eq!(label, "2024-02");
                assert_eq!(completed, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(source.windows().len(), 2);
    }

    #[tokio::test]
    async fn skip_policy_continues_and_reports() {
        let source = ScriptedSource::new(vec![
            month_page("2401.00001", "2024-01-10"),
            Err(FetchError::Transport("HTTP 503".into())),
            month_page("2403.00001", "2024-03-31"),
        ]);
        let sink = InMemorySink::new();
        let driver = HarvestDriver::new(&source, BulkIndexer::new(&sink, "papers"), opts(), &NoProgress);

        let summary = BackfillRunner::new(&driver, MonthErrorPolicy::Skip)
            .run(plan("2024-01", "2024-03"))
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].label, "2024-02");
        assert_eq!(summary.failed[0].stage, "transport");
        assert_eq!(sink.count("papers"), 2);
    }

    #[tokio::test]
    async fn resume_skips_checkpointed_months() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp.json");
        let mut cp = Checkpoint::load(&path, "papers").unwrap();
        cp.record("2024-01", "2024-01-31", 7).unwrap();

        let source = ScriptedSource::new(vec![month_page("2402.00001", "2024-02-02")]);
        let sink = InMemorySink::new();
        let driver = HarvestDriver::new(&source, BulkIndexer::new(&sink, "papers"), opts(), &NoProgress);

        let summary = BackfillRunner::new(&driver, MonthErrorPolicy::Abort)
            .with_checkpoint(Checkpoint::load(&path, "papers").unwrap(), true)
            .run(plan("2024-01", "2024-02"))
            .await
            .unwrap();

        assert_eq!(summary.resumed, vec!["2024-01"]);
        assert_eq!(summary.harvested, vec![("2024-02".to_string(), 1)]);
        assert_eq!(source.windows(), vec!["2024-02-01..2024-02-29"]);

        let cp = Checkpoint::load(&path, "papers").unwrap();
        assert_eq!(cp.completed("2024-02").unwrap().indexed, 1);
    }

    #[tokio::test]
    async fn failed_month_is_not_checkpointed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp.json");

        let source = ScriptedSource::new(vec![
            Err(FetchError::Malformed("truncated".into())),
            month_page("2402.00001", "2024-02-02"),
        ]);
        let sink = InMemorySink::new();
        let driver = HarvestDriver::new(&source, BulkIndexer::new(&sink, "papers"), opts(), &NoProgress);

        BackfillRunner::new(&driver, MonthErrorPolicy::Skip)
            .with_checkpoint(Checkpoint::load(&path, "papers").unwrap(), false)
            .run(plan("2024-01", "2024-02"))
            .await
            .unwrap();

        let cp = Checkpoint::load(&path, "papers").unwrap();
        assert!(cp.completed("2024-01").is_none());
        assert!(cp.completed("2024-02").is_some());
    }

    #[tokio::test]
    async fn month_cut_short_by_today_is_harvested_again_on_resume() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp.json");
        let oct_17 = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let nov_05 = NaiveDate::from_ymd_opt(2026, 11, 5).unwrap();

        let source = ScriptedSource::new(vec![month_page("2610.00001", "2026-10-02")]);
        let sink = InMemorySink::new();
        let driver = HarvestDriver::new(&source, BulkIndexer::new(&sink, "papers"), opts(), &NoProgress);
        BackfillRunner::new(&driver, MonthErrorPolicy::Abort)
            .with_checkpoint(Checkpoint::load(&path, "papers").unwrap(), false)
            .run(plan_at("2026-10", "2026-12", oct_17))
            .await
            .unwrap();
        assert_eq!(source.windows(), vec!["2026-10-01..2026-10-17"]);

        let source = ScriptedSource::new(vec![
            month_page("2610.00002", "2026-10-25"),
            month_page("2611.00001", "2026-11-03"),
        ]);
        let driver = HarvestDriver::new(&source, BulkIndexer::new(&sink, "papers"), opts(), &NoProgress);
        let summary = BackfillRunner::new(&driver, MonthErrorPolicy::Abort)
            .with_checkpoint(Checkpoint::load(&path, "papers").unwrap(), true)
            .run(plan_at("2026-10", "2026-12", nov_05))
            .await
            .unwrap();

        assert!(summary.resumed.is_empty());
        assert_eq!(
            source.windows(),
            vec!["2026-10-01..2026-10-31", "2026-11-01..2026-11-05"]
        );
        let cp = Checkpoint::load(&path, "papers").unwrap();
        assert_eq!(cp.completed("2026-10").unwrap().until, "2026-10-31");
        assert_eq!(cp.completed("2026-11").unwrap().until, "2026-11-05");
    }
}
