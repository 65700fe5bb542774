//! Harvest progress reporting.
//!
//! Reports one line per window and one per page so a long backfill shows
//! where it is. Progress is emitted on **stderr** so stdout stays reserved
//! for the final summary and command output.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarvestProgressEvent {
    /// A window is about to be harvested. `label` is the month for backfills.
    WindowStarted {
        label: Option<String>,
        from: String,
        until: String,
    },
    /// A page was filtered and indexed.
    Page {
        page: u32,
        added: usize,
        failed: usize,
        total: u64,
    },
    /// A month was not harvested (already checkpointed, or failed and skipped).
    MonthSkipped { label: String, reason: String },
}

/// Receives progress events from the harvest driver and backfill runner.
pub trait HarvestProgressReporter: Send + Sync {
    fn report(&self, event: HarvestProgressEvent);
}

/// Human-friendly progress on stderr:
/// `>> 2024-01 (2024-01-01..2024-01-31)` then `  p3: +812 (total 2,411)`.
pub struct StderrProgress;

impl StderrProgress {
    fn line(event: &HarvestProgressEvent) -> String {
        match event {
            HarvestProgressEvent::WindowStarted {
                label: Some(label),
                from,
                until,
            } => format!(">> {} ({}..{})\n", label, from, until),
            HarvestProgressEvent::WindowStarted {
                label: None,
                from,
                until,
            } => format!(">> {}..{}\n", from, until),
            HarvestProgressEvent::Page {
                page,
                added,
                failed,
                total,
            } => {
                let mut line = format!(
                    "  p{}: +{} (total {})",
                    page,
                    format_number(*added as u64),
                    format_number(*total)
                );
                if *failed > 0 {
                    line.push_str(&format!(" [{} rejected]", format_number(*failed as u64)));
                }
                line.push('\n');
                line
            }
            HarvestProgressEvent::MonthSkipped { label, reason } => {
                format!(">> {} skipped: {}\n", label, reason)
            }
        }
    }
}

impl HarvestProgressReporter for StderrProgress {
    fn report(&self, event: HarvestProgressEvent) {
        let line = Self::line(&event);
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn value(event: &HarvestProgressEvent) -> serde_json::Value {
        match event {
            HarvestProgressEvent::WindowStarted { label, from, until } => serde_json::json!({
                "event": "window",
                "label": label,
                "from": from,
                "until": until
            }),
            HarvestProgressEvent::Page {
                page,
                added,
                failed,
                total,
            } => serde_json::json!({
                "event": "page",
                "page": page,
                "added": added,
                "failed": failed,
                "total": total
            }),
            HarvestProgressEvent::MonthSkipped { label, reason } => serde_json::json!({
                "event": "skipped",
                "label": label,
                "reason": reason
            }),
        }
    }
}

impl HarvestProgressReporter for JsonProgress {
    fn report(&self, event: HarvestProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::value(&event)) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter for `--quiet`.
pub struct NoProgress;

impl HarvestProgressReporter for NoProgress {
    fn report(&self, _event: HarvestProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    pub fn reporter(&self) -> Box<dyn HarvestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

/// Collects events in memory; used by driver and backfill tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingProgress {
    pub events: std::sync::Mutex<Vec<HarvestProgressEvent>>,
}

#[cfg(test)]
impl RecordingProgress {
    pub fn events(&self) -> Vec<HarvestProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl HarvestProgressReporter for RecordingProgress {
    fn report(&self, event: HarvestProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
