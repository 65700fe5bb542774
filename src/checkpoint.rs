//! Backfill checkpoints.
//!
//! A small JSON file listing the months that were harvested to exhaustion,
//! with the last day each one covered and the count it submitted. `--resume`
//! skips months found here, unless the recorded window stopped short of the
//! month's window in the current plan (a month that was clamped to "today").
//! The file is rewritten after every completed month, through a temporary
//! file and a rename so an interrupted write never leaves it truncated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct CheckpointFile {
    index: String,
    #[serde(default)]
    months: BTreeMap<String, MonthRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthRecord {
    /// Last day of the harvested window (`YYYY-MM-DD`).
    pub until: String,
    pub indexed: u64,
    pub completed_at: DateTime<Utc>,
}

impl MonthRecord {
    /// Whether the recorded window reaches `until`.
    pub fn covers(&self, until: &str) -> bool {
        self.until.as_str() >= until
    }
}

pub struct Checkpoint {
    path: PathBuf,
    state: CheckpointFile,
}

impl Checkpoint {
    /// Load `path`, or start empty if it does not exist yet.
    ///
    /// A checkpoint written for another index is refused; resuming from it
    /// would skip months that were never loaded into this one.
    pub fn load(path: &Path, index: &str) -> Result<Self, HarvestError> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                HarvestError::Checkpoint(format!("failed to read {}: {}", path.display(), e))
            })?;
            let state: CheckpointFile = serde_json::from_str(&raw).map_err(|e| {
                HarvestError::Checkpoint(format!("failed to parse {}: {}", path.display(), e))
            })?;
            if state.index != index {
                return Err(HarvestError::Checkpoint(format!(
                    "{} belongs to index '{}', not '{}'",
                    path.display(),
                    state.index,
                    index
                )));
            }
            state
        } else {
            CheckpointFile {
                index: index.to_string(),
                months: BTreeMap::new(),
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn completed(&self, label: &str) -> Option<&MonthRecord> {
        self.state.months.get(label)
    }

    pub fn len(&self) -> usize {
        self.state.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.months.is_empty()
    }

    /// Record `label` as harvested through `until` and persist immediately.
    pub fn record(&mut self, label: &str, until: &str, indexed: u64) -> Result<(), HarvestError> {
        self.state.months.insert(
            label.to_string(),
            MonthRecord {
                until: until.to_string(),
                indexed,
                completed_at: Utc::now(),
            },
        );
        self.save()
    }

    fn save(&self) -> Result<(), HarvestError> {
        let err = |what: &str, e: std::io::Error| {
            HarvestError::Checkpoint(format!("failed to {} {}: {}", what, self.path.display(), e))
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| err("create directory for", e))?;
        }
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| HarvestError::Checkpoint(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| err("write", e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| err("replace", e))?;
        Ok(())
    }
}
