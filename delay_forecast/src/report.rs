//! Run bookkeeping: skipped units of work and per-stage summaries

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Pipeline stage a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Features,
    Filter,
    Train,
    Backtest,
    Score,
    Visualize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Features => "features",
            Stage::Filter => "filter",
            Stage::Train => "train",
            Stage::Backtest => "backtest",
            Stage::Score => "score",
            Stage::Visualize => "visualize",
        };
        f.write_str(name)
    }
}

/// One unit of work that was skipped instead of aborting the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub stage: Stage,
    /// File, airport or chart the skip applies to
    pub subject: String,
    pub model: Option<String>,
    pub reason: String,
}

impl SkipRecord {
    pub fn new(stage: Stage, subject: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            stage,
            subject: subject.into(),
            model: None,
            reason: reason.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl ToString) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Emit the skip as a warning
    pub fn log(&self) {
        match &self.model {
            Some(model) => warn!(
                stage = %self.stage,
                subject = %self.subject,
                model = %model,
                "skipped: {}",
                self.reason
            ),
            None => warn!(
                stage = %self.stage,
                subject = %self.subject,
                "skipped: {}",
                self.reason
            ),
        }
    }
}

/// What a stage produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,
    /// Units produced (rows, airports, charts...)
    pub produced: usize,
    pub skipped: usize,
    pub note: String,
}

/// Accumulated record of a pipeline run, persisted as `run_report.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub stages: Vec<StageSummary>,
    pub skipped: Vec<SkipRecord>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep every skip of a stage, then record its summary
    pub fn record_stage(
        &mut self,
        stage: Stage,
        produced: usize,
        skips: Vec<SkipRecord>,
        note: impl Into<String>,
    ) {
        for skip in &skips {
            skip.log();
        }
        self.stages.push(StageSummary {
            stage,
            produced,
            skipped: skips.len(),
            note: note.into(),
        });
        self.skipped.extend(skips);
    }

    pub fn skips_for(&self, stage: Stage) -> impl Iterator<Item = &SkipRecord> {
        self.skipped.iter().filter(move |s| s.stage == stage)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_stage_counts_skips() {
        let mut report = RunReport::new();
        report.record_stage(
            Stage::Train,
            10,
            vec![
                SkipRecord::new(Stage::Train, "LUTON", "too short").with_model("arima"),
                SkipRecord::new(Stage::Train, "CARDIFF", "too short"),
            ],
            "baseline",
        );

        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.stages[0].skipped, 2);
        assert_eq!(report.skips_for(Stage::Train).count(), 2);
        assert_eq!(report.skips_for(Stage::Features).count(), 0);
        assert_eq!(report.skipped[0].model.as_deref(), Some("arima"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("run_report.json");

        let mut report = RunReport::new();
        report.record_stage(
            Stage::Features,
            3,
            vec![SkipRecord::new(Stage::Features, "bad.csv", "missing column")],
            "",
        );
        report.save(&path).unwrap();

        assert_eq!(RunReport::load(&path).unwrap(), report);
    }
}
