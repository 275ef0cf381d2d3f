//! Stage orchestration
//!
//! Each stage reads the artifacts of the stage before it from disk and writes
//! its own, so stages can also be run one at a time.

use crate::backtest::{BacktestOutcome, Backtester, FoldPrediction};
use crate::config::PipelineConfig;
use crate::data::{read_csv, CleanedDataset, RawLoader};
use crate::error::{ForecastError, Result};
use crate::features::FeatureBuilder;
use crate::filter::{FilterOutcome, HistoryFilter};
use crate::models::arima::ArimaSelector;
use crate::models::baseline::NaiveBaseline;
use crate::models::gradient_boosting::GradientBoostingTrainer;
use crate::models::{FittedModel, TrainedForecastModel, Trainer};
use crate::report::{RunReport, SkipRecord, Stage};
use crate::scores::ScoreTable;
use crate::serving::{load_forecasts, save_forecasts, ForecastResult};
use crate::visualization::{ChartInputs, ChartOutcome, VisualizationGenerator};
use crate::MAX_HORIZON;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Fitted models of the final training run, keyed by airport then model kind
#[derive(Debug, Serialize)]
struct ModelArtifacts<'a> {
    models: BTreeMap<&'a str, BTreeMap<&'static str, &'a FittedModel>>,
}

/// Runs the stages against one configuration and collects a [`RunReport`]
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    report: RunReport,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            report: RunReport::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// The three model families, configured
    pub fn trainers(&self) -> Result<Vec<Trainer>> {
        Ok(vec![
            Trainer::Baseline(NaiveBaseline::new()),
            Trainer::Arima(ArimaSelector::from_config(&self.config.arima)?),
            Trainer::GradientBoosting(GradientBoostingTrainer::new(
                self.config.gradient_boosting.clone(),
            )?),
        ])
    }

    /// Raw reports into `airport_month_features_clean.csv`
    pub fn build_features(&mut self) -> Result<CleanedDataset> {
        let paths = &self.config.paths;
        let loaded = RawLoader::new(self.config.features.header_row).load_dir(&paths.raw_dir)?;
        if loaded.records.is_empty() {
            self.report
                .record_stage(Stage::Features, 0, loaded.skipped, "no usable rows");
            return Err(ForecastError::Systemic(format!(
                "No usable rows in {} ({} files skipped)",
                paths.raw_dir.display(),
                self.report.skips_for(Stage::Features).count()
            )));
        }

        let built = FeatureBuilder::new(self.config.features.max_interpolated_gap).build(&loaded.records)?;
        built.dataset.save(&paths.cleaned_dataset())?;

        let note = format!(
            "{} files, {} rows dropped, {} aggregates removed, {} duplicates, {} interpolated",
            loaded.files_loaded,
            loaded.rows_dropped,
            loaded.aggregates_removed,
            built.duplicates_dropped,
            built.interpolated_rows
        );
        self.report
            .record_stage(Stage::Features, built.dataset.len(), loaded.skipped, note);
        Ok(built.dataset)
    }

    /// Cleaned dataset into the filtered dataset and exclusion list
    pub fn filter_history(&mut self) -> Result<FilterOutcome> {
        let paths = &self.config.paths;
        let cleaned = CleanedDataset::load(&paths.cleaned_dataset())?;
        if cleaned.is_empty() {
            return Err(ForecastError::Systemic(
                "Cleaned dataset is empty; rebuild features first".to_string(),
            ));
        }

        let outcome = HistoryFilter::new(self.config.filter.min_history_months).apply(&cleaned)?;
        outcome.save(&paths.filtered_dataset(), &paths.excluded_airports())?;

        let note = format!(
            "{} eligible, {} excluded",
            outcome.eligible().len(),
            outcome.excluded.len()
        );
        self.report
            .record_stage(Stage::Filter, outcome.dataset.len(), Vec::new(), note);
        Ok(outcome)
    }

    fn filtered(&self) -> Result<CleanedDataset> {
        let dataset = CleanedDataset::load(&self.config.paths.filtered_dataset())?;
        if dataset.is_empty() {
            return Err(ForecastError::Systemic(
                "Filtered dataset is empty; no airport has enough history".to_string(),
            ));
        }
        Ok(dataset)
    }

    /// Fit every model on each eligible airport's full history and forecast
    /// horizons 1..3
    pub fn train(&mut self) -> Result<Vec<ForecastResult>> {
        let dataset = self.filtered()?;
        let series = dataset.all_series();
        let paths = &self.config.paths;

        let mut forecasts = Vec::new();
        let mut skipped = Vec::new();
        let mut fitted: Vec<(String, FittedModel)> = Vec::new();

        // a booster from an earlier run must not outlive a failed pooled fit
        remove_stale(&paths.booster())?;
        for trainer in self.trainers()? {
            let outcome = trainer.fit_all(&series, Stage::Train);
            skipped.extend(outcome.skipped);
            if let Some(booster) = &outcome.booster {
                booster.save(&paths.booster())?;
            }

            for (airport, model) in outcome.models {
                match forecast_results(&airport, &model) {
                    Ok(results) => forecasts.extend(results),
                    Err(e) => {
                        skipped.push(SkipRecord::new(Stage::Train, airport.as_str(), e).with_model(model.kind()));
                        continue;
                    }
                }
                fitted.push((airport, model));
            }
        }

        forecasts.sort_by(|a, b| {
            a.airport
                .cmp(&b.airport)
                .then(a.model.cmp(&b.model))
                .then(a.horizon.cmp(&b.horizon))
        });
        save_forecasts(&paths.forecasts(), &forecasts)?;

        let mut artifacts = ModelArtifacts {
            models: BTreeMap::new(),
        };
        for (airport, model) in &fitted {
            artifacts
                .models
                .entry(airport.as_str())
                .or_default()
                .insert(model.kind().as_str(), model);
        }
        fs::write(&paths.model_artifacts(), serde_json::to_string_pretty(&artifacts)?)?;

        let note = format!("{} fitted models over {} airports", fitted.len(), series.len());
        self.report
            .record_stage(Stage::Train, forecasts.len(), skipped, note);
        Ok(forecasts)
    }

    /// Rolling-origin evaluation of every model on the filtered dataset
    pub fn backtest(&mut self) -> Result<BacktestOutcome> {
        let dataset = self.filtered()?;
        let trainers = self.trainers()?;
        let backtester =
            Backtester::new(self.config.backtest.min_train_months, self.config.backtest.max_origins);

        let mut outcome = backtester.run(&dataset, &trainers)?;
        let paths = &self.config.paths;
        outcome.save(&paths.backtest_predictions(), &paths.backtest_exclusions())?;

        let skipped = std::mem::take(&mut outcome.skipped);
        let note = format!(
            "{} origins, {} airports without an evaluable fold",
            outcome.origins.len(),
            outcome.excluded.len()
        );
        self.report
            .record_stage(Stage::Backtest, outcome.predictions.len(), skipped, note);
        Ok(outcome)
    }

    /// Backtest predictions into MAE tables and best-model picks
    pub fn score(&mut self) -> Result<ScoreTable> {
        let paths = &self.config.paths;
        let predictions: Vec<FoldPrediction> = read_csv(&paths.backtest_predictions())?;
        let table = ScoreTable::from_predictions(&predictions);
        table.save(&paths.processed_dir)?;

        if table.is_empty() {
            warn!("no backtest predictions to score");
        }
        let note = format!("{} horizons scored", table.horizons().len());
        self.report
            .record_stage(Stage::Score, table.records().len(), Vec::new(), note);
        Ok(table)
    }

    /// Render forecast and exploratory figures
    pub fn visualize(&mut self) -> Result<ChartOutcome> {
        let paths = &self.config.paths;
        let dataset = CleanedDataset::load(&paths.cleaned_dataset())?;

        let forecasts = match load_forecasts(&paths.forecasts()) {
            Ok(f) => f,
            Err(ForecastError::NotFound(path)) => {
                warn!(%path, "no forecasts yet, skipping forecast charts");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let scores = match ScoreTable::load(&paths.processed_dir) {
            Ok(table) => table,
            Err(ForecastError::NotFound(path)) => {
                warn!(%path, "no backtest scores yet");
                ScoreTable::default()
            }
            Err(e) => return Err(e),
        };

        let generator = VisualizationGenerator::new(self.config.visualization.clone(), &paths.figures_dir);
        let mut outcome = generator.generate(ChartInputs {
            dataset: &dataset,
            forecasts: &forecasts,
            scores: &scores,
        })?;

        let skipped = std::mem::take(&mut outcome.skipped);
        let note = format!("figures in {}", paths.figures_dir.display());
        self.report
            .record_stage(Stage::Visualize, outcome.written.len(), skipped, note);
        Ok(outcome)
    }

    pub fn save_report(&self) -> Result<()> {
        self.report.save(&self.config.paths.run_report())
    }

    /// Every stage in order; the report is saved even when a stage halts the run
    pub fn run_all(mut self) -> Result<RunReport> {
        let result = self.run_stages();
        self.save_report()?;
        result?;

        info!(
            stages = self.report.stages.len(),
            skipped = self.report.skipped.len(),
            "pipeline complete"
        );
        Ok(self.report)
    }

    fn run_stages(&mut self) -> Result<()> {
        self.build_features()?;
        self.filter_history()?;
        self.train()?;
        self.backtest()?;
        self.score()?;
        self.visualize()?;
        Ok(())
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed previous artifact");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// One result row per horizon of a fitted model
fn forecast_results(airport: &str, model: &FittedModel) -> Result<Vec<ForecastResult>> {
    let forecast = model.forecast(MAX_HORIZON as usize)?;
    let last_observed = model.last_observed();

    Ok((1..=MAX_HORIZON)
        .filter_map(|horizon| {
            let h = horizon as usize;
            let predicted = forecast.at(h)?;
            let interval = forecast.interval_at(h);
            Some(ForecastResult {
                airport: airport.to_string(),
                last_observed,
                forecast_month: last_observed.plus(horizon as i32),
                horizon,
                predicted_avg_delay: predicted,
                lower_95: interval.map(|(lo, _)| lo),
                upper_95: interval.map(|(_, hi)| hi),
                model: model.kind(),
                model_name: model.name().to_string(),
            })
        })
        .collect())
}
