//! PNG figures: per-airport forecast charts and a fixed exploratory set
//!
//! Every chart is drawn on its own. A chart that fails to render becomes a
//! [`SkipRecord`] and the remaining charts are still attempted.

use crate::config::VisualizationConfig;
use crate::data::CleanedDataset;
use crate::error::{ForecastError, Result};
use crate::models::ModelKind;
use crate::report::{SkipRecord, Stage};
use crate::scores::ScoreTable;
use crate::serving::{ForecastResult, FALLBACK_ORDER};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

mod exploratory;
mod forecast_chart;

pub use forecast_chart::ForecastChart;

pub(crate) type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
pub(crate) type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

const CHART_SIZE: (u32, u32) = (1100, 650);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 26);

pub const TOP_AIRPORTS_FILE: &str = "top15_airports_by_avg_delay.png";
pub const HEATMAP_FILE: &str = "heatmap_avg_delay_airport_month.png";
pub const MULTI_TREND_FILE: &str = "multi_airport_delay_trends.png";
pub const LAG1_SCATTER_FILE: &str = "scatter_actual_vs_lag1_baseline.png";
pub const CANCELLED_SCATTER_FILE: &str = "scatter_cancelled_vs_delay.png";
pub const ONTIME_SCATTER_FILE: &str = "scatter_ontime_vs_delay.png";
pub const MODEL_COMPARISON_FILE: &str = "model_comparison_mae.png";

/// Upper case, runs of anything outside `A-Z0-9_` collapsed to `_`, no
/// leading or trailing underscores
pub fn safe_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending = false;
    for c in raw.trim().to_uppercase().chars() {
        if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
            if pending {
                out.push('_');
                pending = false;
            }
            out.push(c);
        } else {
            pending = true;
        }
    }
    out.trim_matches('_').to_string()
}

pub fn forecast_chart_file(airport: &str, horizon: u32) -> String {
    format!("forecast_ci_{}_h{}.png", safe_name(airport), horizon)
}

pub fn trend_file(airport: &str) -> String {
    format!("trend_{}.png", safe_name(airport))
}

/// Draw one PNG, turning drawing errors and backend panics into `Render`
pub(crate) fn render_png<F>(path: &Path, draw: F) -> Result<()>
where
    F: FnOnce(&Canvas) -> DrawResult,
{
    let chart = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let drawn = panic::catch_unwind(AssertUnwindSafe(|| -> DrawResult {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
        Ok(())
    }));

    let failure = match drawn {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => ForecastError::render(chart, e),
        Err(_) => ForecastError::render(chart, "drawing backend panicked"),
    };
    // The backend flushes whatever it drew when dropped
    if path.exists() {
        let _ = fs::remove_file(path);
    }
    Err(failure)
}

/// Axis bounds with a margin; flat data still gets a visible range
pub(crate) fn padded_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    let pad = ((hi - lo) * 0.08).max(1.0);
    Some((lo - pad, hi + pad))
}

pub(crate) fn caption_font() -> (&'static str, u32) {
    CAPTION_FONT
}

/// Inputs shared by every chart
#[derive(Debug, Clone, Copy)]
pub struct ChartInputs<'a> {
    /// Cleaned dataset before history filtering
    pub dataset: &'a CleanedDataset,
    pub forecasts: &'a [ForecastResult],
    pub scores: &'a ScoreTable,
}

/// Files written and charts skipped
#[derive(Debug, Clone, Default)]
pub struct ChartOutcome {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkipRecord>,
}

impl ChartOutcome {
    fn record(&mut self, path: PathBuf, result: Result<()>) {
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "figure written");
                self.written.push(path);
            }
            Err(e) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.skipped.push(SkipRecord::new(Stage::Visualize, name, e));
            }
        }
    }
}

/// Renders every configured figure into one directory
#[derive(Debug, Clone)]
pub struct VisualizationGenerator {
    config: VisualizationConfig,
    figures_dir: PathBuf,
}

impl VisualizationGenerator {
    pub fn new(config: VisualizationConfig, figures_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            figures_dir: figures_dir.into(),
        }
    }

    pub fn figures_dir(&self) -> &Path {
        &self.figures_dir
    }

    /// Render everything; only an unusable figures directory is an error
    pub fn generate(&self, inputs: ChartInputs<'_>) -> Result<ChartOutcome> {
        fs::create_dir_all(&self.figures_dir)?;
        let mut outcome = ChartOutcome::default();

        self.forecast_charts(inputs, &mut outcome);
        self.exploratory_charts(inputs, &mut outcome);

        info!(
            written = outcome.written.len(),
            skipped = outcome.skipped.len(),
            dir = %self.figures_dir.display(),
            "figures rendered"
        );
        Ok(outcome)
    }

    fn forecast_charts(&self, inputs: ChartInputs<'_>, outcome: &mut ChartOutcome) {
        let horizon = self.config.forecast_horizon;
        let airports: Vec<String> = match &self.config.forecast_airports {
            Some(list) => list.iter().map(|a| a.trim().to_uppercase()).collect(),
            None => {
                let mut forecasted: Vec<String> =
                    inputs.forecasts.iter().map(|f| f.airport.clone()).collect();
                forecasted.sort();
                forecasted.dedup();
                forecasted
            }
        };

        let best: BTreeMap<String, ModelKind> = inputs
            .scores
            .best_models(horizon)
            .into_iter()
            .map(|b| (b.airport, b.model))
            .collect();

        for airport in airports {
            let path = self.figures_dir.join(forecast_chart_file(&airport, horizon));
            let result = chart_forecasts(inputs.forecasts, &airport, horizon, best.get(&airport).copied())
                .and_then(|(model, steps)| {
                    let history = inputs
                        .dataset
                        .series(&airport)
                        .map(|s| {
                            let records = s.records();
                            let start = records.len().saturating_sub(self.config.history_months);
                            records[start..]
                                .iter()
                                .map(|r| (r.period, r.avg_delay))
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default();
                    ForecastChart::new(&airport, model, history, steps).render(&path)
                });
            outcome.record(path, result);
        }
    }

    fn exploratory_charts(&self, inputs: ChartInputs<'_>, outcome: &mut ChartOutcome) {
        let dir = &self.figures_dir;
        let dataset = inputs.dataset;

        let path = dir.join(TOP_AIRPORTS_FILE);
        outcome.record(path.clone(), exploratory::top_airports(&path, dataset, self.config.top_n));

        let path = dir.join(HEATMAP_FILE);
        outcome.record(path.clone(), exploratory::heatmap(&path, dataset));

        let path = dir.join(MULTI_TREND_FILE);
        outcome.record(
            path.clone(),
            exploratory::multi_trends(&path, dataset, &self.config.trend_airports),
        );

        let path = dir.join(LAG1_SCATTER_FILE);
        outcome.record(path.clone(), exploratory::lag1_scatter(&path, dataset));

        let path = dir.join(CANCELLED_SCATTER_FILE);
        outcome.record(
            path.clone(),
            exploratory::delay_scatter(&path, dataset, "Cancelled flights (%)", |r| r.cancelled_pct),
        );

        let path = dir.join(ONTIME_SCATTER_FILE);
        outcome.record(
            path.clone(),
            exploratory::delay_scatter(&path, dataset, "On-time flights (%)", |r| r.ontime_pct),
        );

        for airport in &self.config.trend_airports {
            let path = dir.join(trend_file(airport));
            outcome.record(path.clone(), exploratory::airport_trend(&path, dataset, airport));
        }

        let path = dir.join(MODEL_COMPARISON_FILE);
        outcome.record(path.clone(), exploratory::model_comparison(&path, inputs.scores));
    }
}

/// Forecasts of one model for horizons `1..=horizon`, using the best model at
/// `horizon` when it has them all and the fallback order otherwise
fn chart_forecasts(
    forecasts: &[ForecastResult],
    airport: &str,
    horizon: u32,
    preferred: Option<ModelKind>,
) -> Result<(ModelKind, Vec<ForecastResult>)> {
    preferred
        .into_iter()
        .chain(FALLBACK_ORDER)
        .find_map(|model| {
            let mut steps: Vec<ForecastResult> = forecasts
                .iter()
                .filter(|f| f.airport == airport && f.model == model && f.horizon <= horizon)
                .cloned()
                .collect();
            steps.sort_by_key(|f| f.horizon);
            (steps.len() == horizon as usize).then_some((model, steps))
        })
        .ok_or_else(|| {
            ForecastError::NotFound(format!(
                "No model has forecasts for {} up to horizon {}",
                airport, horizon
            ))
        })
}
