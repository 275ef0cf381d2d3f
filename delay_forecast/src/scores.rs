//! Backtest score aggregation and model selection

use crate::backtest::FoldPrediction;
use crate::data::{read_csv, write_csv};
use crate::error::Result;
use crate::models::ModelKind;
use crate::month::YearMonth;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

/// Mean absolute error of one model at one horizon for one airport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub airport: String,
    pub model: ModelKind,
    pub horizon: u32,
    pub mae: f64,
    pub n_folds: usize,
}

/// Airport row of the horizon pivot; `None` where a model was never scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub airport: String,
    pub horizon: u32,
    pub baseline: Option<f64>,
    pub arima: Option<f64>,
    pub gradient_boosting: Option<f64>,
}

/// Winning model of an airport at a horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub airport: String,
    pub horizon: u32,
    pub model: ModelKind,
    pub mae: f64,
}

/// Cross-airport summary of one model at one horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub model: ModelKind,
    pub horizon: u32,
    pub metric: String,
    pub value: f64,
    pub airports: usize,
}

/// File names the score table is persisted under
pub const SCORES_FILE: &str = "model_scores.csv";
pub const PIVOT_FILE: &str = "model_scores_pivot.csv";
pub const SUMMARY_FILE: &str = "model_scores_summary.csv";
pub const BEST_MODELS_FILE: &str = "best_models.csv";

/// Score records ordered by (airport, model, horizon)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    records: Vec<ScoreRecord>,
}

impl ScoreTable {
    pub fn from_records(mut records: Vec<ScoreRecord>) -> Self {
        records.sort_by(|a, b| {
            a.airport
                .cmp(&b.airport)
                .then(a.model.cmp(&b.model))
                .then(a.horizon.cmp(&b.horizon))
        });
        Self { records }
    }

    /// MAE per (airport, model, horizon) over the origins every model of that
    /// airport and horizon was evaluated at
    pub fn from_predictions(predictions: &[FoldPrediction]) -> Self {
        let shared = shared_origins(predictions);
        let mut totals: BTreeMap<(String, ModelKind, u32), (f64, usize)> = BTreeMap::new();
        for p in predictions {
            let in_shared = shared
                .get(&(p.airport.as_str(), p.horizon))
                .is_some_and(|origins| origins.contains(&p.origin));
            if !in_shared {
                continue;
            }
            let entry = totals
                .entry((p.airport.clone(), p.model, p.horizon))
                .or_insert((0.0, 0));
            entry.0 += p.absolute_error();
            entry.1 += 1;
        }

        let records = totals
            .into_iter()
            .map(|((airport, model, horizon), (sum, n))| ScoreRecord {
                airport,
                model,
                horizon,
                mae: sum / n as f64,
                n_folds: n,
            })
            .collect();
        Self::from_records(records)
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, airport: &str, model: ModelKind, horizon: u32) -> Option<&ScoreRecord> {
        self.records
            .iter()
            .find(|r| r.airport == airport && r.model == model && r.horizon == horizon)
    }

    /// Airport x model MAE at one horizon
    pub fn pivot(&self, horizon: u32) -> Vec<PivotRow> {
        let mut rows: BTreeMap<&str, PivotRow> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.horizon == horizon) {
            let row = rows.entry(record.airport.as_str()).or_insert_with(|| PivotRow {
                airport: record.airport.clone(),
                horizon,
                baseline: None,
                arima: None,
                gradient_boosting: None,
            });
            let slot = match record.model {
                ModelKind::Baseline => &mut row.baseline,
                ModelKind::Arima => &mut row.arima,
                ModelKind::GradientBoosting => &mut row.gradient_boosting,
            };
            *slot = Some(record.mae);
        }
        rows.into_values().collect()
    }

    /// Lowest-MAE model per airport at one horizon; ties go to the earlier model kind
    pub fn best_models(&self, horizon: u32) -> Vec<BestModel> {
        let mut best: BTreeMap<&str, &ScoreRecord> = BTreeMap::new();
        // Records are sorted by model within an airport, so strict `<` keeps the earlier kind
        for record in self.records.iter().filter(|r| r.horizon == horizon) {
            best.entry(record.airport.as_str())
                .and_modify(|current| {
                    if record.mae < current.mae {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        best.into_values()
            .map(|r| BestModel {
                airport: r.airport.clone(),
                horizon,
                model: r.model,
                mae: r.mae,
            })
            .collect()
    }

    /// Horizons present in the table, ascending
    pub fn horizons(&self) -> Vec<u32> {
        let mut horizons: Vec<u32> = self.records.iter().map(|r| r.horizon).collect();
        horizons.sort_unstable();
        horizons.dedup();
        horizons
    }

    /// Mean of airport MAEs per (model, horizon)
    pub fn summary(&self) -> Vec<SummaryRow> {
        let mut groups: BTreeMap<(ModelKind, u32), Vec<f64>> = BTreeMap::new();
        for record in &self.records {
            groups
                .entry((record.model, record.horizon))
                .or_default()
                .push(record.mae);
        }
        groups
            .into_iter()
            .map(|((model, horizon), maes)| SummaryRow {
                model,
                horizon,
                metric: "mean_mae".to_string(),
                value: maes.iter().sum::<f64>() / maes.len() as f64,
                airports: maes.len(),
            })
            .collect()
    }

    /// Write the long table, pivots, summary and best models into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        write_csv(&dir.join(SCORES_FILE), &self.records)?;

        let horizons = self.horizons();
        let pivot: Vec<PivotRow> = horizons.iter().flat_map(|&h| self.pivot(h)).collect();
        write_csv(&dir.join(PIVOT_FILE), &pivot)?;
        write_csv(&dir.join(SUMMARY_FILE), &self.summary())?;

        let best: Vec<BestModel> = horizons.iter().flat_map(|&h| self.best_models(h)).collect();
        write_csv(&dir.join(BEST_MODELS_FILE), &best)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::from_records(read_csv(&dir.join(SCORES_FILE))?))
    }
}

/// Intersection of the origins each model reached, per (airport, horizon)
fn shared_origins(predictions: &[FoldPrediction]) -> BTreeMap<(&str, u32), BTreeSet<YearMonth>> {
    let mut reached: BTreeMap<(&str, u32), BTreeMap<ModelKind, BTreeSet<YearMonth>>> = BTreeMap::new();
    for p in predictions {
        reached
            .entry((p.airport.as_str(), p.horizon))
            .or_default()
            .entry(p.model)
            .or_default()
            .insert(p.origin);
    }

    reached
        .into_iter()
        .map(|((airport, horizon), models)| {
            let mut sets = models.into_values();
            let first = sets.next().unwrap_or_default();
            let common: BTreeSet<YearMonth> =
                sets.fold(first, |acc, set| acc.intersection(&set).copied().collect());
            if common.is_empty() {
                warn!(airport, horizon, "models share no backtest origin, not scored");
            }
            ((airport, horizon), common)
        })
        .collect()
}

/// Read `best_models.csv` from `dir`
pub fn load_best_models(dir: &Path) -> Result<Vec<BestModel>> {
    read_csv(&dir.join(BEST_MODELS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::month::YearMonth;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn prediction(airport: &str, model: ModelKind, horizon: u32, predicted: f64, actual: f64) -> FoldPrediction {
        let origin = YearMonth::new(2024, 6).unwrap();
        FoldPrediction {
            airport: airport.to_string(),
            model,
            origin,
            train_end: origin.plus(-1),
            horizon,
            target_month: origin.plus(horizon as i32 - 1),
            predicted,
            actual,
        }
    }

    fn at_origin(mut p: FoldPrediction, origin: YearMonth) -> FoldPrediction {
        p.origin = origin;
        p.train_end = origin.plus(-1);
        p.target_month = origin.plus(p.horizon as i32 - 1);
        p
    }

    fn record(airport: &str, model: ModelKind, horizon: u32, mae: f64) -> ScoreRecord {
        ScoreRecord {
            airport: airport.to_string(),
            model,
            horizon,
            mae,
            n_folds: 3,
        }
    }

    #[test]
    fn test_mae_across_folds() {
        let table = ScoreTable::from_predictions(&[
            prediction("LUTON", ModelKind::Baseline, 1, 10.0, 12.0),
            prediction("LUTON", ModelKind::Baseline, 1, 10.0, 9.0),
            prediction("LUTON", ModelKind::Baseline, 2, 10.0, 14.0),
        ]);

        let h1 = table.get("LUTON", ModelKind::Baseline, 1).unwrap();
        assert_relative_eq!(h1.mae, 1.5);
        assert_eq!(h1.n_folds, 2);
        assert_eq!(table.get("LUTON", ModelKind::Baseline, 2).unwrap().mae, 4.0);
        assert!(table.get("LUTON", ModelKind::Arima, 1).is_none());
    }

    #[test]
    fn test_models_compared_on_shared_origins() {
        let may = YearMonth::new(2024, 5).unwrap();
        let june = YearMonth::new(2024, 6).unwrap();
        let table = ScoreTable::from_predictions(&[
            // the baseline missed badly at an origin ARIMA failed to fit
            at_origin(prediction("LUTON", ModelKind::Baseline, 1, 30.0, 10.0), may),
            at_origin(prediction("LUTON", ModelKind::Baseline, 1, 11.0, 10.0), june),
            at_origin(prediction("LUTON", ModelKind::Arima, 1, 12.0, 10.0), june),
            // no origin in common: neither is scored
            at_origin(prediction("BRISTOL", ModelKind::Baseline, 1, 11.0, 10.0), may),
            at_origin(prediction("BRISTOL", ModelKind::Arima, 1, 12.0, 10.0), june),
        ]);

        let baseline = table.get("LUTON", ModelKind::Baseline, 1).unwrap();
        assert_eq!(baseline.n_folds, 1);
        assert_relative_eq!(baseline.mae, 1.0);
        assert_eq!(table.get("LUTON", ModelKind::Arima, 1).unwrap().n_folds, 1);
        assert_eq!(table.best_models(1)[0].model, ModelKind::Baseline);
        assert!(table.get("BRISTOL", ModelKind::Baseline, 1).is_none());
        assert_eq!(table.best_models(1).len(), 1);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let a = ScoreTable::from_records(vec![
            record("LUTON", ModelKind::GradientBoosting, 1, 1.0),
            record("BRISTOL", ModelKind::Arima, 2, 1.0),
            record("BRISTOL", ModelKind::Arima, 1, 1.0),
            record("BRISTOL", ModelKind::Baseline, 1, 1.0),
        ]);
        let order: Vec<(&str, ModelKind, u32)> = a
            .records()
            .iter()
            .map(|r| (r.airport.as_str(), r.model, r.horizon))
            .collect();
        assert_eq!(
            order,
            vec![
                ("BRISTOL", ModelKind::Baseline, 1),
                ("BRISTOL", ModelKind::Arima, 1),
                ("BRISTOL", ModelKind::Arima, 2),
                ("LUTON", ModelKind::GradientBoosting, 1),
            ]
        );
    }

    #[test]
    fn test_best_models_and_ties() {
        let table = ScoreTable::from_records(vec![
            record("LUTON", ModelKind::Baseline, 1, 2.0),
            record("LUTON", ModelKind::Arima, 1, 1.5),
            record("LUTON", ModelKind::GradientBoosting, 1, 1.8),
            record("BRISTOL", ModelKind::GradientBoosting, 1, 3.0),
            record("BRISTOL", ModelKind::Arima, 1, 3.0),
        ]);

        let best = table.best_models(1);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].airport, "BRISTOL");
        assert_eq!(best[0].model, ModelKind::Arima);
        assert_eq!(best[1].model, ModelKind::Arima);
        assert_eq!(best[1].mae, 1.5);
        assert!(table.best_models(3).is_empty());
    }

    #[test]
    fn test_pivot_and_summary() {
        let table = ScoreTable::from_records(vec![
            record("LUTON", ModelKind::Baseline, 1, 2.0),
            record("LUTON", ModelKind::Arima, 1, 1.0),
            record("BRISTOL", ModelKind::Baseline, 1, 4.0),
        ]);

        let pivot = table.pivot(1);
        assert_eq!(pivot.len(), 2);
        assert_eq!(pivot[0].airport, "BRISTOL");
        assert_eq!(pivot[0].arima, None);
        assert_eq!(pivot[1].arima, Some(1.0));

        let summary = table.summary();
        let baseline = summary.iter().find(|s| s.model == ModelKind::Baseline).unwrap();
        assert_eq!(baseline.value, 3.0);
        assert_eq!(baseline.airports, 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let table = ScoreTable::from_records(vec![
            record("LUTON", ModelKind::Baseline, 1, 2.25),
            record("LUTON", ModelKind::Arima, 2, 1.0),
        ]);
        table.save(dir.path()).unwrap();

        assert_eq!(ScoreTable::load(dir.path()).unwrap(), table);
        let best = load_best_models(dir.path()).unwrap();
        assert_eq!(best.len(), 2);
        assert!(dir.path().join(PIVOT_FILE).exists());
        assert!(dir.path().join(SUMMARY_FILE).exists());
    }
}
