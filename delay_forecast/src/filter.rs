//! History filtering: which airports have enough unbroken history to model

use crate::data::{write_csv, CleanedDataset};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Why an airport was left out of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    InsufficientHistory,
    GappedHistory,
    NoEvaluableFold,
}

/// An airport left out, with the months it had
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedAirport {
    pub airport: String,
    pub reason: ExclusionReason,
    pub months_available: usize,
    pub detail: String,
}

/// Filtered dataset plus every airport that did not make it
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub dataset: CleanedDataset,
    pub excluded: Vec<ExcludedAirport>,
}

impl FilterOutcome {
    /// Airports kept, sorted
    pub fn eligible(&self) -> Vec<String> {
        self.dataset.airports()
    }

    pub fn save(&self, dataset_path: &Path, excluded_path: &Path) -> Result<()> {
        self.dataset.save(dataset_path)?;
        write_csv(excluded_path, &self.excluded)
    }
}

/// Keeps airports with at least `min_history_months` consecutive months
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    min_history_months: usize,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self::new(12)
    }
}

impl HistoryFilter {
    pub fn new(min_history_months: usize) -> Self {
        Self { min_history_months }
    }

    pub fn min_history_months(&self) -> usize {
        self.min_history_months
    }

    /// Filter the cleaned dataset; an empty result is fatal
    pub fn apply(&self, dataset: &CleanedDataset) -> Result<FilterOutcome> {
        let mut keep = BTreeSet::new();
        let mut excluded = Vec::new();

        for (airport, series) in dataset.all_series() {
            if series.len() < self.min_history_months {
                excluded.push(ExcludedAirport {
                    airport,
                    reason: ExclusionReason::InsufficientHistory,
                    months_available: series.len(),
                    detail: format!(
                        "{} months available, {} required",
                        series.len(),
                        self.min_history_months
                    ),
                });
                continue;
            }

            if let Some((before, after)) = series.first_gap() {
                excluded.push(ExcludedAirport {
                    airport,
                    reason: ExclusionReason::GappedHistory,
                    months_available: series.len(),
                    detail: format!("no data between {} and {}", before, after),
                });
                continue;
            }

            keep.insert(airport);
        }

        let filtered = dataset.retain_airports(&keep);
        if filtered.is_empty() {
            return Err(ForecastError::Systemic(format!(
                "No airport has {} or more consecutive months of history",
                self.min_history_months
            )));
        }

        info!(
            eligible = keep.len(),
            excluded = excluded.len(),
            rows = filtered.len(),
            "history filter applied"
        );

        Ok(FilterOutcome {
            dataset: filtered,
            excluded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawRecord;
    use crate::features::FeatureBuilder;
    use crate::month::YearMonth;

    fn dataset(airports: &[(&str, &[(i32, u32)])]) -> CleanedDataset {
        let raw: Vec<RawRecord> = airports
            .iter()
            .flat_map(|(airport, months)| {
                months.iter().map(move |&(year, month)| RawRecord {
                    airport: airport.to_string(),
                    period: YearMonth::new(year, month).unwrap(),
                    total_flights: 100.0,
                    ontime_pct: 80.0,
                    cancelled_pct: 1.0,
                    avg_delay: 12.0,
                })
            })
            .collect();
        FeatureBuilder::new(0).build(&raw).unwrap().dataset
    }

    #[test]
    fn test_short_and_gapped_airports_excluded() {
        let full: Vec<(i32, u32)> = (1..=4).map(|m| (2024, m)).collect();
        let gapped = [(2024, 1), (2024, 2), (2024, 4), (2024, 5)];
        let short = [(2024, 3), (2024, 4)];
        let data = dataset(&[
            ("LUTON", &full[..]),
            ("BRISTOL", &gapped[..]),
            ("CARDIFF", &short[..]),
        ]);

        let outcome = HistoryFilter::new(3).apply(&data).unwrap();
        assert_eq!(outcome.eligible(), vec!["LUTON"]);
        assert_eq!(outcome.excluded.len(), 2);

        let bristol = outcome.excluded.iter().find(|e| e.airport == "BRISTOL").unwrap();
        assert_eq!(bristol.reason, ExclusionReason::GappedHistory);
        let cardiff = outcome.excluded.iter().find(|e| e.airport == "CARDIFF").unwrap();
        assert_eq!(cardiff.reason, ExclusionReason::InsufficientHistory);
        assert_eq!(cardiff.months_available, 2);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let full: Vec<(i32, u32)> = (1..=12).map(|m| (2024, m)).collect();
        let short = [(2024, 1)];
        let data = dataset(&[("LUTON", &full[..]), ("CARDIFF", &short[..])]);
        let filter = HistoryFilter::new(12);

        let once = filter.apply(&data).unwrap();
        let twice = filter.apply(&once.dataset).unwrap();
        assert_eq!(once.dataset, twice.dataset);
        assert!(twice.excluded.is_empty());
    }

    #[test]
    fn test_nothing_eligible_is_systemic() {
        let short = [(2024, 1), (2024, 2)];
        let data = dataset(&[("CARDIFF", &short[..])]);
        let result = HistoryFilter::new(12).apply(&data);
        assert!(matches!(result, Err(ForecastError::Systemic(_))));
    }
}
