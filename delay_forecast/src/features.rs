//! Feature building: raw records into the cleaned airport-month dataset

use crate::data::{CleanedDataset, CleanedRecord, RawRecord};
use crate::error::{ForecastError, Result};
use crate::month::YearMonth;
use delay_math::interpolation::linear_fill;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Measured values of one airport-month before feature derivation
#[derive(Debug, Clone, Copy)]
struct Observation {
    total_flights: f64,
    ontime_pct: f64,
    cancelled_pct: f64,
    avg_delay: f64,
    interpolated: bool,
}

impl Observation {
    fn from_raw(raw: &RawRecord) -> Self {
        Self {
            total_flights: raw.total_flights,
            ontime_pct: raw.ontime_pct,
            cancelled_pct: raw.cancelled_pct,
            avg_delay: raw.avg_delay,
            interpolated: false,
        }
    }

    /// `missing` interpolated observations strictly between `self` and `next`
    fn fill_towards(&self, next: &Observation, missing: usize) -> Vec<Observation> {
        let flights = linear_fill(self.total_flights, next.total_flights, missing);
        let ontime = linear_fill(self.ontime_pct, next.ontime_pct, missing);
        let cancelled = linear_fill(self.cancelled_pct, next.cancelled_pct, missing);
        let delay = linear_fill(self.avg_delay, next.avg_delay, missing);

        (0..missing)
            .map(|i| Observation {
                total_flights: flights[i],
                ontime_pct: ontime[i],
                cancelled_pct: cancelled[i],
                avg_delay: delay[i],
                interpolated: true,
            })
            .collect()
    }
}

/// Result of a feature build
#[derive(Debug, Clone)]
pub struct FeatureOutcome {
    pub dataset: CleanedDataset,
    /// Repeated (airport, month) rows dropped after the first
    pub duplicates_dropped: usize,
    pub interpolated_rows: usize,
}

/// Builds the cleaned dataset from raw records
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    max_interpolated_gap: usize,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new(2)
    }
}

impl FeatureBuilder {
    /// Gaps of up to `max_interpolated_gap` missing months are filled
    pub fn new(max_interpolated_gap: usize) -> Self {
        Self {
            max_interpolated_gap,
        }
    }

    pub fn build(&self, raw: &[RawRecord]) -> Result<FeatureOutcome> {
        let mut by_airport: BTreeMap<&str, BTreeMap<YearMonth, Observation>> = BTreeMap::new();
        let mut duplicates_dropped = 0;

        for record in raw {
            let months = by_airport.entry(record.airport.as_str()).or_default();
            if months.contains_key(&record.period) {
                duplicates_dropped += 1;
                continue;
            }
            months.insert(record.period, Observation::from_raw(record));
        }

        let earliest = raw.iter().map(|r| r.period).min().ok_or_else(|| {
            ForecastError::Systemic("No usable raw records to build features from".to_string())
        })?;

        let mut records = Vec::with_capacity(raw.len());
        let mut interpolated_rows = 0;

        for (airport, observed) in by_airport {
            let filled = self.fill_gaps(&observed);
            interpolated_rows += filled.values().filter(|o| o.interpolated).count();

            for (&period, obs) in &filled {
                let prior = |months_back: i32| filled.get(&period.plus(-months_back));
                records.push(CleanedRecord {
                    airport: airport.to_string(),
                    period,
                    year: period.year(),
                    month: period.month(),
                    time_index: earliest.months_until(period).max(0) as u32,
                    total_flights: obs.total_flights,
                    ontime_pct: obs.ontime_pct,
                    cancelled_pct: obs.cancelled_pct,
                    avg_delay: obs.avg_delay,
                    interpolated: obs.interpolated,
                    avg_delay_lag_1: prior(1).map(|o| o.avg_delay),
                    avg_delay_lag_2: prior(2).map(|o| o.avg_delay),
                    avg_delay_lag_3: prior(3).map(|o| o.avg_delay),
                    ontime_pct_lag_1: prior(1).map(|o| o.ontime_pct),
                    ontime_pct_lag_3: prior(3).map(|o| o.ontime_pct),
                    cancelled_pct_lag_1: prior(1).map(|o| o.cancelled_pct),
                    cancelled_pct_lag_3: prior(3).map(|o| o.cancelled_pct),
                });
            }
        }

        let dataset = CleanedDataset::new(records);
        info!(
            rows = dataset.len(),
            airports = dataset.airports().len(),
            months = dataset.months().len(),
            duplicates_dropped,
            interpolated_rows,
            "cleaned dataset built"
        );

        Ok(FeatureOutcome {
            dataset,
            duplicates_dropped,
            interpolated_rows,
        })
    }

    /// Interior gaps no longer than the configured limit become interpolated months
    fn fill_gaps(
        &self,
        observed: &BTreeMap<YearMonth, Observation>,
    ) -> BTreeMap<YearMonth, Observation> {
        let mut filled = observed.clone();
        let months: Vec<(&YearMonth, &Observation)> = observed.iter().collect();

        for pair in months.windows(2) {
            let (&start, before) = pair[0];
            let (&end, after) = pair[1];
            let missing = (start.months_until(end) - 1).max(0) as usize;
            if missing == 0 {
                continue;
            }
            if missing > self.max_interpolated_gap {
                debug!(%start, %end, missing, "gap left unfilled");
                continue;
            }
            for (offset, obs) in before.fill_towards(after, missing).into_iter().enumerate() {
                filled.insert(start.plus(offset as i32 + 1), obs);
            }
        }

        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(airport: &str, year: i32, month: u32, delay: f64) -> RawRecord {
        RawRecord {
            airport: airport.to_string(),
            period: YearMonth::new(year, month).unwrap(),
            total_flights: 1000.0,
            ontime_pct: 70.0 + delay,
            cancelled_pct: 1.0,
            avg_delay: delay,
        }
    }

    #[test]
    fn test_lags_follow_calendar_months() {
        let outcome = FeatureBuilder::default()
            .build(&[
                raw("LUTON", 2024, 1, 10.0),
                raw("LUTON", 2024, 2, 11.0),
                raw("LUTON", 2024, 3, 12.0),
                raw("LUTON", 2024, 4, 13.0),
            ])
            .unwrap();

        let records = outcome.dataset.records();
        assert_eq!(records[0].avg_delay_lag_1, None);
        assert_eq!(records[1].avg_delay_lag_1, Some(10.0));
        assert_eq!(records[2].avg_delay_lag_2, Some(10.0));
        assert_eq!(records[3].avg_delay_lag_3, Some(10.0));
        assert_eq!(records[3].ontime_pct_lag_3, Some(80.0));
        assert!(records[3].has_lags());
        assert!(!records[2].has_lags());
    }

    #[test]
    fn test_duplicates_keep_first() {
        let outcome = FeatureBuilder::default()
            .build(&[
                raw("LUTON", 2024, 1, 10.0),
                raw("LUTON", 2024, 1, 99.0),
                raw("BRISTOL", 2024, 1, 5.0),
            ])
            .unwrap();

        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.dataset.len(), 2);
        let luton = outcome.dataset.series("LUTON").unwrap();
        assert_eq!(luton.delays(), vec![10.0]);
    }

    #[test]
    fn test_short_gap_is_interpolated() {
        let outcome = FeatureBuilder::new(2)
            .build(&[
                raw("LUTON", 2024, 1, 10.0),
                raw("LUTON", 2024, 4, 16.0),
                raw("LUTON", 2024, 5, 17.0),
            ])
            .unwrap();

        let luton = outcome.dataset.series("LUTON").unwrap();
        assert_eq!(outcome.interpolated_rows, 2);
        assert!(luton.first_gap().is_none());
        assert_relative_eq!(luton.delays()[1], 12.0);
        assert_relative_eq!(luton.delays()[2], 14.0);
        assert!(luton.records()[1].interpolated);
        assert!(!luton.records()[3].interpolated);
    }

    #[test]
    fn test_long_gap_leaves_null_lags() {
        let outcome = FeatureBuilder::new(2)
            .build(&[
                raw("LUTON", 2024, 1, 10.0),
                raw("LUTON", 2024, 6, 16.0),
            ])
            .unwrap();

        let luton = outcome.dataset.series("LUTON").unwrap();
        assert_eq!(luton.len(), 2);
        assert!(luton.first_gap().is_some());
        assert_eq!(luton.records()[1].avg_delay_lag_1, None);
        assert_eq!(outcome.interpolated_rows, 0);
    }

    #[test]
    fn test_time_index_is_global() {
        let outcome = FeatureBuilder::default()
            .build(&[
                raw("LUTON", 2023, 11, 10.0),
                raw("BRISTOL", 2024, 2, 5.0),
            ])
            .unwrap();

        let bristol = outcome.dataset.series("BRISTOL").unwrap();
        let luton = outcome.dataset.series("LUTON").unwrap();
        assert_eq!(luton.records()[0].time_index, 0);
        assert_eq!(bristol.records()[0].time_index, 3);
    }

    #[test]
    fn test_empty_input_is_systemic() {
        let result = FeatureBuilder::default().build(&[]);
        assert!(matches!(result, Err(ForecastError::Systemic(_))));
    }
}
