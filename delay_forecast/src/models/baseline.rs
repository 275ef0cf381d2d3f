//! Naive last-value baseline

use crate::data::AirportSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ModelForecast, TrainedForecastModel};
use crate::month::YearMonth;
use crate::INTERVAL_LEVEL;
use delay_math::stats::{normal_critical_value, std_dev};
use serde::Serialize;

/// Forecasts the last observed value at every horizon
#[derive(Debug, Clone, Default)]
pub struct NaiveBaseline;

impl NaiveBaseline {
    pub fn new() -> Self {
        Self
    }
}

/// Fitted baseline
///
/// The interval treats the series as a random walk: the h-step band is
/// `z * sigma * sqrt(h)`, sigma being the spread of month-to-month changes.
#[derive(Debug, Clone, Serialize)]
pub struct TrainedBaseline {
    last_value: f64,
    last_observed: YearMonth,
    step_std: Option<f64>,
}

impl TrainedBaseline {
    pub fn last_value(&self) -> f64 {
        self.last_value
    }
}

impl ForecastModel for NaiveBaseline {
    type Trained = TrainedBaseline;

    fn train(&self, series: &AirportSeries) -> Result<TrainedBaseline> {
        let last = series.last().ok_or_else(|| ForecastError::InsufficientHistory {
            airport: series.airport().to_string(),
            needed: 1,
            got: 0,
        })?;

        let delays = series.delays();
        let changes: Vec<f64> = delays.windows(2).map(|w| w[1] - w[0]).collect();
        // Fewer than two changes leave the spread undefined
        let step_std = std_dev(&changes).ok().filter(|s| s.is_finite());

        Ok(TrainedBaseline {
            last_value: last.avg_delay,
            last_observed: last.period,
            step_std,
        })
    }

    fn name(&self) -> &str {
        "baseline"
    }
}

impl TrainedForecastModel for TrainedBaseline {
    fn forecast(&self, horizons: usize) -> Result<ModelForecast> {
        let values = vec![self.last_value; horizons];

        match self.step_std {
            Some(sigma) => {
                let z = normal_critical_value(INTERVAL_LEVEL)?;
                let intervals = (1..=horizons)
                    .map(|h| {
                        let margin = z * sigma * (h as f64).sqrt();
                        (self.last_value - margin, self.last_value + margin)
                    })
                    .collect();
                ModelForecast::new_with_intervals(values, intervals)
            }
            None => Ok(ModelForecast::new(values)),
        }
    }

    fn last_observed(&self) -> YearMonth {
        self.last_observed
    }

    fn name(&self) -> &str {
        "baseline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CleanedRecord;
    use approx::assert_relative_eq;

    fn series(delays: &[f64]) -> AirportSeries {
        let start = YearMonth::new(2023, 1).unwrap();
        let records = delays
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let period = start.plus(i as i32);
                CleanedRecord {
                    airport: "LUTON".to_string(),
                    period,
                    year: period.year(),
                    month: period.month(),
                    time_index: i as u32,
                    total_flights: 500.0,
                    ontime_pct: 75.0,
                    cancelled_pct: 1.0,
                    avg_delay: d,
                    interpolated: false,
                    avg_delay_lag_1: None,
                    avg_delay_lag_2: None,
                    avg_delay_lag_3: None,
                    ontime_pct_lag_1: None,
                    ontime_pct_lag_3: None,
                    cancelled_pct_lag_1: None,
                    cancelled_pct_lag_3: None,
                }
            })
            .collect();
        AirportSeries::new("LUTON", records).unwrap()
    }

    #[test]
    fn test_every_horizon_is_last_value() {
        let trained = NaiveBaseline::new().train(&series(&[10.0, 12.5, 11.25])).unwrap();
        let forecast = trained.forecast(3).unwrap();

        assert_eq!(forecast.values(), &[11.25, 11.25, 11.25]);
        assert_eq!(trained.last_observed(), YearMonth::new(2023, 3).unwrap());
    }

    #[test]
    fn test_random_walk_interval_widens() {
        let trained = NaiveBaseline::new().train(&series(&[10.0, 12.0, 11.0, 14.0])).unwrap();
        let forecast = trained.forecast(3).unwrap();
        let intervals = forecast.intervals().unwrap();

        // changes 2, -1, 3: sample sd = sqrt(13/3)
        let sigma = (13.0_f64 / 3.0).sqrt();
        let z = normal_critical_value(0.95).unwrap();
        assert_relative_eq!(intervals[0].1 - 14.0, z * sigma, epsilon = 1e-9);
        assert_relative_eq!(intervals[2].1 - 14.0, z * sigma * 3.0_f64.sqrt(), epsilon = 1e-9);
        assert!(intervals[1].0 < intervals[0].0);
    }

    #[test]
    fn test_short_series_has_no_interval() {
        let trained = NaiveBaseline::new().train(&series(&[7.0, 8.0])).unwrap();
        let forecast = trained.forecast(2).unwrap();
        assert_eq!(forecast.values(), &[8.0, 8.0]);
        assert!(forecast.intervals().is_none());
    }

    #[test]
    fn test_empty_series_is_error() {
        let empty = AirportSeries::new("LUTON", Vec::new()).unwrap();
        assert!(NaiveBaseline::new().train(&empty).is_err());
    }
}
