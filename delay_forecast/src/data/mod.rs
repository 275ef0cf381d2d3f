//! Monthly airport records and the tables built from them

use crate::error::{ForecastError, Result};
use crate::month::YearMonth;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::path::Path;

pub mod loader;

pub use loader::{LoadOutcome, RawLoader};

/// One airport-month as reported, after type cleaning
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub airport: String,
    pub period: YearMonth,
    pub total_flights: f64,
    pub ontime_pct: f64,
    pub cancelled_pct: f64,
    pub avg_delay: f64,
}

/// One airport-month of the cleaned dataset
///
/// Lag fields are `None` where the prior calendar month is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub airport: String,
    pub period: YearMonth,
    pub year: i32,
    pub month: u32,
    /// Months since the earliest month of the whole dataset
    pub time_index: u32,
    pub total_flights: f64,
    pub ontime_pct: f64,
    pub cancelled_pct: f64,
    pub avg_delay: f64,
    /// Filled by linear interpolation across a short gap
    pub interpolated: bool,
    pub avg_delay_lag_1: Option<f64>,
    pub avg_delay_lag_2: Option<f64>,
    pub avg_delay_lag_3: Option<f64>,
    pub ontime_pct_lag_1: Option<f64>,
    pub ontime_pct_lag_3: Option<f64>,
    pub cancelled_pct_lag_1: Option<f64>,
    pub cancelled_pct_lag_3: Option<f64>,
}

impl CleanedRecord {
    /// Every lag feature is present
    pub fn has_lags(&self) -> bool {
        self.avg_delay_lag_1.is_some()
            && self.avg_delay_lag_2.is_some()
            && self.avg_delay_lag_3.is_some()
            && self.ontime_pct_lag_1.is_some()
            && self.ontime_pct_lag_3.is_some()
            && self.cancelled_pct_lag_1.is_some()
            && self.cancelled_pct_lag_3.is_some()
    }
}

/// Chronological records of one airport
#[derive(Debug, Clone, PartialEq)]
pub struct AirportSeries {
    airport: String,
    records: Vec<CleanedRecord>,
}

impl AirportSeries {
    /// Records are sorted by month; all must belong to `airport`
    pub fn new(airport: impl Into<String>, mut records: Vec<CleanedRecord>) -> Result<Self> {
        let airport = airport.into();
        if let Some(stray) = records.iter().find(|r| r.airport != airport) {
            return Err(ForecastError::ValidationError(format!(
                "Record for {} in series of {}",
                stray.airport, airport
            )));
        }
        records.sort_by_key(|r| r.period);
        Ok(Self { airport, records })
    }

    pub fn airport(&self) -> &str {
        &self.airport
    }

    pub fn records(&self) -> &[CleanedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Average delay per month, oldest first
    pub fn delays(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.avg_delay).collect()
    }

    pub fn first_month(&self) -> Option<YearMonth> {
        self.records.first().map(|r| r.period)
    }

    pub fn last_month(&self) -> Option<YearMonth> {
        self.records.last().map(|r| r.period)
    }

    pub fn last(&self) -> Option<&CleanedRecord> {
        self.records.last()
    }

    pub fn get(&self, period: YearMonth) -> Option<&CleanedRecord> {
        self.records
            .binary_search_by_key(&period, |r| r.period)
            .ok()
            .map(|i| &self.records[i])
    }

    /// First pair of consecutive records more than one month apart
    pub fn first_gap(&self) -> Option<(YearMonth, YearMonth)> {
        self.records
            .windows(2)
            .find(|w| w[0].period.months_until(w[1].period) != 1)
            .map(|w| (w[0].period, w[1].period))
    }

    /// The records strictly before `origin`
    pub fn before(&self, origin: YearMonth) -> AirportSeries {
        let end = self.records.partition_point(|r| r.period < origin);
        AirportSeries {
            airport: self.airport.clone(),
            records: self.records[..end].to_vec(),
        }
    }
}

/// The cleaned (or filtered) airport-month table, sorted by airport then month
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedDataset {
    records: Vec<CleanedRecord>,
}

impl CleanedDataset {
    pub fn new(mut records: Vec<CleanedRecord>) -> Self {
        records.sort_by(|a, b| a.airport.cmp(&b.airport).then(a.period.cmp(&b.period)));
        Self { records }
    }

    pub fn records(&self) -> &[CleanedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CleanedRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct airports, sorted
    pub fn airports(&self) -> Vec<String> {
        let mut airports: Vec<String> = Vec::new();
        for record in &self.records {
            if airports.last() != Some(&record.airport) {
                airports.push(record.airport.clone());
            }
        }
        airports
    }

    /// Distinct months across all airports, sorted
    pub fn months(&self) -> Vec<YearMonth> {
        let mut months: Vec<YearMonth> = self.records.iter().map(|r| r.period).collect();
        months.sort();
        months.dedup();
        months
    }

    pub fn series(&self, airport: &str) -> Option<AirportSeries> {
        let records: Vec<CleanedRecord> = self
            .records
            .iter()
            .filter(|r| r.airport == airport)
            .cloned()
            .collect();
        if records.is_empty() {
            return None;
        }
        Some(AirportSeries {
            airport: airport.to_string(),
            records,
        })
    }

    /// Every airport's series keyed by airport name
    pub fn all_series(&self) -> BTreeMap<String, AirportSeries> {
        let mut grouped: BTreeMap<String, Vec<CleanedRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.airport.clone())
                .or_default()
                .push(record.clone());
        }
        grouped
            .into_iter()
            .map(|(airport, records)| {
                let series = AirportSeries {
                    airport: airport.clone(),
                    records,
                };
                (airport, series)
            })
            .collect()
    }

    /// Keep only the given airports
    pub fn retain_airports(&self, keep: &BTreeSet<String>) -> CleanedDataset {
        let records = self
            .records
            .iter()
            .filter(|r| keep.contains(&r.airport))
            .cloned()
            .collect();
        CleanedDataset { records }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_csv(path, &self.records)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(read_csv(path)?))
    }
}

/// Write serializable rows as a CSV table with a header, creating parent directories
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a CSV table written by [`write_csv`]
pub fn read_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(ForecastError::NotFound(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Gap-free series with lag features filled from its own values
#[cfg(test)]
pub(crate) fn synthetic_series(airport: &str, start: YearMonth, delays: &[f64]) -> AirportSeries {
    let lag = |i: usize, k: usize| i.checked_sub(k).map(|j| delays[j]);
    let ontime = |d: f64| 90.0 - d;
    let cancelled = |d: f64| d / 10.0;
    let records = delays
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let period = start.plus(i as i32);
            CleanedRecord {
                airport: airport.to_string(),
                period,
                year: period.year(),
                month: period.month(),
                time_index: i as u32,
                total_flights: 1000.0,
                ontime_pct: ontime(d),
                cancelled_pct: cancelled(d),
                avg_delay: d,
                interpolated: false,
                avg_delay_lag_1: lag(i, 1),
                avg_delay_lag_2: lag(i, 2),
                avg_delay_lag_3: lag(i, 3),
                ontime_pct_lag_1: lag(i, 1).map(ontime),
                ontime_pct_lag_3: lag(i, 3).map(ontime),
                cancelled_pct_lag_1: lag(i, 1).map(cancelled),
                cancelled_pct_lag_3: lag(i, 3).map(cancelled),
            }
        })
        .collect();
    AirportSeries {
        airport: airport.to_string(),
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(airport: &str, year: i32, month: u32, delay: f64) -> CleanedRecord {
        let period = YearMonth::new(year, month).unwrap();
        CleanedRecord {
            airport: airport.to_string(),
            period,
            year,
            month,
            time_index: 0,
            total_flights: 1000.0,
            ontime_pct: 75.0,
            cancelled_pct: 1.5,
            avg_delay: delay,
            interpolated: false,
            avg_delay_lag_1: None,
            avg_delay_lag_2: None,
            avg_delay_lag_3: None,
            ontime_pct_lag_1: None,
            ontime_pct_lag_3: None,
            cancelled_pct_lag_1: None,
            cancelled_pct_lag_3: None,
        }
    }

    #[test]
    fn test_dataset_sorted_and_grouped() {
        let dataset = CleanedDataset::new(vec![
            record("LUTON", 2024, 2, 14.0),
            record("BRISTOL", 2024, 1, 11.0),
            record("LUTON", 2024, 1, 13.0),
        ]);

        assert_eq!(dataset.airports(), vec!["BRISTOL", "LUTON"]);
        assert_eq!(dataset.months().len(), 2);

        let luton = dataset.series("LUTON").unwrap();
        assert_eq!(luton.delays(), vec![13.0, 14.0]);
        assert_eq!(luton.last_month(), Some(YearMonth::new(2024, 2).unwrap()));
        assert!(dataset.series("CARDIFF").is_none());
        assert_eq!(dataset.all_series().len(), 2);
    }

    #[test]
    fn test_series_gap_and_window() {
        let series = AirportSeries::new(
            "LUTON",
            vec![
                record("LUTON", 2024, 1, 1.0),
                record("LUTON", 2024, 2, 2.0),
                record("LUTON", 2024, 5, 5.0),
            ],
        )
        .unwrap();

        assert_eq!(
            series.first_gap(),
            Some((YearMonth::new(2024, 2).unwrap(), YearMonth::new(2024, 5).unwrap()))
        );

        let window = series.before(YearMonth::new(2024, 5).unwrap());
        assert_eq!(window.len(), 2);
        assert!(window.first_gap().is_none());
        assert!(series.get(YearMonth::new(2024, 3).unwrap()).is_none());
    }

    #[test]
    fn test_series_rejects_foreign_records() {
        let result = AirportSeries::new("LUTON", vec![record("BRISTOL", 2024, 1, 1.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_csv_round_trip_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clean.csv");

        let mut first = record("LUTON", 2024, 1, 13.123456789012345);
        first.avg_delay_lag_1 = Some(0.1 + 0.2);
        first.ontime_pct = 1.0 / 3.0;
        let mut second = record("LUTON", 2024, 2, 7.0);
        second.interpolated = true;
        second.cancelled_pct_lag_3 = Some(-0.0);

        let dataset = CleanedDataset::new(vec![first, second]);
        dataset.save(&path).unwrap();
        let loaded = CleanedDataset::load(&path).unwrap();

        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = CleanedDataset::load(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(ForecastError::NotFound(_))));
    }
}
