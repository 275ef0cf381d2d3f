//! Raw CAA report loading
//!
//! Each monthly report is a CSV export of the airport punctuality table.
//! Headers are matched loosely against the CAA column names, so exports
//! from different months (extra columns, slightly different spacing or
//! case) load into the same record shape.

use crate::data::RawRecord;
use crate::error::{ForecastError, Result};
use crate::month::YearMonth;
use crate::report::{SkipRecord, Stage};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Aggregate rows that are not an airport
const AGGREGATE_AIRPORTS: [&str; 1] = ["ALL AIRPORTS"];

/// Canonical columns and the normalised header names accepted for each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Period,
    Airport,
    OntimePct,
    AvgDelay,
    CancelledPct,
    TotalFlights,
    Year,
    Month,
}

impl Column {
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Period => &["reporting_period", "period"],
            Column::Airport => &["reporting_airport", "airport"],
            Column::OntimePct => &["flights_on_time_15mins_percent", "ontime_pct"],
            Column::AvgDelay => &["average_delay_minutes", "avg_delay"],
            Column::CancelledPct => &["flights_cancelled_percent", "cancelled_pct"],
            Column::TotalFlights => &["total_flights"],
            Column::Year => &["year"],
            Column::Month => &["month"],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Column::Period => "Reporting Period",
            Column::Airport => "Reporting Airport",
            Column::OntimePct => "Flights on time (<15mins) Percent",
            Column::AvgDelay => "Average Delay Minutes",
            Column::CancelledPct => "Flights Cancelled Percent",
            Column::TotalFlights => "Total Flights",
            Column::Year => "Year",
            Column::Month => "Month",
        }
    }
}

/// Lower-case a header and collapse every run of non-alphanumerics to `_`
pub fn normalize_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    for c in header.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Parse a numeric cell, tolerating thousands separators and padding
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell.chars().filter(|c| *c != ',').collect();
    let value = cleaned.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Records from every loadable file, plus what was skipped
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub records: Vec<RawRecord>,
    pub files_loaded: usize,
    /// Rows dropped for missing or unparseable core values
    pub rows_dropped: usize,
    /// Aggregate rows removed
    pub aggregates_removed: usize,
    pub skipped: Vec<SkipRecord>,
}

/// Loader for a directory of raw monthly reports
#[derive(Debug, Clone)]
pub struct RawLoader {
    /// Rows above the header line
    header_row: usize,
}

impl Default for RawLoader {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RawLoader {
    pub fn new(header_row: usize) -> Self {
        Self { header_row }
    }

    /// `*.csv` files of a directory, sorted by name
    pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ForecastError::Systemic(format!(
                "Raw data directory {} does not exist",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load every report in `dir`; a bad file is skipped, no files at all is fatal
    pub fn load_dir(&self, dir: &Path) -> Result<LoadOutcome> {
        let files = Self::list_files(dir)?;
        if files.is_empty() {
            return Err(ForecastError::Systemic(format!(
                "No raw CSV files found in {}",
                dir.display()
            )));
        }

        let mut outcome = LoadOutcome::default();
        for file in &files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());

            match self.load_file(file) {
                Ok(loaded) => {
                    debug!(file = %name, rows = loaded.records.len(), "loaded raw report");
                    outcome.files_loaded += 1;
                    outcome.rows_dropped += loaded.rows_dropped;
                    outcome.aggregates_removed += loaded.aggregates_removed;
                    outcome.records.extend(loaded.records);
                }
                Err(e) => {
                    outcome.skipped.push(SkipRecord::new(Stage::Features, name, e));
                }
            }
        }

        info!(
            files = files.len(),
            loaded = outcome.files_loaded,
            rows = outcome.records.len(),
            dropped = outcome.rows_dropped,
            "raw reports loaded"
        );
        Ok(outcome)
    }

    /// Load one report; any structural problem is a `DataFormat` error
    pub fn load_file(&self, path: &Path) -> Result<LoadOutcome> {
        let file_name = path.display().to_string();
        let format_error = |reason: String| ForecastError::DataFormat {
            file: file_name.clone(),
            reason,
        };

        // Every column as text; numeric cleaning happens below
        let df = CsvReader::from_path(path)
            .and_then(|reader| {
                reader
                    .has_header(true)
                    .with_skip_rows(self.header_row)
                    .infer_schema(Some(0))
                    .finish()
            })
            .map_err(|e| format_error(e.to_string()))?;

        let headers: Vec<(String, String)> = df
            .get_column_names()
            .iter()
            .map(|name| (normalize_header(name), name.to_string()))
            .collect();
        let find = |column: Column| -> Option<String> {
            column.aliases().iter().find_map(|alias| {
                headers
                    .iter()
                    .find(|(normalized, _)| normalized.as_str() == *alias)
                    .map(|(_, original)| original.clone())
            })
        };

        let mut missing = Vec::new();
        let mut required = |column: Column| -> Option<String> {
            let found = find(column);
            if found.is_none() {
                missing.push(column.label());
            }
            found
        };
        let airport_col = required(Column::Airport);
        let ontime_col = required(Column::OntimePct);
        let delay_col = required(Column::AvgDelay);
        let cancelled_col = required(Column::CancelledPct);
        let flights_col = required(Column::TotalFlights);

        // A year/month pair stands in for the reporting period
        let period_source = match (find(Column::Period), find(Column::Year), find(Column::Month)) {
            (Some(period), _, _) => Some(PeriodSource::Period(period)),
            (None, Some(year), Some(month)) => Some(PeriodSource::YearMonth(year, month)),
            _ => None,
        };
        if period_source.is_none() {
            missing.push(Column::Period.label());
        }

        let (
            Some(airport_col),
            Some(ontime_col),
            Some(delay_col),
            Some(cancelled_col),
            Some(flights_col),
            Some(period_source),
        ) = (
            airport_col,
            ontime_col,
            delay_col,
            cancelled_col,
            flights_col,
            period_source,
        )
        else {
            return Err(format_error(format!(
                "missing expected columns: {}",
                missing.join(", ")
            )));
        };

        let text = |name: &str| -> Result<Vec<Option<String>>> {
            let series = df
                .column(name)
                .and_then(|s| s.cast(&DataType::Utf8))
                .map_err(|e| format_error(e.to_string()))?;
            let values = series
                .utf8()
                .map_err(|e| format_error(e.to_string()))?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect();
            Ok(values)
        };

        let airports = text(&airport_col)?;
        let ontime = text(&ontime_col)?;
        let delay = text(&delay_col)?;
        let cancelled = text(&cancelled_col)?;
        let flights = text(&flights_col)?;
        let periods: Vec<Option<YearMonth>> = match &period_source {
            PeriodSource::Period(col) => text(col)?
                .iter()
                .map(|cell| cell.as_deref().and_then(|c| YearMonth::parse_period(c).ok()))
                .collect(),
            PeriodSource::YearMonth(year_col, month_col) => text(year_col)?
                .iter()
                .zip(text(month_col)?.iter())
                .map(|(y, m)| {
                    let year = y.as_deref().and_then(parse_number)?;
                    let month = m.as_deref().and_then(parse_number)?;
                    YearMonth::new(year as i32, month as u32).ok()
                })
                .collect(),
        };

        let mut outcome = LoadOutcome::default();
        for i in 0..df.height() {
            let airport = airports[i]
                .as_deref()
                .map(|a| a.trim().to_uppercase())
                .filter(|a| !a.is_empty());
            let number = |column: &[Option<String>]| column[i].as_deref().and_then(parse_number);

            let row = (
                airport,
                periods[i],
                number(&flights),
                number(&ontime),
                number(&cancelled),
                number(&delay),
            );
            let (
                Some(airport),
                Some(period),
                Some(total_flights),
                Some(ontime_pct),
                Some(cancelled_pct),
                Some(avg_delay),
            ) = row
            else {
                outcome.rows_dropped += 1;
                continue;
            };

            if AGGREGATE_AIRPORTS.contains(&airport.as_str()) {
                outcome.aggregates_removed += 1;
                continue;
            }

            outcome.records.push(RawRecord {
                airport,
                period,
                total_flights,
                ontime_pct,
                cancelled_pct,
                avg_delay,
            });
        }

        if outcome.records.is_empty() {
            return Err(format_error("no usable rows".to_string()));
        }
        Ok(outcome)
    }
}

enum PeriodSource {
    Period(String),
    YearMonth(String, String),
}
