//! Command line definition and dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use delay_forecast::config::{PathsConfig, PipelineConfig};
use delay_forecast::pipeline::Pipeline;
use delay_forecast::serving::ForecastService;
use delay_forecast::MAX_HORIZON;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "flight_delays")]
#[command(version, about = "Monthly UK airport delay forecasting", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); defaults to ./flight_delays.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Lay raw/, processed/ and figures/ out under this directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the cleaned airport-month dataset from the raw reports
    BuildFeatures,
    /// Keep airports with enough unbroken history
    Filter,
    /// Fit every model and write 1-3 month forecasts
    Train,
    /// Rolling-origin evaluation of every model
    Backtest,
    /// Aggregate backtest errors and pick the best model per airport
    Score,
    /// Render forecast and exploratory figures
    Visualize,
    /// Every stage in order
    Run,
    /// Forecast one airport from the persisted artifacts
    Forecast {
        #[arg(short, long)]
        airport: String,

        /// Months ahead of the last observed month
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=MAX_HORIZON as i64))]
        horizon: u32,
    },
    /// Airports with forecasts available
    Airports,
    /// Rendered figure files
    Figures,
    /// Artifact counts
    Health,
}

impl Cli {
    /// Configuration file, then environment, then command line overrides
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())
            .context("failed to load configuration")?;
        if let Some(dir) = &self.data_dir {
            config.paths = PathsConfig::under(dir);
        }
        Ok(config)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.pipeline_config()?;
    info!(
        raw = %config.paths.raw_dir.display(),
        processed = %config.paths.processed_dir.display(),
        "configuration loaded"
    );

    let mut pipeline = Pipeline::new(config.clone());
    let staged = match cli.command {
        Command::BuildFeatures => pipeline.build_features().map(|_| ()),
        Command::Filter => pipeline.filter_history().map(|_| ()),
        Command::Train => pipeline.train().map(|_| ()),
        Command::Backtest => pipeline.backtest().map(|_| ()),
        Command::Score => pipeline.score().map(|_| ()),
        Command::Visualize => pipeline.visualize().map(|_| ()),
        Command::Run => {
            let report = pipeline.run_all().context("pipeline run failed")?;
            return print_json(&report.stages);
        }
        Command::Forecast { airport, horizon } => {
            let service = ForecastService::open(&config.paths)?;
            return print_json(&service.forecast(&airport, horizon)?.response());
        }
        Command::Airports => {
            let service = ForecastService::open(&config.paths)?;
            return print_json(&service.airports());
        }
        Command::Figures => {
            let service = ForecastService::open(&config.paths)?;
            return print_json(&service.report_figures()?);
        }
        Command::Health => {
            let service = ForecastService::open(&config.paths)?;
            return print_json(&service.health());
        }
    };

    pipeline.save_report()?;
    staged.context("stage failed")?;
    print_json(&pipeline.report().stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forecast_query() {
        let cli = Cli::try_parse_from([
            "flight_delays",
            "--data-dir",
            "/tmp/delays",
            "forecast",
            "--airport",
            "heathrow",
            "--horizon",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/delays")));
        match cli.command {
            Command::Forecast { airport, horizon } => {
                assert_eq!(airport, "heathrow");
                assert_eq!(horizon, 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_horizon_out_of_range_is_rejected() {
        let parsed = Cli::try_parse_from(["flight_delays", "forecast", "-a", "LUTON", "--horizon", "4"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["flight_delays", "run", "--json-logs"]).unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn test_data_dir_overrides_paths() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "flight_delays",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "airports",
        ])
        .unwrap();

        let config = cli.pipeline_config().unwrap();
        assert_eq!(config.paths, PathsConfig::under(dir.path()));
    }
}
