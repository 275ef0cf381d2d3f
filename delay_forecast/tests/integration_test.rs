use delay_forecast::config::{PathsConfig, PipelineConfig};
use delay_forecast::pipeline::Pipeline;
use delay_forecast::serving::{load_forecasts, ForecastService};
use delay_forecast::{CleanedDataset, ForecastError, ModelKind, Stage, YearMonth};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str = "Reporting Period,Reporting Airport,Total Flights,\
Flights on time (<15mins) Percent,Flights Cancelled Percent,Average Delay Minutes";

fn first_month() -> YearMonth {
    YearMonth::new(2023, 1).unwrap()
}

/// Strictly increasing, with an uneven step so the differenced series is not constant
fn rising(i: usize) -> f64 {
    10.0 + i as f64 + 0.3 * (i % 3) as f64
}

fn wavy(i: usize) -> f64 {
    15.0 + ((i * 7) % 5) as f64 + if i % 12 < 6 { 2.0 } else { 0.0 }
}

fn write_raw_reports(raw_dir: &Path) {
    fs::create_dir_all(raw_dir).unwrap();

    let mut good = format!("{}\n", HEADER);
    for i in 0..24 {
        let period = first_month().plus(i as i32).period_code();
        good.push_str(&format!("{},LUTON,1500,{:.1},1.2,{:.2}\n", period, 90.0 - rising(i), rising(i)));
        good.push_str(&format!("{},Bristol,\"2,100\",{:.1},0.8,{:.2}\n", period, 88.0 - wavy(i), wavy(i)));
        good.push_str(&format!("{},ALL AIRPORTS,90000,75.0,1.0,18.00\n", period));
    }
    for i in 21..24 {
        let period = first_month().plus(i).period_code();
        good.push_str(&format!("{},BARRA,40,95.0,0.0,4.00\n", period));
    }
    fs::write(raw_dir.join("2023_2024.csv"), good).unwrap();

    // no average delay column
    let broken = "Reporting Period,Reporting Airport,Total Flights,\
Flights on time (<15mins) Percent,Flights Cancelled Percent\n\
202501,LUTON,1500,70.0,1.2\n";
    fs::write(raw_dir.join("2025_01.csv"), broken).unwrap();
}

fn test_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths = PathsConfig::under(root);
    config.gradient_boosting.n_estimators = 30;
    config.backtest.max_origins = Some(4);
    config.visualization.trend_airports = vec!["LUTON".to_string()];
    config
}

#[test]
fn test_full_pipeline_and_queries() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    write_raw_reports(&config.paths.raw_dir);

    let report = Pipeline::new(config.clone()).run_all().unwrap();

    // Every stage ran, in order
    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Features,
            Stage::Filter,
            Stage::Train,
            Stage::Backtest,
            Stage::Score,
            Stage::Visualize
        ]
    );

    // The file without an average delay column was skipped, the rest loaded
    let feature_skips: Vec<_> = report.skips_for(Stage::Features).collect();
    assert_eq!(feature_skips.len(), 1);
    assert_eq!(feature_skips[0].subject, "2025_01.csv");

    // BARRA stays in the cleaned dataset but never reaches training
    let cleaned = CleanedDataset::load(&config.paths.cleaned_dataset()).unwrap();
    assert_eq!(cleaned.airports(), vec!["BARRA", "BRISTOL", "LUTON"]);
    let forecasts = load_forecasts(&config.paths.forecasts()).unwrap();
    assert!(forecasts.iter().all(|f| f.airport != "BARRA"));

    let service = ForecastService::open(&config.paths).unwrap();
    assert_eq!(service.airports(), vec!["BRISTOL", "LUTON"]);
    assert!(matches!(service.forecast("barra", 1), Err(ForecastError::NotFound(_))));

    // Baseline horizon 1 repeats the last observed month exactly
    let last = first_month().plus(23);
    let baseline = forecasts
        .iter()
        .find(|f| f.airport == "LUTON" && f.model == ModelKind::Baseline && f.horizon == 1)
        .unwrap();
    assert_eq!(baseline.predicted_avg_delay, rising(23));
    assert_eq!(baseline.forecast_month, last.plus(1));

    let h2 = service.forecast("luton", 2).unwrap();
    assert_eq!(h2.horizon, 2);
    assert_eq!(h2.last_observed, last);
    assert_eq!(h2.forecast_month, YearMonth::new(2025, 2).unwrap());

    let answer = serde_json::to_value(h2.response()).unwrap();
    assert_eq!(answer["last_observed_month"], "2024-12-01");
    assert_eq!(answer["forecast_month"], "2025-02-01");
    assert_eq!(answer["horizon"], 2);
    assert_eq!(answer["model_used"], h2.model_name.as_str());
    assert!(answer["predicted_avg_delay_minutes"].is_f64());

    for file in [
        config.paths.filtered_dataset(),
        config.paths.excluded_airports(),
        config.paths.model_artifacts(),
        config.paths.booster(),
        config.paths.backtest_predictions(),
        config.paths.run_report(),
        config.paths.processed_dir.join("model_scores.csv"),
        config.paths.processed_dir.join("best_models.csv"),
    ] {
        assert!(file.exists(), "missing {}", file.display());
    }

    // Figures either render or are recorded as skipped
    let figures = service.report_figures().unwrap();
    let visual = report
        .stages
        .iter()
        .find(|s| s.stage == Stage::Visualize)
        .unwrap();
    assert_eq!(figures.len(), visual.produced);
    // forecast charts for both airports, six fixed charts, one trend, the comparison
    assert_eq!(visual.produced + visual.skipped, 10);
}

#[test]
fn test_rerun_on_same_inputs_is_identical() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    write_raw_reports(&config.paths.raw_dir);

    let mut pipeline = Pipeline::new(config.clone());
    pipeline.build_features().unwrap();
    let first = pipeline.filter_history().unwrap();
    let first_forecasts = pipeline.train().unwrap();

    let mut again = Pipeline::new(config.clone());
    again.build_features().unwrap();
    let second = again.filter_history().unwrap();
    let second_forecasts = again.train().unwrap();

    assert_eq!(first.dataset, second.dataset);
    assert_eq!(first.excluded, second.excluded);
    assert_eq!(first_forecasts, second_forecasts);
}

#[test]
fn test_no_raw_files_halts() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.paths.raw_dir).unwrap();

    let result = Pipeline::new(config.clone()).run_all();
    assert!(matches!(result, Err(ForecastError::Systemic(_))));
    // The report is still written for diagnosis
    assert!(config.paths.run_report().exists());
}
