//! Exploratory charts over the cleaned dataset and backtest scores

use super::{caption_font, padded_range, render_png, Canvas, DrawResult};
use crate::data::{CleanedDataset, CleanedRecord};
use crate::error::{ForecastError, Result};
use crate::models::ModelKind;
use crate::month::YearMonth;
use crate::scores::ScoreTable;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

fn rgb(color: colorous::Color) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

fn model_color(model: ModelKind) -> RGBColor {
    let index = ModelKind::ALL.iter().position(|m| *m == model).unwrap_or(0);
    rgb(colorous::CATEGORY10[index % colorous::CATEGORY10.len()])
}

fn nothing_to_draw(path: &Path, what: &str) -> ForecastError {
    let chart = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ForecastError::render(chart, format!("no {} to plot", what))
}

/// Mean average delay per airport, highest first
pub(crate) fn mean_delay_by_airport(dataset: &CleanedDataset) -> Vec<(String, f64)> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in dataset.records() {
        let entry = sums.entry(r.airport.as_str()).or_insert((0.0, 0));
        entry.0 += r.avg_delay;
        entry.1 += 1;
    }
    let mut means: Vec<(String, f64)> = sums
        .into_iter()
        .map(|(airport, (sum, n))| (airport.to_string(), sum / n as f64))
        .collect();
    means.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    means
}

pub(crate) fn top_airports(path: &Path, dataset: &CleanedDataset, top_n: usize) -> Result<()> {
    let mut means = mean_delay_by_airport(dataset);
    means.truncate(top_n);
    if means.is_empty() {
        return Err(nothing_to_draw(path, "airports"));
    }
    // Largest bar on top
    means.reverse();
    render_png(path, |root| draw_top_airports(root, &means, top_n))
}

fn draw_top_airports(root: &Canvas, means: &[(String, f64)], top_n: usize) -> DrawResult {
    let n = means.len() as u32;
    let max = means.iter().map(|(_, v)| *v).fold(0.0, f64::max).max(1.0);

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("Top {} airports by mean average delay", top_n),
            caption_font(),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(200)
        .build_cartesian_2d(0.0..max * 1.1, (0u32..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(means.len())
        .y_label_formatter(&|y| match y {
            SegmentValue::CenterOf(i) => means
                .get(*i as usize)
                .map(|(airport, _)| airport.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc("Mean average delay (min)")
        .draw()?;

    let fill = rgb(colorous::CATEGORY10[0]);
    chart.draw_series(means.iter().enumerate().map(|(i, (_, value))| {
        let i = i as u32;
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(i)), (*value, SegmentValue::Exact(i + 1))],
            fill.filled(),
        );
        bar.set_margin(3, 3, 0, 0);
        bar
    }))?;
    Ok(())
}

pub(crate) fn heatmap(path: &Path, dataset: &CleanedDataset) -> Result<()> {
    let airports: Vec<String> = mean_delay_by_airport(dataset)
        .into_iter()
        .map(|(airport, _)| airport)
        .collect();
    let months = dataset.months();
    let (Some(first), Some(last)) = (months.first().copied(), months.last().copied()) else {
        return Err(nothing_to_draw(path, "months"));
    };
    render_png(path, |root| draw_heatmap(root, dataset, &airports, first, last))
}

fn draw_heatmap(
    root: &Canvas,
    dataset: &CleanedDataset,
    airports: &[String],
    first: YearMonth,
    last: YearMonth,
) -> DrawResult {
    let rows: BTreeMap<&str, u32> = airports
        .iter()
        .enumerate()
        .map(|(i, a)| (a.as_str(), i as u32))
        .collect();
    let (lo, hi) = dataset
        .records()
        .iter()
        .map(|r| r.avg_delay)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = (hi - lo).max(f64::EPSILON);

    let mut chart = ChartBuilder::on(root)
        .caption("Average delay by airport and month", caption_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(200)
        .build_cartesian_2d(
            first.ordinal()..last.ordinal() + 1,
            (0u32..airports.len() as u32).into_segmented(),
        )?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(12)
        .x_label_formatter(&|x| YearMonth::from_ordinal(*x).to_string())
        .y_labels(airports.len())
        .y_label_formatter(&|y| match y {
            SegmentValue::CenterOf(i) => airports.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(dataset.records().iter().filter_map(|r| {
        let row = *rows.get(r.airport.as_str())?;
        let x = r.period.ordinal();
        let shade = rgb(colorous::VIRIDIS.eval_continuous((r.avg_delay - lo) / span));
        Some(Rectangle::new(
            [(x, SegmentValue::Exact(row)), (x + 1, SegmentValue::Exact(row + 1))],
            shade.filled(),
        ))
    }))?;
    Ok(())
}

/// Observed delays of one airport, oldest first
fn delay_line(dataset: &CleanedDataset, airport: &str) -> Option<Vec<(i32, f64)>> {
    let series = dataset.series(&airport.trim().to_uppercase())?;
    Some(
        series
            .records()
            .iter()
            .map(|r| (r.period.ordinal(), r.avg_delay))
            .collect(),
    )
}

fn month_bounds(lines: &[(String, Vec<(i32, f64)>)]) -> Option<(i32, i32)> {
    let xs = lines.iter().flat_map(|(_, points)| points.iter().map(|(x, _)| *x));
    let (lo, hi) = xs.fold(None, |acc: Option<(i32, i32)>, x| match acc {
        None => Some((x, x)),
        Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
    })?;
    Some((lo, hi.max(lo + 1)))
}

pub(crate) fn multi_trends(path: &Path, dataset: &CleanedDataset, airports: &[String]) -> Result<()> {
    let lines: Vec<(String, Vec<(i32, f64)>)> = airports
        .iter()
        .filter_map(|a| delay_line(dataset, a).map(|line| (a.trim().to_uppercase(), line)))
        .collect();
    if lines.is_empty() {
        return Err(nothing_to_draw(path, "configured airports"));
    }
    render_png(path, |root| {
        draw_lines(root, "Average delay trends", &lines)
    })
}

pub(crate) fn airport_trend(path: &Path, dataset: &CleanedDataset, airport: &str) -> Result<()> {
    let Some(line) = delay_line(dataset, airport) else {
        return Err(nothing_to_draw(path, &format!("months for {}", airport)));
    };
    let name = airport.trim().to_uppercase();
    let caption = format!("{}: monthly average delay", name);
    let lines = vec![(name, line)];
    render_png(path, |root| draw_lines(root, &caption, &lines))
}

fn draw_lines(root: &Canvas, caption: &str, lines: &[(String, Vec<(i32, f64)>)]) -> DrawResult {
    let (first, last) = month_bounds(lines).ok_or("no months to plot")?;
    let (y_lo, y_hi) = padded_range(lines.iter().flat_map(|(_, points)| points.iter().map(|(_, y)| *y)))
        .ok_or("no finite values to plot")?;

    let mut chart = ChartBuilder::on(root)
        .caption(caption, caption_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(first..last, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_labels(12)
        .x_label_formatter(&|x| YearMonth::from_ordinal(*x).to_string())
        .y_desc("Average delay (min)")
        .draw()?;

    let palette = colorous::CATEGORY10;
    for (i, (airport, points)) in lines.iter().enumerate() {
        let color = rgb(palette[i % palette.len()]);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(airport.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

pub(crate) fn lag1_scatter(path: &Path, dataset: &CleanedDataset) -> Result<()> {
    let points: Vec<(f64, f64)> = dataset
        .records()
        .iter()
        .filter_map(|r| r.avg_delay_lag_1.map(|lag| (lag, r.avg_delay)))
        .collect();
    if points.is_empty() {
        return Err(nothing_to_draw(path, "rows with a previous month"));
    }
    render_png(path, |root| {
        draw_scatter(
            root,
            "Actual delay vs previous month (naive baseline)",
            "Previous month average delay (min)",
            &points,
            true,
        )
    })
}

pub(crate) fn delay_scatter(
    path: &Path,
    dataset: &CleanedDataset,
    x_desc: &str,
    x_value: fn(&CleanedRecord) -> f64,
) -> Result<()> {
    let points: Vec<(f64, f64)> = dataset
        .records()
        .iter()
        .map(|r| (x_value(r), r.avg_delay))
        .collect();
    if points.is_empty() {
        return Err(nothing_to_draw(path, "rows"));
    }
    let caption = format!("Average delay vs {}", x_desc.to_lowercase());
    render_png(path, |root| draw_scatter(root, &caption, x_desc, &points, false))
}

fn draw_scatter(
    root: &Canvas,
    caption: &str,
    x_desc: &str,
    points: &[(f64, f64)],
    diagonal: bool,
) -> DrawResult {
    let (x_lo, x_hi) = padded_range(points.iter().map(|p| p.0)).ok_or("no finite x values")?;
    let (y_lo, y_hi) = padded_range(points.iter().map(|p| p.1)).ok_or("no finite y values")?;

    let mut chart = ChartBuilder::on(root)
        .caption(caption, caption_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Average delay (min)")
        .draw()?;

    let dot = rgb(colorous::CATEGORY10[0]);
    chart.draw_series(
        points
            .iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|p| Circle::new(*p, 3, dot.mix(0.5).filled())),
    )?;

    if diagonal {
        let lo = x_lo.max(y_lo);
        let hi = x_hi.min(y_hi);
        if lo < hi {
            chart
                .draw_series(LineSeries::new(vec![(lo, lo), (hi, hi)], BLACK.mix(0.6)))?
                .label("actual = previous month")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
    }
    Ok(())
}

pub(crate) fn model_comparison(path: &Path, scores: &ScoreTable) -> Result<()> {
    let summary = scores.summary();
    if summary.is_empty() {
        return Err(nothing_to_draw(path, "backtest scores"));
    }
    let bars: Vec<(ModelKind, u32, f64)> = summary
        .iter()
        .map(|row| (row.model, row.horizon, row.value))
        .collect();
    render_png(path, |root| draw_model_comparison(root, &bars))
}

fn draw_model_comparison(root: &Canvas, bars: &[(ModelKind, u32, f64)]) -> DrawResult {
    let n = bars.len() as u32;
    let max = bars.iter().map(|b| b.2).fold(0.0, f64::max).max(1.0);

    let mut chart = ChartBuilder::on(root)
        .caption("Mean backtest MAE by model and horizon", caption_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d((0u32..n).into_segmented(), 0.0..max * 1.15)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(i) => bars
                .get(*i as usize)
                .map(|(model, horizon, _)| format!("{} h{}", model, horizon))
                .unwrap_or_default(),
            _ => String::new(),
        })
        .y_desc("Mean absolute error (min)")
        .draw()?;

    for model in ModelKind::ALL {
        let color = model_color(model);
        let series: Vec<(u32, f64)> = bars
            .iter()
            .enumerate()
            .filter(|(_, bar)| bar.0 == model)
            .map(|(i, bar)| (i as u32, bar.2))
            .collect();
        if series.is_empty() {
            continue;
        }
        chart
            .draw_series(series.into_iter().map(|(i, value)| {
                let mut bar = Rectangle::new(
                    [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), value)],
                    color.filled(),
                );
                bar.set_margin(0, 0, 6, 6);
                bar
            }))?
            .label(model.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}
