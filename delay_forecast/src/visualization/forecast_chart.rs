use super::{caption_font, padded_range, render_png, Canvas, DrawResult};
use crate::error::{ForecastError, Result};
use crate::models::ModelKind;
use crate::month::YearMonth;
use crate::serving::ForecastResult;
use plotters::prelude::*;
use std::path::Path;

/// Recent observations followed by forecasts and their 95% band
#[derive(Debug, Clone)]
pub struct ForecastChart {
    airport: String,
    model: ModelKind,
    history: Vec<(YearMonth, f64)>,
    steps: Vec<ForecastResult>,
}

impl ForecastChart {
    pub fn new(
        airport: &str,
        model: ModelKind,
        history: Vec<(YearMonth, f64)>,
        steps: Vec<ForecastResult>,
    ) -> Self {
        Self {
            airport: airport.to_string(),
            model,
            history,
            steps,
        }
    }

    pub fn render(&self, path: &Path) -> Result<()> {
        if self.steps.is_empty() {
            return Err(ForecastError::render(
                path.display().to_string(),
                format!("no forecasts for {}", self.airport),
            ));
        }
        render_png(path, |root| self.draw(root))
    }

    fn band(&self) -> Vec<(i32, f64, f64)> {
        self.steps
            .iter()
            .filter_map(|s| match (s.lower_95, s.upper_95) {
                (Some(lo), Some(hi)) => Some((s.forecast_month.ordinal(), lo, hi)),
                _ => None,
            })
            .collect()
    }

    fn draw(&self, root: &Canvas) -> DrawResult {
        let band = self.band();
        let first = self
            .history
            .first()
            .map(|(m, _)| m.ordinal())
            .unwrap_or_else(|| self.steps[0].forecast_month.ordinal());
        let last = self
            .steps
            .last()
            .map(|s| s.forecast_month.ordinal())
            .unwrap_or(first)
            .max(first + 1);

        let values = self
            .history
            .iter()
            .map(|(_, v)| *v)
            .chain(self.steps.iter().map(|s| s.predicted_avg_delay))
            .chain(band.iter().flat_map(|(_, lo, hi)| [*lo, *hi]));
        let (y_lo, y_hi) = padded_range(values).ok_or("no finite values to plot")?;

        let model_name = self
            .steps
            .first()
            .map(|s| s.model_name.as_str())
            .unwrap_or(self.model.as_str());
        let mut chart = ChartBuilder::on(root)
            .caption(
                format!("{}: forecast ({})", self.airport, model_name),
                caption_font(),
            )
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

        if band.len() > 1 {
            let polygon: Vec<(i32, f64)> = band
                .iter()
                .map(|(x, _, hi)| (*x, *hi))
                .chain(band.iter().rev().map(|(x, lo, _)| (*x, *lo)))
                .collect();
            chart
                .draw_series(std::iter::once(Polygon::new(polygon, RED.mix(0.15))))?
                .label("95% interval")
                .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], RED.mix(0.15).filled()));
        } else {
            chart.draw_series(band.iter().map(|(x, lo, hi)| {
                PathElement::new(vec![(*x, *lo), (*x, *hi)], RED.mix(0.4).stroke_width(3))
            }))?;
        }

        let observed: Vec<(i32, f64)> = self.history.iter().map(|(m, v)| (m.ordinal(), *v)).collect();
        chart
            .draw_series(LineSeries::new(observed.iter().copied(), BLUE.stroke_width(2)))?
            .label("Actual")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
        chart.draw_series(observed.iter().map(|p| Circle::new(*p, 3, BLUE.filled())))?;

        // Join the forecast line to the last observation
        let predicted: Vec<(i32, f64)> = observed
            .last()
            .copied()
            .into_iter()
            .chain(
                self.steps
                    .iter()
                    .map(|s| (s.forecast_month.ordinal(), s.predicted_avg_delay)),
            )
            .collect();
        chart
            .draw_series(LineSeries::new(predicted.iter().copied(), RED.stroke_width(2)))?
            .label("Forecast")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
        chart.draw_series(
            self.steps
                .iter()
                .map(|s| Circle::new((s.forecast_month.ordinal(), s.predicted_avg_delay), 4, RED.filled())),
        )?;

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        Ok(())
    }
}
