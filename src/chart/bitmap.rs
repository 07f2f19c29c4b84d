//! PNG renderer built on the `plotters` bitmap backend
//!
//! The x axis is a month index (`year * 12 + month - 1`) with major ticks
//! bound to the months selected by [`TickGranularity`]. The y axis starts at
//! 0 mm and reaches at least 250 mm so charts of dry and wet stations compare
//! at a glance.

use super::{ChartRenderer, RenderError, RenderRequest};
use chrono::NaiveDate;
use plotters::prelude::*;

const DEFAULT_WIDTH: u32 = 1800;
const DEFAULT_HEIGHT: u32 = 900;
const MIN_Y_TOP_MM: f64 = 250.0;
const PALETTE: [RGBColor; 2] = [BLUE, RED];

/// Renders line-and-marker charts into PNG files
#[derive(Debug, Clone)]
pub struct BitmapRenderer {
    width: u32,
    height: u32,
}

impl Default for BitmapRenderer {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl BitmapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom image size in pixels
    pub fn with_size(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl ChartRenderer for BitmapRenderer {
    fn render(&self, request: &RenderRequest) -> Result<(), RenderError> {
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let root = BitMapBackend::new(&request.output, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        let first = request.range.start * 12;
        let last = request.range.end.max(request.range.start) * 12 + 11;
        let key_points: Vec<i32> = (first..=last)
            .filter(|m| request.ticks.is_tick(m.rem_euclid(12) as u32 + 1))
            .collect();

        let y_top = request
            .series
            .iter()
            .flat_map(|s| s.samples.iter())
            .map(|s| s.depth_mm * 1.05)
            .fold(MIN_Y_TOP_MM, f64::max);

        let mut chart = ChartBuilder::on(&root)
            .caption(&request.title, ("sans-serif", 28).into_font())
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d((first..last + 1).with_key_points(key_points), 0f64..y_top)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .x_label_formatter(&|m: &i32| month_label(*m))
            .x_desc("Date")
            .y_desc("Hauteur de pluie mesurée (en mm)")
            .draw()
            .map_err(draw_error)?;

        for (series, color) in request.series.iter().zip(PALETTE.iter().cycle()) {
            let color = *color;
            let points: Vec<(i32, f64)> = series
                .samples
                .iter()
                .map(|s| (s.month_index(), s.depth_mm))
                .collect();

            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(1)))
                .map_err(draw_error)?
                .label(series.label.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });

            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))
                .map_err(draw_error)?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_error)?;

        root.present().map_err(draw_error)?;

        tracing::debug!(output = ?request.output, series = request.series.len(), "Rendered chart");
        Ok(())
    }
}

/// `March 2012` style label for a month index
fn month_label(index: i32) -> String {
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;

    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_default()
}

fn draw_error<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Draw(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{LabeledSeries, TickGranularity};
    use crate::series::{MonthlySample, YearRange};

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(2012 * 12 + 2), "March 2012");
        assert_eq!(month_label(2018 * 12), "January 2018");
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("courbes").join("chart.png");
        let range = YearRange::new(2012, 2014);

        let samples = |scale: f64| -> Vec<MonthlySample> {
            (2012..=2014)
                .flat_map(|year| (1..=12).map(move |month| (year, month)))
                .map(|(year, month)| MonthlySample {
                    year,
                    month,
                    depth_mm: scale * month as f64,
                })
                .collect()
        };

        let request = RenderRequest {
            title: "Pluviométrie Bron - Vaulx".to_string(),
            series: vec![
                LabeledSeries::new("Bron", samples(10.0)),
                LabeledSeries::new("Vaulx", samples(30.0)),
            ],
            range,
            ticks: TickGranularity::for_range(range),
            output: output.clone(),
        };

        BitmapRenderer::with_size(600, 300).render(&request).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    }
}
