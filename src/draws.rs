//! Module for visualizing the performance of a backtest.

use chrono::{DateTime, Duration, Utc};
use plotters::backend::{BitMapBackend, DrawingBackend, SVGBackend};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::WHITE;

use crate::errors::{Error, Result};
use crate::metrics::Performance;

/// Size of the X-axis labels.
const X_LABEL_SIZE: i32 = 20;
/// Size of the Y-axis labels.
const Y_LABEL_SIZE: i32 = 20;

/// Output formats for the generated charts with output filename.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOutput {
    /// Save to the output SVG file.
    Svg(String),
    /// Save to the output PNG file.
    Png(String),
}

impl Default for DrawOutput {
    fn default() -> Self {
        Self::Svg("performance.svg".to_owned())
    }
}

/// Configuration options for chart generation.
#[derive(Debug, Clone)]
pub struct DrawOptions {
    /// Chart title.
    title: Option<String>,
    /// Output format and path.
    output: DrawOutput,
    /// Width and height in pixels.
    size: (u32, u32),
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            title: None,
            output: DrawOutput::default(),
            size: (1280, 960),
        }
    }
}

impl DrawOptions {
    /// Sets the chart title.
    pub fn title(mut self, title: impl ToString) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Sets the output format and path.
    pub fn draw_output(mut self, output: DrawOutput) -> Self {
        self.output = output;
        self
    }

    /// Sets the size of the image in pixels.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }
}

/// Chart drawing utility: portfolio value above, volatility below.
pub struct Draw<'d> {
    /// Reference to the performance record.
    performance: &'d Performance,
    /// Drawing options.
    options: DrawOptions,
}

impl<'d> Draw<'d> {
    /// Creates a new `Draw` instance with the given performance record.
    pub fn with_performance(performance: &'d Performance) -> Self {
        Self {
            performance,
            options: DrawOptions::default(),
        }
    }

    /// Sets the drawing options.
    pub fn with_options(mut self, options: DrawOptions) -> Self {
        self.options = options;
        self
    }

    /// Generates and saves the chart based on the configured options.
    pub fn plot(&self) -> Result<()> {
        if self.performance.last().is_none() {
            return Err(Error::BarDataEmpty);
        }

        let size = self.options.size;
        match &self.options.output {
            DrawOutput::Svg(path) => {
                let root = SVGBackend::new(path, size).into_drawing_area();
                self.draw_chart(&root)
            }
            DrawOutput::Png(path) => {
                let root = BitMapBackend::new(path, size).into_drawing_area();
                self.draw_chart(&root)
            }
        }
    }

    /// Draws both series, sharing the time axis.
    fn draw_chart<DB: DrawingBackend>(&self, drawing_area: &DrawingArea<DB, Shift>) -> Result<()> {
        drawing_area.fill(&WHITE).map_err(|e| Error::Plotters(e.to_string()))?;

        let title = self.options.title.as_deref().unwrap_or("Arbitrage backtest");
        let drawing_area = drawing_area
            .titled(title, ("sans-serif", 30).into_font())
            .map_err(|e| Error::Plotters(e.to_string()))?;

        let half = drawing_area.dim_in_pixel().1 / 2;
        let (value_area, volatility_area) = drawing_area.split_vertically(half);

        let values = self.performance.portfolio_value().collect::<Vec<_>>();
        let volatility = self.performance.algo_volatility().collect::<Vec<_>>();
        let time_range = time_range(&values)?;

        self.draw_series(&value_area, &values, time_range.clone(), "portfolio value", &BLUE)?;
        self.draw_series(&volatility_area, &volatility, time_range, "Volatility", &RED)?;

        drawing_area.present().map_err(|e| Error::Plotters(e.to_string()))
    }

    /// Draws one line series.
    fn draw_series<DB: DrawingBackend>(
        &self,
        drawing_area: &DrawingArea<DB, Shift>,
        series: &[(DateTime<Utc>, f64)],
        time_range: std::ops::Range<DateTime<Utc>>,
        y_desc: &str,
        color: &RGBColor,
    ) -> Result<()> {
        let min = series.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let max = series.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        let padding = if max > min { (max - min) * 0.1 } else { min.abs().max(1.0) * 0.01 };

        let drawing_area = drawing_area.margin(10, 10, 20, 40);
        let mut chart = ChartBuilder::on(&drawing_area)
            .x_label_area_size(X_LABEL_SIZE * 2)
            .y_label_area_size(Y_LABEL_SIZE * 4)
            .build_cartesian_2d(time_range, min - padding..max + padding)
            .map_err(|e| Error::Plotters(e.to_string()))?;

        chart
            .configure_mesh()
            .y_desc(y_desc)
            .x_desc("Time")
            .x_label_style(("sans-serif", X_LABEL_SIZE))
            .y_label_style(("sans-serif", Y_LABEL_SIZE))
            .x_labels(6)
            .y_labels(5)
            .draw()
            .map_err(|e| Error::Plotters(e.to_string()))?;

        chart
            .draw_series(LineSeries::new(series.iter().copied(), color))
            .map(|_| ())
            .map_err(|e| Error::Plotters(e.to_string()))
    }
}

/// Time span covered by `series`, widened to one minute when it has a single point.
fn time_range(series: &[(DateTime<Utc>, f64)]) -> Result<std::ops::Range<DateTime<Utc>>> {
    let first = series.first().ok_or(Error::BarDataEmpty)?.0;
    let last = series.last().ok_or(Error::BarDataEmpty)?.0;
    if last > first {
        Ok(first..last)
    } else {
        Ok(first..first + Duration::minutes(1))
    }
}
