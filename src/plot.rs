//! Scatter plots with the fitted regression line.
//!
//! Each regression is rendered twice from the same drawing code: a PNG for
//! quick viewing and an SVG as the vector copy for reports.

use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};

use crate::analysis::regression::LinearFit;
use crate::logging::{self, Stage};

const PLOT_SIZE: (u32, u32) = (800, 600);

/// Axis labels and title of one regression plot.
#[derive(Debug, Clone)]
pub struct PlotLabels {
    pub title: String,
    pub x: String,
    pub y: String,
}

/// Padded `(min, max)` axis range for a series.
///
/// An empty series gets `0..1`; a constant one is widened by one unit on
/// each side so the chart still has extent.
pub fn plot_bounds(values: &[f64]) -> (f64, f64) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return (0.0, 1.0);
    }
    if min == max {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

fn draw_regression<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    xs: &[f64],
    ys: &[f64],
    fit: &LinearFit,
    labels: &PlotLabels,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let (min_x, max_x) = plot_bounds(xs);
    let line_ends = [fit.predict(min_x), fit.predict(max_x)];
    let (min_y, max_y) = plot_bounds(&[ys, &line_ends[..]].concat());

    root.fill(&WHITE)?;
    let caption = format!(
        "{} (slope={:.3}, intercept={:.3}, p={:.4})",
        labels.title, fit.slope, fit.intercept, fit.p_value
    );
    let mut chart = ChartBuilder::on(root)
        .margin(25)
        .caption(caption, ("sans-serif", 18))
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(min_x..max_x, min_y..max_y)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .draw()?;

    chart.draw_series(
        xs.iter()
            .zip(ys)
            .map(|(&x, &y)| Circle::new((x, y), 4, BLUE.filled())),
    )?;
    chart.draw_series(LineSeries::new(
        vec![(min_x, line_ends[0]), (max_x, line_ends[1])],
        RED.stroke_width(2),
    ))?;

    root.present()?;
    Ok(())
}

/// Render `<stem>.png` and `<stem>.svg`. Returns the written paths.
pub fn render_regression(
    stem: &Path,
    xs: &[f64],
    ys: &[f64],
    fit: &LinearFit,
    labels: &PlotLabels,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if xs.is_empty() || xs.len() != ys.len() {
        return Err(format!("no paired data for plot '{}'", labels.title).into());
    }

    let png = stem.with_extension("png");
    {
        let root = BitMapBackend::new(&png, PLOT_SIZE).into_drawing_area();
        draw_regression(&root, xs, ys, fit, labels)?;
    }

    let svg = stem.with_extension("svg");
    {
        let root = SVGBackend::new(&svg, PLOT_SIZE).into_drawing_area();
        draw_regression(&root, xs, ys, fit, labels)?;
    }

    for path in [&png, &svg] {
        logging::info(Stage::Plot, None, &format!("Plot saved: {}", path.display()));
    }
    Ok(vec![png, svg])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_padded() {
        let (lo, hi) = plot_bounds(&[1.0, 3.0, 2.0]);
        assert!((lo - 0.9).abs() < 1e-12);
        assert!((hi - 3.1).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_bounds_still_have_extent() {
        assert_eq!(plot_bounds(&[]), (0.0, 1.0));
        assert_eq!(plot_bounds(&[f64::NAN]), (0.0, 1.0));
        assert_eq!(plot_bounds(&[2.0, 2.0]), (1.0, 3.0));
    }

    #[test]
    fn test_render_writes_png_and_svg() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.1, 5.9, 8.2];
        let fit = crate::analysis::regression::linear_regression(&xs, &ys).unwrap();
        let labels = PlotLabels {
            title: "okres: incidence vs radon_average".into(),
            x: "radon".into(),
            y: "incidence".into(),
        };
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("regression_okres_radon_average");

        let written = render_regression(&stem, &xs, &ys, &fit, &labels).unwrap();
        assert_eq!(written, vec![stem.with_extension("png"), stem.with_extension("svg")]);
        for path in &written {
            let size = std::fs::metadata(path).unwrap().len();
            assert!(size > 0, "{} is empty", path.display());
        }
        let svg = std::fs::read_to_string(stem.with_extension("svg")).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_render_rejects_empty_input() {
        let fit = LinearFit {
            slope: 1.0,
            intercept: 0.0,
            r_value: 1.0,
            p_value: 0.0,
            std_err: 0.0,
            n: 0,
        };
        let labels = PlotLabels {
            title: "empty".into(),
            x: "x".into(),
            y: "y".into(),
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(render_regression(&dir.path().join("p"), &[], &[], &fit, &labels).is_err());
    }
}
