//! Chart Plotter Module
//! Draws chart views to PNG or SVG files with plotters.

use super::scale::{format_count, BandScale};
use super::view::{BarChart, ChartView, LineChart, ProgressionChart};
use super::{ChartError, ImageFormat};
use crate::data::calendar::from_days_since_epoch;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use tracing::info;

/// Series colors, cycled by series index.
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

const STRINGENCY_COLOR: RGBColor = RGBColor(44, 62, 80);
const MUTED: RGBColor = RGBColor(120, 120, 120);
const FONT: &str = "sans-serif";

pub fn series_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// `{page}_{country}_{index}.{ext}` with the country reduced to a safe
/// file-name fragment.
pub fn output_file_name(page: &str, country: Option<&str>, index: usize, format: ImageFormat) -> String {
    let country: String = country
        .unwrap_or("all")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{page}_{country}_{index}.{}", format.extension())
}

/// Renders chart views as static images.
pub struct ChartPlotter;

impl ChartPlotter {
    pub fn render(
        view: &ChartView,
        path: &Path,
        size: (u32, u32),
        format: ImageFormat,
    ) -> Result<(), ChartError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match format {
            ImageFormat::Png => {
                let root = BitMapBackend::new(path, size).into_drawing_area();
                Self::draw(&root, view)?;
                root.present()?;
            }
            ImageFormat::Svg => {
                let root = SVGBackend::new(path, size).into_drawing_area();
                Self::draw(&root, view)?;
                root.present()?;
            }
        }

        info!(path = %path.display(), title = view.title(), "chart written");
        Ok(())
    }

    /// Draw `view` onto any backend.
    pub fn draw<DB>(root: &DrawingArea<DB, Shift>, view: &ChartView) -> Result<(), ChartError>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        match view {
            ChartView::Line(chart) => Self::draw_line_chart(root, chart),
            ChartView::Bars(chart) => Self::draw_bar_chart(root, chart),
            ChartView::Progression(chart) => Self::draw_progression_chart(root, chart),
            ChartView::NoData { title, reason } => Self::draw_message(root, title, reason),
        }
    }

    fn draw_message<DB>(root: &DrawingArea<DB, Shift>, title: &str, reason: &str) -> Result<(), ChartError>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let area = root.titled(title, (FONT, 22))?;
        let (w, h) = area.dim_in_pixel();
        let style = TextStyle::from((FONT, 18).into_font())
            .color(&MUTED)
            .pos(Pos::new(HPos::Center, VPos::Center));
        area.draw(&Text::new(reason.to_string(), (w as i32 / 2, h as i32 / 2), style))?;
        Ok(())
    }

    fn draw_line_chart<DB>(root: &DrawingArea<DB, Shift>, view: &LineChart) -> Result<(), ChartError>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let (x0, x1) = view.x_scale.domain();
        let (y0, y1) = view.y_scale.domain();

        let mut chart = ChartBuilder::on(root)
            .caption(&view.title, (FONT, 22))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        let is_date = view.x_is_date;
        let x_format = |v: &f64| {
            if is_date {
                from_days_since_epoch(v.round() as i32)
                    .map(|d| d.format("%b %Y").to_string())
                    .unwrap_or_default()
            } else {
                format!("{v:.0}")
            }
        };

        chart
            .configure_mesh()
            .x_desc(&view.x_label)
            .y_desc(&view.y_label)
            .x_label_formatter(&x_format)
            .y_label_formatter(&|v| format_count(*v))
            .label_style((FONT, 14))
            .draw()?;

        for (i, trace) in view.traces.iter().enumerate() {
            let color = series_color(i);
            chart
                .draw_series(LineSeries::new(
                    trace.points.iter().map(|p| (p.x.as_f64(), p.y)),
                    color.stroke_width(2),
                ))?
                .label(trace.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        // marker colors follow the legend order, after the trace colors
        let offset = view.traces.len();
        for (i, measure) in view.marker_legend.iter().enumerate() {
            let color = series_color(offset + i);
            chart
                .draw_series(
                    view.markers
                        .iter()
                        .filter(|m| &m.measure == measure)
                        .map(|m| Circle::new((m.x.as_f64(), m.y), 6, color.filled())),
                )?
                .label(measure.as_str())
                .legend(move |(x, y)| Circle::new((x + 10, y), 5, color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK.mix(0.3))
            .label_font((FONT, 14))
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
        Ok(())
    }

    fn draw_bar_chart<DB>(root: &DrawingArea<DB, Shift>, view: &BarChart) -> Result<(), ChartError>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let n = view.bands.labels().len() as f64;
        let (y0, y1) = view.y_scale.domain();

        let mut chart = ChartBuilder::on(root)
            .caption(&view.title, (FONT, 22))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0.0..n.max(1.0), y0..y1)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc(&view.y_label)
            .x_label_formatter(&|_| String::new())
            .y_label_formatter(&|v| format_count(*v))
            .label_style((FONT, 14))
            .draw()?;

        let width = view.bands.bandwidth() / view.groups.len().max(1) as f64;
        for (g, group) in view.groups.iter().enumerate() {
            let color = series_color(g);
            chart
                .draw_series(view.values.iter().enumerate().filter_map(|(i, row)| {
                    let value = *row.get(g)?;
                    let left = view.bands.start(i) + width * g as f64;
                    Some(Rectangle::new([(left, 0.0), (left + width, value)], color.filled()))
                }))?
                .label(group.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK.mix(0.3))
            .label_font((FONT, 14))
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;

        let anchors = band_label_anchors(&view.bands, 1, |x| chart.backend_coord(&(x, y0)));
        draw_band_labels(root, anchors)
    }

    fn draw_progression_chart<DB>(
        root: &DrawingArea<DB, Shift>,
        view: &ProgressionChart,
    ) -> Result<(), ChartError>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let n = view.dates.len() as f64;
        let (y0, y1) = view.y_scale.domain();
        let (s0, s1) = view.stringency_scale.domain();

        let mut chart = ChartBuilder::on(root)
            .caption(&view.title, (FONT, 22))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .right_y_label_area_size(70)
            .build_cartesian_2d(0.0..n.max(1.0), y0..y1)?
            .set_secondary_coord(0.0..n.max(1.0), s0..s1);

        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc("Normalized Count (0-100)")
            .x_label_formatter(&|_| String::new())
            .label_style((FONT, 14))
            .draw()?;
        chart
            .configure_secondary_axes()
            .y_desc("Stringency Index")
            .label_style((FONT, 14))
            .draw()?;

        let width = view.bands.bandwidth() / 2.0;
        for (g, (label, values)) in [("Cases", &view.cases), ("Deaths", &view.deaths)]
            .into_iter()
            .enumerate()
        {
            let color = series_color(g);
            chart
                .draw_series(values.iter().enumerate().map(|(i, value)| {
                    let left = view.bands.start(i) + width * g as f64;
                    Rectangle::new([(left, 0.0), (left + width, *value)], color.filled())
                }))?
                .label(label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }

        let center = view.bands.bandwidth() / 2.0;
        chart
            .draw_secondary_series(LineSeries::new(
                view.stringency
                    .iter()
                    .enumerate()
                    .filter_map(|(i, s)| s.map(|s| (view.bands.start(i) + center, s))),
                STRINGENCY_COLOR.stroke_width(2),
            ))?
            .label("Stringency Index")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], STRINGENCY_COLOR.stroke_width(2)));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK.mix(0.3))
            .label_font((FONT, 14))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()?;

        // at most a dozen month labels
        let step = view.dates.len().div_ceil(12).max(1);
        let anchors = band_label_anchors(&view.bands, step, |x| chart.backend_coord(&(x, y0)));
        draw_band_labels(root, anchors)
    }
}

/// Pixel anchor under the center of every `step`-th band.
fn band_label_anchors(
    bands: &BandScale,
    step: usize,
    to_pixel: impl Fn(f64) -> (i32, i32),
) -> Vec<(String, (i32, i32))> {
    let center = bands.bandwidth() / 2.0;
    bands
        .labels()
        .iter()
        .enumerate()
        .step_by(step)
        .map(|(i, label)| (label.clone(), to_pixel(bands.start(i) + center)))
        .collect()
}

fn draw_band_labels<DB>(
    root: &DrawingArea<DB, Shift>,
    anchors: Vec<(String, (i32, i32))>,
) -> Result<(), ChartError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let style = TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Top));
    for (label, (x, y)) in anchors {
        root.draw(&Text::new(label, (x, y + 6), style.clone()))?;
    }
    Ok(())
}
