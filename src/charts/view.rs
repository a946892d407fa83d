//! Chart view models handed to the renderer. They hold only derived,
//! validated data and the scales computed for this render.

use super::scale::{BandScale, LinearScale};
use crate::data::{SeriesPoint, XValue};
use chrono::NaiveDate;

/// One line of a line chart.
#[derive(Debug, Clone, PartialEq)]
pub struct LineTrace {
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

/// Intervention drawn on top of a case curve.
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionMarker {
    pub x: XValue,
    pub y: f64,
    pub measure: String,
    pub category: String,
    pub stringency: Option<f64>,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub traces: Vec<LineTrace>,
    pub markers: Vec<InterventionMarker>,
    /// Legend entries for marker colors, in color order.
    pub marker_legend: Vec<String>,
    pub x_scale: LinearScale,
    pub y_scale: LinearScale,
    pub x_is_date: bool,
}

/// Side-by-side bars per category, one bar per group.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub y_label: String,
    pub bands: BandScale,
    pub groups: Vec<String>,
    /// `values[category][group]`
    pub values: Vec<Vec<f64>>,
    pub y_scale: LinearScale,
}

/// Normalized case/death bars per date with a stringency line on a
/// secondary axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionChart {
    pub title: String,
    pub dates: Vec<NaiveDate>,
    pub cases: Vec<f64>,
    pub deaths: Vec<f64>,
    pub stringency: Vec<Option<f64>>,
    pub bands: BandScale,
    pub y_scale: LinearScale,
    pub stringency_scale: LinearScale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartView {
    Line(LineChart),
    Bars(BarChart),
    Progression(ProgressionChart),
    /// The selection matched no rows; rendered as an explicit message.
    NoData { title: String, reason: String },
}

impl ChartView {
    pub fn title(&self) -> &str {
        match self {
            ChartView::Line(c) => &c.title,
            ChartView::Bars(c) => &c.title,
            ChartView::Progression(c) => &c.title,
            ChartView::NoData { title, .. } => title,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ChartView::NoData { .. })
    }
}
