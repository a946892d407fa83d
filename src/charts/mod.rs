//! Charts module - View models, page assembly and static rendering

mod pages;
mod plotter;
mod scale;
mod view;

use crate::data::{ProcessError, TableError};
use plotters::drawing::DrawingAreaErrorKind;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use pages::{
    PageKind, PreparedPage, WaveTotals, CASES_AFTER, CASES_BEFORE, CASES_SUMMARY, DEATHS_AFTER,
    DEATHS_BEFORE, PANDEMIC_DATA, PROGRESSION, RESPONSES,
};
pub use plotter::{output_file_name, series_color, ChartPlotter, PALETTE};
pub use scale::{format_count, BandScale, LinearScale, HEADROOM};
pub use view::{BarChart, ChartView, InterventionMarker, LineChart, LineTrace, ProgressionChart};

#[derive(Error, Debug)]
pub enum ChartError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("render failed: {0}")]
    Render(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Render(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}
