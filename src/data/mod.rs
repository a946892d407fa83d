//! Data module - CSV loading, coercion and series building

pub mod calendar;
mod coerce;
mod columns;
mod loader;
pub mod preprocess;
mod processor;
mod session;

use polars::prelude::PolarsError;
use thiserror::Error;

pub use coerce::{coerce, parse_number, CoercionWarning, Coerced, FieldKind, FieldSpec, Parsed};
pub use columns::{date_values, numeric_values, require_columns, text_values, XValue};
pub use loader::{DataLoader, LoadError, LoadedTables, TableError, TableSource};
pub use processor::{SeriesBuilder, SeriesPoint};
pub use session::{LoadEvent, LoadSession};

/// A table does not carry a column its consumer depends on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}
