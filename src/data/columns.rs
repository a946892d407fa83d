//! Column access helpers.
//!
//! Every table operation reads cells through these functions so that text,
//! numeric and date columns are interpreted the same way everywhere. A
//! missing value is always `None`; `NaN` never leaves this module.

use super::calendar::{self, from_days_since_epoch};
use super::coerce::{parse_number, Parsed};
use super::SchemaError;
use chrono::NaiveDate;
use polars::prelude::*;

/// Value on a chart's horizontal axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XValue {
    Number(f64),
    Date(NaiveDate),
}

impl XValue {
    /// Position on a continuous axis; dates map to days since the epoch.
    pub fn as_f64(&self) -> f64 {
        match self {
            XValue::Number(v) => *v,
            XValue::Date(d) => calendar::days_since_epoch(*d) as f64,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            XValue::Date(d) => Some(*d),
            XValue::Number(_) => None,
        }
    }
}

pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Fail with [`SchemaError`] unless every column is present.
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<(), SchemaError> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(SchemaError::MissingColumn((*name).to_string()));
        }
    }
    Ok(())
}

pub fn get_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, SchemaError> {
    df.column(name)
        .map_err(|_| SchemaError::MissingColumn(name.to_string()))
}

/// Cell values rendered as text.
pub fn text_values(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Finite numeric cell values. Text cells are parsed; unparsable cells are
/// treated as missing.
pub fn numeric_values(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    if is_numeric_dtype(column.dtype()) {
        let floats = column.cast(&DataType::Float64)?;
        return Ok(floats
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect());
    }

    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| match parse_number(v) {
            Parsed::Value(x) => Some(x),
            Parsed::Empty | Parsed::Invalid => None,
        })
        .collect())
}

/// Calendar dates of a `Date` column, or of a text column holding fixed
/// dates or year-week keys.
pub fn date_values(column: &Column) -> PolarsResult<Vec<Option<NaiveDate>>> {
    if matches!(column.dtype(), DataType::Date) {
        let days = column.cast(&DataType::Int32)?;
        return Ok(days
            .i32()?
            .into_iter()
            .map(|v| v.and_then(from_days_since_epoch))
            .collect());
    }

    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.and_then(|raw| calendar::parse_time_key(raw).ok()))
        .collect())
}

/// Axis positions: numbers for numeric columns, dates for date columns.
/// Text columns are read as numbers when they parse, otherwise as dates.
pub fn axis_values(column: &Column) -> PolarsResult<Vec<Option<XValue>>> {
    if is_numeric_dtype(column.dtype()) {
        return Ok(numeric_values(column)?
            .into_iter()
            .map(|v| v.map(XValue::Number))
            .collect());
    }
    if matches!(column.dtype(), DataType::Date) {
        return Ok(date_values(column)?
            .into_iter()
            .map(|v| v.map(XValue::Date))
            .collect());
    }

    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| match parse_number(v) {
            Parsed::Value(x) => Some(XValue::Number(x)),
            Parsed::Empty => None,
            Parsed::Invalid => v
                .and_then(|raw| calendar::parse_time_key(raw).ok())
                .map(XValue::Date),
        })
        .collect())
}
