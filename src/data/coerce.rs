//! Type Coercion Module
//! Converts raw text columns into typed columns. A cell that fails to parse
//! becomes a missing value and is reported as a [`CoercionWarning`]; it never
//! aborts the table.

use super::calendar::{self, days_since_epoch};
use super::columns::{get_column, text_values};
use super::ProcessError;
use polars::prelude::*;
use std::fmt;
use tracing::{debug, warn};

/// Target type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Finite floating point number.
    Numeric,
    /// Fixed calendar date, `YYYY-MM-DD`.
    Date,
    /// ISO year-week key (`YYYY-WW`, `YYYY-Www`) or a fixed date.
    YearWeek,
    /// Left as text.
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Numeric => "numeric",
            FieldKind::Date => "date",
            FieldKind::YearWeek => "year-week",
            FieldKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Ordered column-to-type mapping.
#[derive(Debug, Clone, Default)]
pub struct FieldSpec {
    fields: Vec<(String, FieldKind)>,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, column: &str, kind: FieldKind) -> Self {
        self.fields.push((column.to_string(), kind));
        self
    }

    pub fn fields(&self) -> &[(String, FieldKind)] {
        &self.fields
    }
}

/// A cell that could not be parsed as its column's type.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionWarning {
    pub column: String,
    pub row: usize,
    pub raw: String,
    pub expected: FieldKind,
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: '{}' in column '{}' is not {}",
            self.row, self.raw, self.column, self.expected
        )
    }
}

/// Coercion output: the typed copy and every per-cell warning.
#[derive(Debug, Clone)]
pub struct Coerced {
    pub table: DataFrame,
    pub warnings: Vec<CoercionWarning>,
}

/// Outcome of parsing one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed<T> {
    Value(T),
    Empty,
    Invalid,
}

/// Explicit numeric parse. Blank cells are `Empty`; anything that is not a
/// finite number is `Invalid`.
pub fn parse_number(raw: Option<&str>) -> Parsed<f64> {
    let Some(raw) = raw.map(str::trim) else {
        return Parsed::Empty;
    };
    if raw.is_empty() {
        return Parsed::Empty;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Parsed::Value(v),
        _ => Parsed::Invalid,
    }
}

fn parse_calendar(raw: Option<&str>, kind: FieldKind) -> Parsed<i32> {
    let Some(raw) = raw.map(str::trim) else {
        return Parsed::Empty;
    };
    if raw.is_empty() {
        return Parsed::Empty;
    }
    let parsed = match kind {
        FieldKind::Date => calendar::parse_date(raw),
        _ => calendar::parse_time_key(raw),
    };
    match parsed {
        Ok(date) => Parsed::Value(days_since_epoch(date)),
        Err(_) => Parsed::Invalid,
    }
}

/// Apply `spec` to a copy of `table`.
pub fn coerce(table: &DataFrame, spec: &FieldSpec) -> Result<Coerced, ProcessError> {
    let mut out = table.clone();
    let mut warnings = Vec::new();

    for (name, kind) in spec.fields() {
        let raw = text_values(get_column(table, name)?)?;
        let mut invalid = |row: usize, cell: &Option<String>| {
            let warning = CoercionWarning {
                column: name.clone(),
                row,
                raw: cell.clone().unwrap_or_default(),
                expected: *kind,
            };
            debug!(column = %warning.column, row, raw = %warning.raw, "coercion failed");
            warnings.push(warning);
        };

        let column = match kind {
            FieldKind::Numeric => {
                let values: Vec<Option<f64>> = raw
                    .iter()
                    .enumerate()
                    .map(|(row, cell)| match parse_number(cell.as_deref()) {
                        Parsed::Value(v) => Some(v),
                        Parsed::Empty => None,
                        Parsed::Invalid => {
                            invalid(row, cell);
                            None
                        }
                    })
                    .collect();
                Column::new(name.as_str().into(), values)
            }
            FieldKind::Date | FieldKind::YearWeek => {
                let days: Vec<Option<i32>> = raw
                    .iter()
                    .enumerate()
                    .map(|(row, cell)| match parse_calendar(cell.as_deref(), *kind) {
                        Parsed::Value(v) => Some(v),
                        Parsed::Empty => None,
                        Parsed::Invalid => {
                            invalid(row, cell);
                            None
                        }
                    })
                    .collect();
                Column::new(name.as_str().into(), days).cast(&DataType::Date)?
            }
            FieldKind::Text => Column::new(name.as_str().into(), raw),
        };
        out.with_column(column)?;
    }

    if !warnings.is_empty() {
        warn!(
            cells = warnings.len(),
            "some cells could not be coerced and were treated as missing"
        );
    }

    Ok(Coerced {
        table: out,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_table() -> DataFrame {
        df!(
            "country" => ["A", "A", "B"],
            "weekly_count" => ["10", "n/a", ""],
            "year_week" => ["2021-05", "2021-W06", "bad"],
        )
        .unwrap()
    }

    #[test]
    fn parse_number_separates_empty_from_invalid() {
        assert_eq!(parse_number(Some(" 12.5 ")), Parsed::Value(12.5));
        assert_eq!(parse_number(Some("")), Parsed::Empty);
        assert_eq!(parse_number(None), Parsed::Empty);
        assert_eq!(parse_number(Some("abc")), Parsed::Invalid);
        assert_eq!(parse_number(Some("NaN")), Parsed::Invalid);
        assert_eq!(parse_number(Some("inf")), Parsed::Invalid);
    }

    #[test]
    fn numeric_coercion_records_warnings_instead_of_failing() {
        let spec = FieldSpec::new().field("weekly_count", FieldKind::Numeric);
        let coerced = coerce(&raw_table(), &spec).unwrap();

        let counts = coerced.table.column("weekly_count").unwrap();
        assert_eq!(counts.dtype(), &DataType::Float64);
        let values: Vec<Option<f64>> = counts.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(10.0), None, None]);

        // blank cells are missing without a warning
        assert_eq!(coerced.warnings.len(), 1);
        assert_eq!(coerced.warnings[0].row, 1);
        assert_eq!(coerced.warnings[0].raw, "n/a");
    }

    #[test]
    fn year_week_coercion_produces_date_column() {
        let spec = FieldSpec::new().field("year_week", FieldKind::YearWeek);
        let coerced = coerce(&raw_table(), &spec).unwrap();

        let weeks = coerced.table.column("year_week").unwrap();
        assert_eq!(weeks.dtype(), &DataType::Date);
        assert_eq!(weeks.null_count(), 1);
        assert_eq!(coerced.warnings.len(), 1);
        assert_eq!(coerced.warnings[0].expected, FieldKind::YearWeek);
    }

    #[test]
    fn coercion_leaves_input_untouched() {
        let table = raw_table();
        let spec = FieldSpec::new().field("weekly_count", FieldKind::Numeric);
        let _ = coerce(&table, &spec).unwrap();
        assert_eq!(table.column("weekly_count").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let spec = FieldSpec::new().field("stringency_score", FieldKind::Numeric);
        let err = coerce(&raw_table(), &spec).unwrap_err();
        assert!(matches!(err, ProcessError::Schema(_)));
    }
}
