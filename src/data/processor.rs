//! Series Builder Module
//! Turns typed tables into chart-ready series: selector keys, filtered and
//! sorted (x, y) sequences, grouped rollups and 0-100 normalization.

use super::coerce::{parse_number, Parsed};
use super::columns::{
    axis_values, get_column, is_numeric_dtype, numeric_values, require_columns, text_values, XValue,
};
use super::ProcessError;
use crate::stats::Reducer;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One plotted point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub x: XValue,
    pub y: f64,
}

/// Stateless operations over immutable tables.
pub struct SeriesBuilder;

impl SeriesBuilder {
    /// Distinct values of `column` in first-occurrence order.
    pub fn distinct_keys(df: &DataFrame, column: &str) -> Result<Vec<String>, ProcessError> {
        let values = text_values(get_column(df, column)?)?;
        let mut seen = HashSet::new();
        Ok(values
            .into_iter()
            .flatten()
            .filter(|v| seen.insert(v.clone()))
            .collect())
    }

    /// Rows where every `(column, value)` filter matches exactly, projected to
    /// `(x, y)` and sorted by x. Rows sharing an x are all kept, in source
    /// order; rows with a missing x or y are skipped.
    pub fn select_series(
        df: &DataFrame,
        filters: &[(&str, &str)],
        x_column: &str,
        y_column: &str,
    ) -> Result<Vec<SeriesPoint>, ProcessError> {
        let mut required: Vec<&str> = filters.iter().map(|(c, _)| *c).collect();
        required.extend([x_column, y_column]);
        require_columns(df, &required)?;

        let filtered = Self::filter_rows(df, filters)?;
        let xs = axis_values(get_column(&filtered, x_column)?)?;
        let ys = numeric_values(get_column(&filtered, y_column)?)?;

        let mut points: Vec<SeriesPoint> = xs
            .into_iter()
            .zip(ys)
            .filter_map(|(x, y)| Some(SeriesPoint { x: x?, y: y? }))
            .collect();

        let skipped = filtered.height() - points.len();
        if skipped > 0 {
            debug!(skipped, x_column, y_column, "rows with missing values left out of series");
        }

        // stable: equal x keeps source order
        points.sort_by(|a, b| a.x.as_f64().total_cmp(&b.x.as_f64()));
        Ok(points)
    }

    /// Rows matching every filter. Text columns compare with exact,
    /// case-sensitive equality; numeric columns compare by value, so `"1"`
    /// matches `1.0`. A literal that is not a number matches no numeric cell.
    pub fn filter_rows(df: &DataFrame, filters: &[(&str, &str)]) -> Result<DataFrame, ProcessError> {
        let columns: Vec<&str> = filters.iter().map(|(c, _)| *c).collect();
        require_columns(df, &columns)?;

        let predicates = filters
            .iter()
            .map(|(column, value)| {
                let numeric = is_numeric_dtype(get_column(df, column)?.dtype());
                Ok(match (numeric, parse_number(Some(*value))) {
                    (true, Parsed::Value(v)) => col(*column).cast(DataType::Float64).eq(lit(v)),
                    (true, _) => lit(false),
                    (false, _) => col(*column).cast(DataType::String).eq(lit(*value)),
                })
            })
            .collect::<Result<Vec<Expr>, ProcessError>>()?;

        let Some(predicate) = predicates.into_iter().reduce(|acc, expr| acc.and(expr)) else {
            return Ok(df.clone());
        };

        let filtered = df.clone().lazy().filter(predicate).collect()?;
        Ok(filtered)
    }

    /// Group by the full tuple of `group_columns` and reduce `value_column`.
    ///
    /// Output columns: the group columns (text) followed by `value_column`
    /// (`Float64`). Groups are ordered by first occurrence of the outer key,
    /// then of each inner key within it. Rows with a missing group key are
    /// dropped; missing values are skipped by the reducer.
    pub fn aggregate(
        df: &DataFrame,
        group_columns: &[&str],
        value_column: &str,
        reducer: Reducer,
    ) -> Result<DataFrame, ProcessError> {
        let mut required = group_columns.to_vec();
        required.push(value_column);
        require_columns(df, &required)?;

        let keys: Vec<Vec<Option<String>>> = group_columns
            .iter()
            .map(|name| Ok(text_values(get_column(df, name)?)?))
            .collect::<Result<_, ProcessError>>()?;
        let values = numeric_values(get_column(df, value_column)?)?;

        let mut groups: Vec<(Vec<String>, Vec<f64>)> = Vec::new();
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut prefix_rank: HashMap<Vec<String>, usize> = HashMap::new();

        for (row, value) in values.iter().enumerate() {
            let Some(key) = keys
                .iter()
                .map(|column| column[row].clone())
                .collect::<Option<Vec<String>>>()
            else {
                continue;
            };

            for depth in 1..=key.len() {
                let next = prefix_rank.len();
                prefix_rank.entry(key[..depth].to_vec()).or_insert(next);
            }

            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            if let Some(v) = value {
                groups[slot].1.push(*v);
            }
        }

        groups.sort_by_cached_key(|(key, _)| {
            (1..=key.len())
                .map(|depth| prefix_rank[&key[..depth]])
                .collect::<Vec<usize>>()
        });

        let mut columns: Vec<Column> = group_columns
            .iter()
            .enumerate()
            .map(|(level, name)| {
                let labels: Vec<&str> = groups.iter().map(|(key, _)| key[level].as_str()).collect();
                Column::new((*name).into(), labels)
            })
            .collect();
        let reduced: Vec<Option<f64>> = groups
            .iter()
            .map(|(_, values)| reducer.reduce(values))
            .collect();
        columns.push(Column::new(value_column.into(), reduced));

        Ok(DataFrame::new(columns)?)
    }

    /// Rescale each column to 0-100 against its maximum over the whole table.
    /// A column with no values or a non-positive maximum becomes all zeros.
    pub fn normalize(df: &DataFrame, value_columns: &[&str]) -> Result<DataFrame, ProcessError> {
        require_columns(df, value_columns)?;
        let mut out = df.clone();

        for name in value_columns {
            let values = numeric_values(get_column(df, name)?)?;
            let max = values
                .iter()
                .flatten()
                .copied()
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

            let scaled: Vec<Option<f64>> = match max {
                Some(max) if max > 0.0 && max.is_finite() => values
                    .into_iter()
                    .map(|v| v.map(|v| v / max * 100.0))
                    .collect(),
                _ => {
                    debug!(column = *name, "no positive maximum, normalizing to zero");
                    vec![Some(0.0); values.len()]
                }
            };
            out.with_column(Column::new((*name).into(), scaled))?;
        }

        Ok(out)
    }
}
