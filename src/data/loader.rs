//! CSV Data Loader Module
//! Loads every dataset of a page concurrently with Polars. Loading is
//! all-or-nothing: one unreadable source fails the whole batch.

use super::columns::require_columns;
use super::SchemaError;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to load CSV for '{slot}' from {path}: {source}")]
    CsvError {
        slot: String,
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error("Malformed CSV for '{slot}' in {path}: {source}")]
    Malformed {
        slot: String,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Loader for '{slot}' panicked: {message}")]
    WorkerPanicked { slot: String, message: String },
    #[error("'{slot}' ({path}) has no header row")]
    NoHeader { slot: String, path: PathBuf },
    #[error("slot '{0}' is listed more than once")]
    DuplicateSlot(String),
    #[error("No data loaded for slot '{0}'")]
    NoData(String),
    #[error("No sources to load")]
    NoSources,
}

/// One dataset bound to a named slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    pub slot: String,
    pub path: PathBuf,
}

impl TableSource {
    pub fn new(slot: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            slot: slot.to_string(),
            path: path.into(),
        }
    }
}

/// Tables keyed by slot name. Written once per load, read many times.
#[derive(Debug, Clone, Default)]
pub struct LoadedTables {
    tables: HashMap<String, DataFrame>,
}

impl LoadedTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: &str, df: DataFrame) {
        self.tables.insert(slot.to_string(), df);
    }

    pub fn get(&self, slot: &str) -> Result<&DataFrame, LoadError> {
        self.tables
            .get(slot)
            .ok_or_else(|| LoadError::NoData(slot.to_string()))
    }

    /// Table in `slot`, checked for the columns its consumer needs.
    pub fn get_with_columns(&self, slot: &str, columns: &[&str]) -> Result<&DataFrame, TableError> {
        let df = self.get(slot)?;
        require_columns(df, columns).map_err(|source| TableError::Schema {
            slot: slot.to_string(),
            source,
        })?;
        Ok(df)
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.tables.contains_key(slot)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Lookup failure for a slot's table.
#[derive(Error, Debug)]
pub enum TableError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("table '{slot}': {source}")]
    Schema {
        slot: String,
        #[source]
        source: SchemaError,
    },
}

/// Reads CSV sources into text-typed DataFrames.
pub struct DataLoader;

impl DataLoader {
    /// Load a single CSV file. Every column is read as text; typing is left
    /// to coercion. Rows whose field count differs from the header fail the
    /// load.
    pub fn load_csv(source: &TableSource) -> Result<DataFrame, LoadError> {
        let csv_error = |e: PolarsError| LoadError::CsvError {
            slot: source.slot.clone(),
            path: source.path.clone(),
            source: e,
        };

        let df = LazyCsvReader::new(&source.path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(|lazy| lazy.collect())
            .map_err(csv_error)?;

        if df.width() == 0 {
            return Err(LoadError::NoHeader {
                slot: source.slot.clone(),
                path: source.path.clone(),
            });
        }
        Self::check_row_lengths(source)?;

        debug!(
            slot = %source.slot,
            rows = df.height(),
            columns = df.width(),
            "loaded table"
        );
        Ok(df)
    }

    /// Polars pads short rows with nulls, so field counts are checked with a
    /// strict reader.
    fn check_row_lengths(source: &TableSource) -> Result<(), LoadError> {
        let malformed = |e: csv::Error| LoadError::Malformed {
            slot: source.slot.clone(),
            path: source.path.clone(),
            source: e,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(&source.path)
            .map_err(malformed)?;
        for record in reader.records() {
            record.map_err(malformed)?;
        }
        Ok(())
    }

    /// Load all sources concurrently and join. Any failure fails the batch;
    /// completion order does not matter since each result lands in its slot.
    pub fn load_all(sources: &[TableSource]) -> Result<LoadedTables, LoadError> {
        if sources.is_empty() {
            return Err(LoadError::NoSources);
        }
        let mut slots = std::collections::HashSet::new();
        for source in sources {
            if !slots.insert(source.slot.as_str()) {
                return Err(LoadError::DuplicateSlot(source.slot.clone()));
            }
        }

        let frames: Vec<(String, DataFrame)> = sources
            .par_iter()
            .map(|source| Ok((source.slot.clone(), Self::load_csv(source)?)))
            .collect::<Result<_, LoadError>>()?;

        let mut tables = LoadedTables::new();
        for (slot, df) in frames {
            tables.insert(&slot, df);
        }

        info!(tables = tables.len(), "all sources loaded");
        Ok(tables)
    }

    /// Column names of a loaded table.
    pub fn get_columns(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}
