//! Reducer Module
//! Collapses the values of one group into a single number.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// How a group's values are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    #[default]
    Sum,
    Max,
    Mean,
}

impl Reducer {
    /// Reduce the present values of a group. Missing cells must already be
    /// filtered out. An empty group sums to `0`; it has no max or mean.
    pub fn reduce(self, values: &[f64]) -> Option<f64> {
        match self {
            Reducer::Sum => Some(values.iter().sum()),
            _ if values.is_empty() => None,
            Reducer::Max => Some(Statistics::max(values.iter())),
            Reducer::Mean => Some(Statistics::mean(values.iter())),
        }
    }
}
