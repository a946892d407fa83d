//! Epichart - COVID-19 CSV series builder
//!
//! Loads epidemic CSV datasets into typed tables, derives chart-ready series
//! from them and renders the dashboards as static images.

pub mod charts;
pub mod config;
pub mod data;
pub mod interaction;
pub mod stats;
