//! Dashboard configuration, read from a JSON file.

use crate::charts::{ImageFormat, PageKind};
use crate::data::TableSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "dashboard.json";
pub const CONFIG_ENV: &str = "EPICHART_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sources: Vec<TableSource>,
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    /// Countries to render; every country in the data when absent.
    pub countries: Option<Vec<String>>,
    /// Response measures shown as markers.
    pub interventions: Vec<String>,
    pub pages: Vec<PageKind>,
    /// Slots fetched again after the first render; pages reading them are
    /// redrawn from the new tables.
    pub reload: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            output_dir: PathBuf::from("charts"),
            width: 1280,
            height: 720,
            format: ImageFormat::Png,
            countries: None,
            interventions: vec!["StayHomeOrder".to_string()],
            pages: PageKind::ALL.to_vec(),
            reload: Vec::new(),
        }
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;

        // relative source paths are resolved against the config file
        let base = path.parent().unwrap_or(Path::new(""));
        Ok(config.resolve_paths(base))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "image size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.pages.is_empty() {
            return Err(ConfigError::Invalid("no pages selected".to_string()));
        }
        if let Some(slot) = self.reload.iter().find(|slot| self.source(slot).is_none()) {
            return Err(ConfigError::Invalid(format!("reload slot '{slot}' has no source")));
        }
        Ok(())
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        for source in &mut self.sources {
            if source.path.is_relative() {
                source.path = base.join(&source.path);
            }
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
        self
    }

    pub fn source(&self, slot: &str) -> Option<&TableSource> {
        self.sources.iter().find(|s| s.slot == slot)
    }

    /// Sources needed by the configured pages, skipping unused slots.
    pub fn required_sources(&self) -> Vec<TableSource> {
        self.sources
            .iter()
            .filter(|s| self.pages.iter().any(|p| p.slots().contains(&s.slot.as_str())))
            .cloned()
            .collect()
    }
}
