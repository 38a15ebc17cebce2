//! Application settings.
//!
//! Built-in defaults, overridden by `chart_setting.json` in the application
//! directory. Loaded once by the binary and passed down by value; nothing
//! here is global mutable state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::logger::INFO;
use super::utility::get_file_path;
use crate::chart::ChartConfig;
use crate::indicator::{IndicatorParams, ParamError};

pub const SETTING_FILENAME: &str = "chart_setting.json";

#[derive(Debug, Error)]
pub enum SettingError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Log section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSetting {
    pub active: bool,
    /// Python style numeric level (10 debug ... 50 critical)
    pub level: i32,
    pub console: bool,
    pub file: bool,
}

impl Default for LogSetting {
    fn default() -> Self {
        Self {
            active: true,
            level: INFO,
            console: true,
            file: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSetting,
    pub chart: ChartConfig,
    /// Indicator parameter preset, same keys as `IndicatorParams`
    pub indicator: HashMap<String, Value>,
}

impl Settings {
    /// Settings file in the application directory
    pub fn default_path() -> PathBuf {
        get_file_path(SETTING_FILENAME)
    }

    /// `Ok(None)` when the file does not exist. Nothing is logged, so
    /// callers can report the outcome once a subscriber is installed.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>, SettingError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Indicator parameters from the preset section
    pub fn indicator_params(&self) -> Result<IndicatorParams, ParamError> {
        IndicatorParams::from_map(&self.indicator)
    }
}
