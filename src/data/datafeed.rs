//! Datafeed module for loading candle histories and analysis bundles.
//!
//! Sources are async and never fail the chart pipeline: on any error they
//! log and hand back an empty table, which the engine and composer treat as
//! "nothing to show".

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use super::normalizer::{RawTable, SchemaError};
use super::object::HistoryRequest;

/// Errors raised while reading a local data file.
#[derive(Debug, Error)]
pub enum DatafeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("analysis file {0} is not a JSON object")]
    NotAnObject(PathBuf),

    #[error("unsupported interval: {0}")]
    UnsupportedInterval(String),
}

/// Abstract datafeed trait for candle sources
#[async_trait]
pub trait BaseDatafeed: Send + Sync {
    /// Query raw candle history; failures yield an empty table
    async fn query_candles(&self, req: &HistoryRequest) -> RawTable;
}

/// Datafeed used when nothing is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDatafeed;

impl EmptyDatafeed {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BaseDatafeed for EmptyDatafeed {
    async fn query_candles(&self, req: &HistoryRequest) -> RawTable {
        warn!(
            "No datafeed configured, returning empty history for {} {}",
            req.symbol, req.interval
        );
        RawTable::default()
    }
}

/// Reads `<root>/<SYMBOL>_<interval>.json`, an array of row objects.
#[derive(Debug, Clone)]
pub struct JsonFileDatafeed {
    root: PathBuf,
}

impl JsonFileDatafeed {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the history file for a request
    pub fn file_path(&self, req: &HistoryRequest) -> PathBuf {
        self.root.join(format!(
            "{}_{}.json",
            req.symbol.to_uppercase(),
            req.interval.value()
        ))
    }

    async fn load(&self, req: &HistoryRequest) -> Result<RawTable, DatafeedError> {
        let path = self.file_path(req);
        let content = read_file(&path).await?;
        let table = RawTable::from_json_str(&content).map_err(|source| DatafeedError::Json {
            path: path.clone(),
            source,
        })?;
        Ok(table.tail(req.count))
    }
}

#[async_trait]
impl BaseDatafeed for JsonFileDatafeed {
    async fn query_candles(&self, req: &HistoryRequest) -> RawTable {
        match self.load(req).await {
            Ok(table) => {
                info!(
                    "Loaded {} rows for {} {} from {}",
                    table.row_count(),
                    req.symbol,
                    req.interval,
                    self.root.display()
                );
                table
            }
            Err(e) => {
                warn!("Failed to load history for {}: {}", req.symbol, e);
                RawTable::default()
            }
        }
    }
}

/// Source of externally produced analysis bundles
#[async_trait]
pub trait BaseAnalysisSource: Send + Sync {
    /// Load the bundle for a request; an empty object when nothing is available
    async fn query_analysis(&self, req: &HistoryRequest) -> Value;
}

/// Reads an analysis bundle from a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileAnalysisSource {
    path: PathBuf,
}

impl JsonFileAnalysisSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Value, DatafeedError> {
        let content = read_file(&self.path).await?;
        let value: Value =
            serde_json::from_str(&content).map_err(|source| DatafeedError::Json {
                path: self.path.clone(),
                source,
            })?;
        if value.is_object() {
            Ok(value)
        } else {
            Err(DatafeedError::NotAnObject(self.path.clone()))
        }
    }
}

#[async_trait]
impl BaseAnalysisSource for JsonFileAnalysisSource {
    async fn query_analysis(&self, req: &HistoryRequest) -> Value {
        match self.load().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to load analysis for {}: {}", req.symbol, e);
                Value::Object(Map::new())
            }
        }
    }
}

async fn read_file(path: &Path) -> Result<String, DatafeedError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DatafeedError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::constant::Interval;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_empty_datafeed_returns_empty_table() {
        let req = HistoryRequest::new("BTC", Interval::Hour4, 100);
        assert!(EmptyDatafeed::new().query_candles(&req).await.is_empty());
    }

    #[tokio::test]
    async fn test_json_datafeed_keeps_last_rows() {
        let dir = tempdir().unwrap();
        let rows = r#"[
            {"time": 1700000000, "open": 1, "high": 2, "low": 0.5, "close": 1.5, "volumefrom": 10},
            {"time": 1700014400, "open": 1.5, "high": 2.5, "low": 1, "close": 2, "volumefrom": 11},
            {"time": 1700028800, "open": 2, "high": 3, "low": 1.5, "close": 2.5, "volumefrom": 12}
        ]"#;
        fs::write(dir.path().join("BTC_4h.json"), rows).unwrap();

        let feed = JsonFileDatafeed::new(dir.path());
        let req = HistoryRequest::new("btc", Interval::Hour4, 2);
        let table = feed.query_candles(&req).await;
        assert_eq!(table.row_count(), 2);
    }

    #[tokio::test]
    async fn test_json_datafeed_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let feed = JsonFileDatafeed::new(dir.path());
        let req = HistoryRequest::new("ETH", Interval::Daily, 10);
        assert!(feed.query_candles(&req).await.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_source_rejects_non_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        let source = JsonFileAnalysisSource::new(&path);
        let req = HistoryRequest::new("BTC", Interval::Hour4, 10);
        assert_eq!(source.query_analysis(&req).await, Value::Object(Map::new()));

        fs::write(&path, r#"{"support_resistance_levels": {}}"#).unwrap();
        let bundle = source.query_analysis(&req).await;
        assert!(bundle.get("support_resistance_levels").is_some());
    }
}
