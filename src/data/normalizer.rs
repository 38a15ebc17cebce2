//! Schema normalizer.
//!
//! Turns a loosely typed OHLCV table (any column casing, JSON cells) into a
//! `CandleTable` in the canonical lowercase open/high/low/close/volume schema
//! ordered by time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::object::{Candle, CandleTable};

/// Unrecoverable schema problems.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("required column '{0}' not found")]
    MissingColumn(&'static str),
    #[error("no time column found to order the candles")]
    MissingTimeColumn,
    #[error("column '{column}' row {row}: cannot read a timestamp")]
    InvalidTime { column: String, row: usize },
    #[error("column '{column}' row {row}: not a number")]
    InvalidValue { column: String, row: usize },
    #[error("column '{column}' has {found} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
}

const TIME_ALIASES: &[&str] = &["opentime", "datetime", "timestamp", "time", "date"];
const VOLUME_ALIASES: &[&str] = &["volume", "volumefrom", "vol"];
const QUOTE_VOLUME_ALIASES: &[&str] = &["quoteassetvolume", "quotevolume", "volumeto"];

/// Millisecond timestamps are above this, second timestamps below.
const MILLIS_THRESHOLD: f64 = 1e11;

/// A named column of raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Value>,
}

/// Column oriented table with arbitrary column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<RawColumn>,
}

impl RawTable {
    /// Build from named columns. All columns must have the same length.
    pub fn from_columns(columns: Vec<RawColumn>) -> Result<Self, SchemaError> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            for column in &columns {
                if column.values.len() != expected {
                    return Err(SchemaError::ColumnLength {
                        column: column.name.clone(),
                        expected,
                        found: column.values.len(),
                    });
                }
            }
        }
        Ok(Self { columns })
    }

    /// Build from row records. Keys missing in a record become nulls.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(&name).cloned().unwrap_or(Value::Null))
                    .collect();
                RawColumn { name, values }
            })
            .collect();

        Self { columns }
    }

    /// Parse a JSON array of records.
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<Map<String, Value>> = serde_json::from_str(content)?;
        Ok(Self::from_records(&records))
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Keep only the last `count` rows.
    pub fn tail(&self, count: usize) -> Self {
        let start = self.row_count().saturating_sub(count);
        let columns = self
            .columns
            .iter()
            .map(|c| RawColumn {
                name: c.name.clone(),
                values: c.values[start..].to_vec(),
            })
            .collect();
        Self { columns }
    }

    /// Find a column by canonical name, trying aliases in order.
    fn find(&self, aliases: &[&str]) -> Option<&RawColumn> {
        aliases.iter().find_map(|alias| {
            self.columns
                .iter()
                .find(|c| canonical_name(&c.name) == *alias)
        })
    }
}

/// Lowercase and strip separators so "Open Time", "open_time" and "OPEN TIME" match.
fn canonical_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Read a numeric cell (JSON number or numeric string).
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn datetime_from_number(value: f64) -> Option<DateTime<Utc>> {
    if value.abs() >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        let secs = value.trunc() as i64;
        let nanos = ((value - value.trunc()) * 1e9).round() as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

/// Parse a timestamp string in one of the supported formats.
pub fn parse_datetime_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    s.parse::<f64>().ok().and_then(datetime_from_number)
}

/// Parse a timestamp cell: unix seconds/milliseconds or a date string.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(datetime_from_number),
        Value::String(s) => parse_datetime_str(s),
        _ => None,
    }
}

fn required_column<'a>(
    raw: &'a RawTable,
    canonical: &'static str,
) -> Result<&'a RawColumn, SchemaError> {
    raw.find(&[canonical])
        .ok_or(SchemaError::MissingColumn(canonical))
}

fn numeric_values(column: &RawColumn) -> Result<Vec<f64>, SchemaError> {
    column
        .values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            parse_number(v).ok_or_else(|| SchemaError::InvalidValue {
                column: column.name.clone(),
                row,
            })
        })
        .collect()
}

/// Optional numeric column: any unreadable cell drops the whole column.
fn optional_values(column: Option<&RawColumn>) -> Option<Vec<f64>> {
    let column = column?;
    match numeric_values(column) {
        Ok(values) => Some(values),
        Err(e) => {
            warn!("Ignoring column '{}': {}", column.name, e);
            None
        }
    }
}

/// Normalize a raw table into the canonical candle schema.
pub fn normalize(raw: &RawTable) -> Result<CandleTable, SchemaError> {
    let open = required_column(raw, "open")?;
    let high = required_column(raw, "high")?;
    let low = required_column(raw, "low")?;
    let close = required_column(raw, "close")?;
    let time = raw.find(TIME_ALIASES).ok_or(SchemaError::MissingTimeColumn)?;

    let renamed: Vec<String> = [open, high, low, close]
        .iter()
        .filter(|c| c.name != canonical_name(&c.name))
        .map(|c| format!("{} -> {}", c.name, canonical_name(&c.name)))
        .collect();
    if !renamed.is_empty() {
        info!("Renaming columns to canonical schema: {}", renamed.join(", "));
    }

    let opens = numeric_values(open)?;
    let highs = numeric_values(high)?;
    let lows = numeric_values(low)?;
    let closes = numeric_values(close)?;

    let datetimes = time
        .values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            parse_datetime(v).ok_or_else(|| SchemaError::InvalidTime {
                column: time.name.clone(),
                row,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let volumes = optional_values(raw.find(VOLUME_ALIASES));
    if volumes.is_none() {
        warn!("No usable volume column, volume based indicators are disabled");
    }
    let quote_volumes = optional_values(raw.find(QUOTE_VOLUME_ALIASES));

    let mut rows: Vec<(usize, Candle)> = (0..raw.row_count())
        .map(|i| {
            let volume = volumes.as_ref().map(|v| v[i]).unwrap_or(0.0);
            let candle = Candle::new(datetimes[i], opens[i], highs[i], lows[i], closes[i], volume);
            (i, candle)
        })
        .collect();

    rows.sort_by_key(|(_, c)| c.datetime);

    let mut unique: Vec<(usize, Candle)> = Vec::with_capacity(rows.len());
    for row in rows {
        match unique.last_mut() {
            Some(last) if last.1.datetime == row.1.datetime => *last = row,
            _ => unique.push(row),
        }
    }
    let dropped = raw.row_count() - unique.len();
    if dropped > 0 {
        warn!("Dropped {} candles with duplicate timestamps", dropped);
    }

    let quote_volume = quote_volumes.map(|q| unique.iter().map(|(i, _)| q[*i]).collect());
    let candles: Vec<Candle> = unique.into_iter().map(|(_, c)| c).collect();
    debug!("Normalized {} candles using time column '{}'", candles.len(), time.name);

    Ok(CandleTable::from_sorted(candles, volumes.is_some(), quote_volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> RawTable {
        let list: Vec<Map<String, Value>> = serde_json::from_value(value).unwrap();
        RawTable::from_records(&list)
    }

    #[test]
    fn test_normalize_mixed_case_columns() {
        let raw = records(json!([
            {"Open Time": "2024-01-01 04:00:00", "Open": 2, "High": 3, "Low": 1, "Close": 2.5, "Volume": 10, "Quote Asset Volume": 25},
            {"Open Time": "2024-01-01 00:00:00", "Open": 1, "High": 2, "Low": 0.5, "Close": 1.5, "Volume": 5, "Quote Asset Volume": 7.5},
        ]));
        let table = normalize(&raw).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_volume());
        assert_eq!(table.candles()[0].open, 1.0);
        assert_eq!(table.candles()[1].close, 2.5);
        assert_eq!(table.quote_volume(), Some(&[7.5, 25.0][..]));
    }

    #[test]
    fn test_normalize_unix_seconds_and_upper_case() {
        let raw = records(json!([
            {"TIME": 1700000000, "OPEN": "1", "HIGH": "2", "LOW": "0.5", "CLOSE": "1.5"},
        ]));
        let table = normalize(&raw).unwrap();
        assert_eq!(table.candles()[0].datetime.timestamp(), 1_700_000_000);
        assert!(!table.has_volume());
    }

    #[test]
    fn test_normalize_millisecond_timestamps() {
        let raw = records(json!([
            {"open_time": 1700000000000i64, "open": 1, "high": 2, "low": 0.5, "close": 1.5, "volume": 3},
        ]));
        let table = normalize(&raw).unwrap();
        assert_eq!(table.candles()[0].datetime.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_close_is_schema_error() {
        let raw = records(json!([{"time": 1, "open": 1, "high": 2, "low": 0.5}]));
        assert_eq!(normalize(&raw), Err(SchemaError::MissingColumn("close")));
    }

    #[test]
    fn test_missing_time_is_schema_error() {
        let raw = records(json!([{"open": 1, "high": 2, "low": 0.5, "close": 1}]));
        assert_eq!(normalize(&raw), Err(SchemaError::MissingTimeColumn));
    }

    #[test]
    fn test_invalid_time_is_schema_error() {
        let raw = records(json!([{"date": "yesterday", "open": 1, "high": 2, "low": 0.5, "close": 1}]));
        assert!(matches!(normalize(&raw), Err(SchemaError::InvalidTime { row: 0, .. })));
    }

    #[test]
    fn test_bad_volume_disables_volume() {
        let raw = records(json!([
            {"time": 60, "open": 1, "high": 2, "low": 0.5, "close": 1, "volume": "n/a"},
        ]));
        let table = normalize(&raw).unwrap();
        assert!(!table.has_volume());
    }

    #[test]
    fn test_duplicate_timestamps_keep_last() {
        let raw = records(json!([
            {"time": 60, "open": 1, "high": 2, "low": 0.5, "close": 1},
            {"time": 60, "open": 1, "high": 2, "low": 0.5, "close": 9},
        ]));
        let table = normalize(&raw).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.candles()[0].close, 9.0);
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let result = RawTable::from_columns(vec![
            RawColumn { name: "open".into(), values: vec![json!(1)] },
            RawColumn { name: "close".into(), values: vec![] },
        ]);
        assert!(matches!(result, Err(SchemaError::ColumnLength { .. })));
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime_str("2024-03-01").is_some());
        assert!(parse_datetime_str("2024-03-01T12:00:00Z").is_some());
        assert!(parse_datetime_str("2024-03-01T12:00:00").is_some());
        assert!(parse_datetime(&json!("1700000000")).is_some());
        assert!(parse_datetime(&json!(null)).is_none());
    }

    #[test]
    fn test_tail_keeps_last_rows() {
        let raw = records(json!([{"a": 1}, {"a": 2}, {"a": 3}]));
        let tail = raw.tail(2);
        assert_eq!(tail.row_count(), 2);
        assert_eq!(tail.columns()[0].values[0], json!(2));
    }
}
