//! Defensive views over an externally produced analysis bundle.
//!
//! The bundle schema belongs to whoever produced it, so every accessor
//! tolerates missing keys and malformed entries by skipping them.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::data::normalizer::{parse_datetime, parse_number};

pub const SUPPORT_RESISTANCE_KEY: &str = "support_resistance_levels";
pub const FIBONACCI_KEY: &str = "fibonacci_analysis";

/// Which trend a Fibonacci zone was fitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FibTrend {
    Global,
    Local,
}

impl FibTrend {
    pub fn key(&self) -> &'static str {
        match self {
            FibTrend::Global => "based_on_global_trend",
            FibTrend::Local => "based_on_local_trend",
        }
    }
}

/// A horizontal level starting at `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub price: f64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupportResistance {
    pub supports: Vec<Level>,
    pub resistances: Vec<Level>,
}

/// Retracement levels between a start and an optional end date.
#[derive(Debug, Clone, PartialEq)]
pub struct FibonacciZone {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub levels: Vec<(String, f64)>,
}

/// Mapping of annotation type to structured facts.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisBundle(Value);

impl Default for AnalysisBundle {
    fn default() -> Self {
        Self::empty()
    }
}

impl AnalysisBundle {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.get(key).is_some()
    }

    /// Support and resistance levels, `None` when the key is absent
    pub fn support_resistance(&self) -> Option<SupportResistance> {
        let section = self.0.get(SUPPORT_RESISTANCE_KEY)?;
        Some(SupportResistance {
            supports: parse_levels(section.get("supports")),
            resistances: parse_levels(section.get("resistances")),
        })
    }

    /// Fibonacci zone for one trend, `None` when absent or without a start
    pub fn fibonacci(&self, trend: FibTrend) -> Option<FibonacciZone> {
        let zone = self.0.get(FIBONACCI_KEY)?.get(trend.key())?;
        let start = zone.get("start_point").and_then(point_date);
        let Some(start) = start else {
            debug!("Fibonacci {} zone has no usable start point", trend.key());
            return None;
        };
        let end = zone.get("end_point").and_then(point_date);

        let levels = zone
            .get("levels")
            .and_then(Value::as_object)
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|(name, price)| parse_number(price).map(|p| (name.clone(), p)))
                    .collect()
            })
            .unwrap_or_default();

        Some(FibonacciZone { start, end, levels })
    }
}

impl From<Value> for AnalysisBundle {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

fn point_date(point: &Value) -> Option<DateTime<Utc>> {
    point.get("date").and_then(parse_datetime)
}

fn parse_levels(entries: Option<&Value>) -> Vec<Level> {
    let Some(entries) = entries.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let price = entry.get("level").and_then(parse_number);
            let date = entry.get("date").and_then(parse_datetime);
            match (price, date) {
                (Some(price), Some(date)) => Some(Level { price, date }),
                _ => {
                    debug!("Skipping malformed level entry: {}", entry);
                    None
                }
            }
        })
        .collect()
}
