//! General constant enums used by the chart pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interval of candle data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 1 minute
    Minute,
    /// 5 minutes
    Minute5,
    /// 15 minutes
    Minute15,
    /// 30 minutes
    Minute30,
    /// 1 hour
    Hour,
    /// 2 hours
    Hour2,
    /// 4 hours
    Hour4,
    /// 6 hours
    Hour6,
    /// 12 hours
    Hour12,
    /// Daily
    Daily,
    /// Weekly
    Weekly,
}

impl Interval {
    /// Get interval value string
    pub fn value(&self) -> &'static str {
        match self {
            Interval::Minute => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour => "1h",
            Interval::Hour2 => "2h",
            Interval::Hour4 => "4h",
            Interval::Hour6 => "6h",
            Interval::Hour12 => "12h",
            Interval::Daily => "1d",
            Interval::Weekly => "1w",
        }
    }

    /// Length of one candle in minutes
    pub fn minutes(&self) -> i64 {
        match self {
            Interval::Minute => 1,
            Interval::Minute5 => 5,
            Interval::Minute15 => 15,
            Interval::Minute30 => 30,
            Interval::Hour => 60,
            Interval::Hour2 => 120,
            Interval::Hour4 => 240,
            Interval::Hour6 => 360,
            Interval::Hour12 => 720,
            Interval::Daily => 1440,
            Interval::Weekly => 10080,
        }
    }

    /// Get all intervals for selection lists
    pub fn all() -> Vec<Interval> {
        vec![
            Interval::Minute,
            Interval::Minute5,
            Interval::Minute15,
            Interval::Minute30,
            Interval::Hour,
            Interval::Hour2,
            Interval::Hour4,
            Interval::Hour6,
            Interval::Hour12,
            Interval::Daily,
            Interval::Weekly,
        ]
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Interval::all()
            .into_iter()
            .find(|interval| interval.value() == s)
            .ok_or_else(|| format!("unsupported interval: {}", s))
    }
}
