//! Basic data structures consumed by the indicator engine and chart composer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ta::{Close, High, Low, Open, Volume};

use super::constant::Interval;

/// One OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new Candle
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Typical price (h + l + c) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

impl Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Time ordered candle sequence in the canonical schema.
///
/// Candles are strictly increasing in time. `has_volume` is false when the
/// source carried no usable volume column, in which case every
/// `Candle::volume` is zero and volume based indicators are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleTable {
    candles: Vec<Candle>,
    has_volume: bool,
    quote_volume: Option<Vec<f64>>,
}

impl CandleTable {
    /// Build a table from candles that are already sorted and unique in time.
    pub(crate) fn from_sorted(
        candles: Vec<Candle>,
        has_volume: bool,
        quote_volume: Option<Vec<f64>>,
    ) -> Self {
        Self {
            candles,
            has_volume,
            quote_volume,
        }
    }

    /// Build a table from candles in any order.
    ///
    /// Candles are sorted by time; for duplicate timestamps the last one wins.
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.datetime);
        let mut unique: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match unique.last_mut() {
                Some(last) if last.datetime == candle.datetime => *last = candle,
                _ => unique.push(candle),
            }
        }
        Self {
            candles: unique,
            has_volume: true,
            quote_volume: None,
        }
    }

    /// Same as `new` but marks the volume column as absent.
    pub fn without_volume(candles: Vec<Candle>) -> Self {
        let mut table = Self::new(candles);
        table.has_volume = false;
        for candle in &mut table.candles {
            candle.volume = 0.0;
        }
        table
    }

    /// Empty table
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn has_volume(&self) -> bool {
        self.has_volume
    }

    /// Secondary quote volume column, if the source carried one
    pub fn quote_volume(&self) -> Option<&[f64]> {
        self.quote_volume.as_deref()
    }

    /// Time of the last candle
    pub fn last_datetime(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.datetime)
    }

    pub fn datetimes(&self) -> Vec<DateTime<Utc>> {
        self.candles.iter().map(|c| c.datetime).collect()
    }

    /// Number of consecutive pairs spaced wider than one `interval`
    pub fn gap_count(&self, interval: Interval) -> usize {
        let step = Duration::minutes(interval.minutes());
        self.candles
            .windows(2)
            .filter(|pair| pair[1].datetime - pair[0].datetime > step)
            .count()
    }
}

/// Request for a candle history from a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub symbol: String,
    pub interval: Interval,
    pub count: usize,
}

impl HistoryRequest {
    pub fn new(symbol: impl Into<String>, interval: Interval, count: usize) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(ts: i64, close: f64) -> Candle {
        let dt = Utc.timestamp_opt(ts, 0).unwrap();
        Candle::new(dt, close, close + 1.0, close - 1.0, close, 10.0)
    }

    #[test]
    fn test_candle_table_sorts_and_dedups() {
        let table = CandleTable::new(vec![candle(120, 3.0), candle(60, 2.0), candle(120, 4.0)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.candles()[0].close, 2.0);
        assert_eq!(table.candles()[1].close, 4.0);
        assert!(table.has_volume());
    }

    #[test]
    fn test_without_volume_zeroes_volume() {
        let table = CandleTable::without_volume(vec![candle(60, 2.0)]);
        assert!(!table.has_volume());
        assert_eq!(table.candles()[0].volume, 0.0);
    }

    #[test]
    fn test_gap_count() {
        let hourly = CandleTable::new(vec![candle(0, 1.0), candle(3600, 1.0), candle(7200, 1.0)]);
        assert_eq!(hourly.gap_count(Interval::Hour), 0);

        let holed = CandleTable::new(vec![candle(0, 1.0), candle(3600, 1.0), candle(4 * 3600, 1.0)]);
        assert_eq!(holed.gap_count(Interval::Hour), 1);
        assert_eq!(holed.gap_count(Interval::Hour4), 0);
        assert_eq!(CandleTable::empty().gap_count(Interval::Daily), 0);
    }

    #[test]
    fn test_typical_price() {
        let c = candle(0, 10.0);
        assert!((c.typical_price() - 10.0).abs() < 1e-12);
    }
}
