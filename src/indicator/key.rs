//! Typed indicator identities and derived column naming.
//!
//! A derived column is keyed by `SeriesKey` (indicator + parameters + output
//! line). The familiar column name such as `RSI_14` or `BBU_20_2.0` is a
//! display function of the key, never the storage key itself.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Float parameter usable inside hashed and ordered keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ratio(f64);

impl Ratio {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Ratio {}

impl Hash for Ratio {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_float(self.0))
    }
}

/// Print a float the way column names expect it: always with a decimal part.
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Indicator family, used to group parameterizations for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorKind {
    Rsi,
    Atr,
    Obv,
    Stochastic,
    Macd,
    Bollinger,
    Adx,
    WilliamsR,
    ParabolicSar,
    Ichimoku,
    Vwap,
    Envelope,
}

/// A fully parameterized indicator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Indicator {
    Rsi { period: usize },
    Atr { period: usize },
    Obv,
    Stochastic { k: usize, d: usize, smooth: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { period: usize, std_dev: Ratio },
    Adx { period: usize },
    WilliamsR { period: usize },
    ParabolicSar { af: Ratio, max_af: Ratio },
    Ichimoku { tenkan: usize, kijun: usize, senkou_b: usize },
    /// Anchored per calendar day
    Vwap,
    /// EMA envelope, `percent` is the band width in percent of the EMA
    Envelope { period: usize, percent: Ratio },
}

/// One output line of an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Line {
    Value,
    K,
    D,
    Macd,
    Histogram,
    Signal,
    Lower,
    Middle,
    Upper,
    Bandwidth,
    PercentB,
    Adx,
    PlusDi,
    MinusDi,
    Long,
    Short,
    Af,
    Reversal,
    Tenkan,
    Kijun,
    SpanA,
    SpanB,
    Chikou,
}

impl Indicator {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            Indicator::Rsi { .. } => IndicatorKind::Rsi,
            Indicator::Atr { .. } => IndicatorKind::Atr,
            Indicator::Obv => IndicatorKind::Obv,
            Indicator::Stochastic { .. } => IndicatorKind::Stochastic,
            Indicator::Macd { .. } => IndicatorKind::Macd,
            Indicator::Bollinger { .. } => IndicatorKind::Bollinger,
            Indicator::Adx { .. } => IndicatorKind::Adx,
            Indicator::WilliamsR { .. } => IndicatorKind::WilliamsR,
            Indicator::ParabolicSar { .. } => IndicatorKind::ParabolicSar,
            Indicator::Ichimoku { .. } => IndicatorKind::Ichimoku,
            Indicator::Vwap => IndicatorKind::Vwap,
            Indicator::Envelope { .. } => IndicatorKind::Envelope,
        }
    }

    /// Output lines in column order
    pub fn lines(&self) -> &'static [Line] {
        match self {
            Indicator::Rsi { .. }
            | Indicator::Atr { .. }
            | Indicator::Obv
            | Indicator::WilliamsR { .. }
            | Indicator::Vwap => &[Line::Value],
            Indicator::Stochastic { .. } => &[Line::K, Line::D],
            Indicator::Macd { .. } => &[Line::Macd, Line::Histogram, Line::Signal],
            Indicator::Bollinger { .. } => &[
                Line::Lower,
                Line::Middle,
                Line::Upper,
                Line::Bandwidth,
                Line::PercentB,
            ],
            Indicator::Adx { .. } => &[Line::Adx, Line::PlusDi, Line::MinusDi],
            Indicator::ParabolicSar { .. } => &[Line::Long, Line::Short, Line::Af, Line::Reversal],
            Indicator::Ichimoku { .. } => &[
                Line::Tenkan,
                Line::Kijun,
                Line::SpanA,
                Line::SpanB,
                Line::Chikou,
            ],
            Indicator::Envelope { .. } => &[Line::Middle, Line::Upper, Line::Lower],
        }
    }

    /// Minimum number of candles before every output line has a value.
    ///
    /// Saturates instead of overflowing, so absurd periods simply demand
    /// more history than any table holds.
    pub fn lookback(&self) -> usize {
        match *self {
            Indicator::Rsi { period } | Indicator::Atr { period } => period.saturating_add(1),
            Indicator::Obv | Indicator::Vwap => 1,
            // %D is the last line to fill
            Indicator::Stochastic { k, d, smooth } => {
                k.saturating_add(smooth).saturating_add(d).saturating_sub(2)
            }
            // signal and histogram trail the MACD line by `signal - 1` rows
            Indicator::Macd { fast, slow, signal } => {
                fast.max(slow).saturating_add(signal).saturating_sub(1)
            }
            Indicator::Bollinger { period, .. }
            | Indicator::WilliamsR { period }
            | Indicator::Envelope { period, .. } => period,
            Indicator::Adx { period } => period.saturating_mul(2),
            Indicator::ParabolicSar { .. } => 2,
            // both spans are displaced forward by `kijun` rows
            Indicator::Ichimoku { tenkan, kijun, senkou_b } => {
                tenkan.max(kijun).max(senkou_b).saturating_add(kijun)
            }
        }
    }

    pub fn requires_volume(&self) -> bool {
        matches!(self, Indicator::Obv | Indicator::Vwap)
    }

    /// Key of one output line
    pub fn key(&self, line: Line) -> SeriesKey {
        SeriesKey {
            indicator: *self,
            line,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Rsi { period } => write!(f, "RSI({})", period),
            Indicator::Atr { period } => write!(f, "ATR({})", period),
            Indicator::Obv => write!(f, "OBV"),
            Indicator::Stochastic { k, d, smooth } => write!(f, "STOCH({},{},{})", k, d, smooth),
            Indicator::Macd { fast, slow, signal } => write!(f, "MACD({},{},{})", fast, slow, signal),
            Indicator::Bollinger { period, std_dev } => write!(f, "BBANDS({},{})", period, std_dev),
            Indicator::Adx { period } => write!(f, "ADX({})", period),
            Indicator::WilliamsR { period } => write!(f, "WILLR({})", period),
            Indicator::ParabolicSar { af, max_af } => write!(f, "PSAR({},{})", af, max_af),
            Indicator::Ichimoku { tenkan, kijun, senkou_b } => {
                write!(f, "ICHIMOKU({},{},{})", tenkan, kijun, senkou_b)
            }
            Indicator::Vwap => write!(f, "VWAP(D)"),
            Indicator::Envelope { period, percent } => write!(f, "ENVELOPE({},{}%)", period, percent),
        }
    }
}

/// Storage key of one derived column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub indicator: Indicator,
    pub line: Line,
}

impl SeriesKey {
    /// Column name derived from indicator identity and parameters
    pub fn column_name(&self) -> String {
        match (self.indicator, self.line) {
            (Indicator::Rsi { period }, _) => format!("RSI_{}", period),
            (Indicator::Atr { period }, _) => format!("ATR_{}", period),
            (Indicator::Obv, _) => "OBV".to_string(),
            (Indicator::Stochastic { k, d, smooth }, line) => {
                let prefix = if line == Line::D { "STOCHd" } else { "STOCHk" };
                format!("{}_{}_{}_{}", prefix, k, d, smooth)
            }
            (Indicator::Macd { fast, slow, signal }, line) => {
                let prefix = match line {
                    Line::Histogram => "MACDh",
                    Line::Signal => "MACDs",
                    _ => "MACD",
                };
                format!("{}_{}_{}_{}", prefix, fast, slow, signal)
            }
            (Indicator::Bollinger { period, std_dev }, line) => {
                let prefix = match line {
                    Line::Lower => "BBL",
                    Line::Upper => "BBU",
                    Line::Bandwidth => "BBB",
                    Line::PercentB => "BBP",
                    _ => "BBM",
                };
                format!("{}_{}_{}", prefix, period, std_dev)
            }
            (Indicator::Adx { period }, line) => {
                let prefix = match line {
                    Line::PlusDi => "DMP",
                    Line::MinusDi => "DMN",
                    _ => "ADX",
                };
                format!("{}_{}", prefix, period)
            }
            (Indicator::WilliamsR { period }, _) => format!("WILLR_{}", period),
            (Indicator::ParabolicSar { af, max_af }, line) => {
                let prefix = match line {
                    Line::Short => "PSARs",
                    Line::Af => "PSARaf",
                    Line::Reversal => "PSARr",
                    _ => "PSARl",
                };
                format!("{}_{}_{}", prefix, af, max_af)
            }
            (Indicator::Ichimoku { tenkan, kijun, senkou_b }, line) => match line {
                Line::Kijun => format!("ICHIMOKU_KIJUN_{}", kijun),
                Line::SpanA => format!("ICHIMOKU_SPAN_A_{}_{}", tenkan, kijun),
                Line::SpanB => format!("ICHIMOKU_SPAN_B_{}", senkou_b),
                Line::Chikou => format!("ICHIMOKU_CHIKOU_{}", kijun),
                _ => format!("ICHIMOKU_TENKAN_{}", tenkan),
            },
            (Indicator::Vwap, _) => "VWAP_D".to_string(),
            (Indicator::Envelope { period, percent }, line) => match line {
                Line::Upper => format!("EMA_ENV_UP_{}_{}%", period, percent),
                Line::Lower => format!("EMA_ENV_LOW_{}_{}%", period, percent),
                _ => format!("EMA_ENV_MID_{}", period),
            },
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.02), "0.02");
        assert_eq!(format_float(2.5), "2.5");
    }

    #[test]
    fn test_column_names() {
        assert_eq!(Indicator::Rsi { period: 14 }.key(Line::Value).column_name(), "RSI_14");
        let macd = Indicator::Macd { fast: 12, slow: 26, signal: 9 };
        assert_eq!(macd.key(Line::Macd).column_name(), "MACD_12_26_9");
        assert_eq!(macd.key(Line::Histogram).column_name(), "MACDh_12_26_9");
        assert_eq!(macd.key(Line::Signal).column_name(), "MACDs_12_26_9");
        let bb = Indicator::Bollinger { period: 20, std_dev: Ratio::new(2.0) };
        assert_eq!(bb.key(Line::Upper).column_name(), "BBU_20_2.0");
        assert_eq!(bb.key(Line::PercentB).column_name(), "BBP_20_2.0");
        let sar = Indicator::ParabolicSar { af: Ratio::new(0.02), max_af: Ratio::new(0.2) };
        assert_eq!(sar.key(Line::Long).column_name(), "PSARl_0.02_0.2");
        let env = Indicator::Envelope { period: 20, percent: Ratio::new(2.5) };
        assert_eq!(env.key(Line::Upper).column_name(), "EMA_ENV_UP_20_2.5%");
        assert_eq!(env.key(Line::Middle).column_name(), "EMA_ENV_MID_20");
        let ichi = Indicator::Ichimoku { tenkan: 9, kijun: 26, senkou_b: 52 };
        assert_eq!(ichi.key(Line::SpanA).column_name(), "ICHIMOKU_SPAN_A_9_26");
        assert_eq!(Indicator::Vwap.key(Line::Value).column_name(), "VWAP_D");
    }

    #[test]
    fn test_column_names_are_injective_over_parameters() {
        let indicators = [
            Indicator::Rsi { period: 14 },
            Indicator::Rsi { period: 21 },
            Indicator::Bollinger { period: 20, std_dev: Ratio::new(2.0) },
            Indicator::Bollinger { period: 20, std_dev: Ratio::new(2.5) },
            Indicator::Stochastic { k: 14, d: 3, smooth: 3 },
            Indicator::Stochastic { k: 14, d: 5, smooth: 3 },
        ];
        let mut names = HashSet::new();
        for indicator in indicators {
            for line in indicator.lines() {
                assert!(names.insert(indicator.key(*line).column_name()));
            }
        }
    }

    #[test]
    fn test_ratio_key_equality() {
        assert_eq!(Ratio::new(2.0), Ratio::new(2.0));
        assert!(Ratio::new(0.02) < Ratio::new(0.2));
    }

    #[test]
    fn test_lookback_saturates_for_huge_periods() {
        assert_eq!(Indicator::Adx { period: usize::MAX }.lookback(), usize::MAX);
        assert_eq!(Indicator::Rsi { period: usize::MAX }.lookback(), usize::MAX);
        assert_eq!(
            Indicator::Stochastic { k: usize::MAX, d: 3, smooth: 3 }.lookback(),
            usize::MAX - 2
        );
        assert_eq!(
            Indicator::Ichimoku { tenkan: 9, kijun: usize::MAX, senkou_b: 52 }.lookback(),
            usize::MAX
        );
    }

    #[test]
    fn test_lookback() {
        assert_eq!(Indicator::Rsi { period: 14 }.lookback(), 15);
        assert_eq!(Indicator::Adx { period: 14 }.lookback(), 28);
        assert_eq!(Indicator::Stochastic { k: 14, d: 3, smooth: 3 }.lookback(), 18);
        assert_eq!(Indicator::Macd { fast: 12, slow: 26, signal: 9 }.lookback(), 34);
        assert_eq!(
            Indicator::Ichimoku { tenkan: 9, kijun: 26, senkou_b: 52 }.lookback(),
            78
        );
        assert!(Indicator::Vwap.requires_volume());
        assert!(!Indicator::Atr { period: 14 }.requires_volume());
    }
}
