//! Indicator engine: candles in, derived table plus outcome report out.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::array::{ArrayManager, Series};
use super::key::{Indicator, IndicatorKind, Line, SeriesKey};
use super::params::IndicatorParams;
use crate::data::{normalize, CandleTable, RawTable, SchemaError};

/// Why one indicator was left out of the derived table.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
pub enum IndicatorSkip {
    #[error("insufficient history: {required} rows required, {available} available")]
    InsufficientHistory { required: usize, available: usize },

    #[error("volume column missing")]
    MissingVolume,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Outcome of a single indicator request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OutcomeStatus {
    Computed { columns: Vec<String> },
    Skipped(IndicatorSkip),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorOutcome {
    pub indicator: Indicator,
    pub status: OutcomeStatus,
}

/// Pipeline level report, one outcome per request in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComputeReport {
    pub outcomes: Vec<IndicatorOutcome>,
    pub warnings: Vec<String>,
}

impl ComputeReport {
    pub fn computed(&self) -> impl Iterator<Item = &Indicator> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Computed { .. }))
            .map(|o| &o.indicator)
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&Indicator, &IndicatorSkip)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            OutcomeStatus::Skipped(skip) => Some((&o.indicator, skip)),
            OutcomeStatus::Computed { .. } => None,
        })
    }

    /// Outcome recorded for a request
    pub fn outcome(&self, indicator: &Indicator) -> Option<&OutcomeStatus> {
        self.outcomes
            .iter()
            .find(|o| &o.indicator == indicator)
            .map(|o| &o.status)
    }
}

/// Candle table plus one series per computed indicator line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedTable {
    candles: CandleTable,
    columns: BTreeMap<SeriesKey, Series>,
    report: ComputeReport,
}

impl DerivedTable {
    fn empty(candles: CandleTable, warning: &str) -> Self {
        warn!("{}", warning);
        Self {
            candles,
            columns: BTreeMap::new(),
            report: ComputeReport {
                outcomes: Vec::new(),
                warnings: vec![warning.to_string()],
            },
        }
    }

    pub fn candles(&self) -> &CandleTable {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn report(&self) -> &ComputeReport {
        &self.report
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&[Option<f64>]> {
        self.columns.get(key).map(Vec::as_slice)
    }

    /// Shorthand for `get(&indicator.key(line))`
    pub fn line(&self, indicator: &Indicator, line: Line) -> Option<&[Option<f64>]> {
        self.get(&indicator.key(line))
    }

    /// Look a column up by its display name, e.g. `RSI_14`
    pub fn get_by_name(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(key, _)| key.column_name() == name)
            .map(|(_, series)| series.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.columns.keys()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().map(SeriesKey::column_name).collect()
    }

    /// Computed parameterizations of one indicator family, in key order
    pub fn indicators_of(&self, kind: IndicatorKind) -> Vec<Indicator> {
        let mut found: Vec<Indicator> = Vec::new();
        for key in self.columns.keys() {
            if key.indicator.kind() == kind && !found.contains(&key.indicator) {
                found.push(key.indicator);
            }
        }
        found
    }
}

/// Computes a fixed list of indicator requests over candle tables.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    requests: Vec<Indicator>,
}

impl IndicatorEngine {
    /// Engine computing the default request set of `params`
    pub fn new(params: &IndicatorParams) -> Self {
        Self::with_requests(params.requests())
    }

    /// Engine computing an explicit request list; duplicates are dropped.
    pub fn with_requests(requests: Vec<Indicator>) -> Self {
        let mut unique: Vec<Indicator> = Vec::with_capacity(requests.len());
        for request in requests {
            if !unique.contains(&request) {
                unique.push(request);
            }
        }
        Self { requests: unique }
    }

    pub fn requests(&self) -> &[Indicator] {
        &self.requests
    }

    /// Normalize a raw table then compute every request.
    ///
    /// An empty raw table is not an error: the result is an empty derived
    /// table carrying a warning.
    pub fn compute(&self, raw: &RawTable) -> Result<DerivedTable, SchemaError> {
        if raw.is_empty() {
            return Ok(DerivedTable::empty(
                CandleTable::empty(),
                "Empty candle table, no indicators computed",
            ));
        }
        let candles = normalize(raw)?;
        Ok(self.compute_table(&candles))
    }

    /// Compute every request over normalized candles.
    pub fn compute_table(&self, candles: &CandleTable) -> DerivedTable {
        if candles.is_empty() {
            return DerivedTable::empty(
                candles.clone(),
                "Empty candle table, no indicators computed",
            );
        }

        let am = ArrayManager::new(candles);
        let has_volume = candles.has_volume();

        // Indicators are independent, collect keeps request order
        let results: Vec<(Indicator, Result<Vec<(Line, Series)>, IndicatorSkip>)> = self
            .requests
            .par_iter()
            .map(|indicator| (*indicator, compute_one(&am, indicator, has_volume)))
            .collect();

        let mut columns = BTreeMap::new();
        let mut report = ComputeReport::default();
        for (indicator, result) in results {
            let status = match result {
                Ok(lines) => {
                    let mut names = Vec::with_capacity(lines.len());
                    for (line, series) in lines {
                        let key = indicator.key(line);
                        names.push(key.column_name());
                        columns.insert(key, series);
                    }
                    OutcomeStatus::Computed { columns: names }
                }
                Err(skip) => {
                    warn!("Skipping {}: {}", indicator, skip);
                    OutcomeStatus::Skipped(skip)
                }
            };
            report.outcomes.push(IndicatorOutcome { indicator, status });
        }

        info!(
            "Computed {} of {} indicators over {} candles",
            report.computed().count(),
            report.outcomes.len(),
            candles.len()
        );

        DerivedTable {
            candles: candles.clone(),
            columns,
            report,
        }
    }
}

/// Compute the default request set of `params` over a raw table
pub fn compute(raw: &RawTable, params: &IndicatorParams) -> Result<DerivedTable, SchemaError> {
    IndicatorEngine::new(params).compute(raw)
}

fn invalid(e: ta::errors::TaError) -> IndicatorSkip {
    IndicatorSkip::InvalidParameter(format!("{:?}", e))
}

fn compute_one(
    am: &ArrayManager,
    indicator: &Indicator,
    has_volume: bool,
) -> Result<Vec<(Line, Series)>, IndicatorSkip> {
    if indicator.requires_volume() && !has_volume {
        return Err(IndicatorSkip::MissingVolume);
    }
    let required = indicator.lookback();
    if am.size() < required {
        return Err(IndicatorSkip::InsufficientHistory {
            required,
            available: am.size(),
        });
    }

    let lines = match *indicator {
        Indicator::Rsi { period } => vec![(Line::Value, am.rsi_array(period))],
        Indicator::Atr { period } => vec![(Line::Value, am.atr_array(period))],
        Indicator::Obv => vec![(Line::Value, am.obv_array())],
        Indicator::Stochastic { k, d, smooth } => {
            let (k_line, d_line) = am.stoch_array(k, d, smooth).map_err(invalid)?;
            vec![(Line::K, k_line), (Line::D, d_line)]
        }
        Indicator::Macd { fast, slow, signal } => {
            let (macd, signal_line, hist) = am.macd_array(fast, slow, signal);
            vec![
                (Line::Macd, macd),
                (Line::Histogram, hist),
                (Line::Signal, signal_line),
            ]
        }
        Indicator::Bollinger { period, std_dev } => {
            let bb = am.boll_array(period, std_dev.value()).map_err(invalid)?;
            vec![
                (Line::Lower, bb.lower),
                (Line::Middle, bb.middle),
                (Line::Upper, bb.upper),
                (Line::Bandwidth, bb.bandwidth),
                (Line::PercentB, bb.percent),
            ]
        }
        Indicator::Adx { period } => {
            let (adx, plus_di, minus_di) = am.adx_array(period);
            vec![
                (Line::Adx, adx),
                (Line::PlusDi, plus_di),
                (Line::MinusDi, minus_di),
            ]
        }
        Indicator::WilliamsR { period } => {
            vec![(Line::Value, am.willr_array(period).map_err(invalid)?)]
        }
        Indicator::ParabolicSar { af, max_af } => {
            let sar = am.sar_array(af.value(), max_af.value());
            vec![
                (Line::Long, sar.long),
                (Line::Short, sar.short),
                (Line::Af, sar.af),
                (Line::Reversal, sar.reversal),
            ]
        }
        Indicator::Ichimoku { tenkan, kijun, senkou_b } => {
            let ichi = am
                .ichimoku_array(tenkan, kijun, senkou_b)
                .map_err(invalid)?;
            vec![
                (Line::Tenkan, ichi.tenkan),
                (Line::Kijun, ichi.kijun),
                (Line::SpanA, ichi.span_a),
                (Line::SpanB, ichi.span_b),
                (Line::Chikou, ichi.chikou),
            ]
        }
        Indicator::Vwap => vec![(Line::Value, am.vwap_array())],
        Indicator::Envelope { period, percent } => {
            let (middle, upper, lower) = am.envelope_array(period, percent.value());
            vec![
                (Line::Middle, middle),
                (Line::Upper, upper),
                (Line::Lower, lower),
            ]
        }
    };
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Candle, RawColumn};
    use crate::indicator::key::Ratio;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn uptrend(rows: usize) -> CandleTable {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let candles = (0..rows)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle::new(
                    start + Duration::hours(i as i64),
                    close - 0.5,
                    close + 0.5,
                    close - 1.0,
                    close,
                    1_000.0,
                )
            })
            .collect();
        CandleTable::new(candles)
    }

    #[test]
    fn test_uptrend_saturates_rsi() {
        let derived = IndicatorEngine::new(&IndicatorParams::default()).compute_table(&uptrend(50));
        let rsi = derived.get_by_name("RSI_14").unwrap();
        assert!(rsi[..14].iter().all(Option::is_none));
        for v in &rsi[14..] {
            assert!((v.unwrap() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_two_rsi_parameterizations_coexist() {
        let engine = IndicatorEngine::with_requests(vec![
            Indicator::Rsi { period: 14 },
            Indicator::Rsi { period: 21 },
        ]);
        let derived = engine.compute_table(&uptrend(60));
        assert!(derived.get_by_name("RSI_14").is_some());
        assert!(derived.get_by_name("RSI_21").is_some());
        assert_eq!(derived.indicators_of(IndicatorKind::Rsi).len(), 2);
    }

    #[test]
    fn test_default_set_column_names() {
        let derived = IndicatorEngine::new(&IndicatorParams::default()).compute_table(&uptrend(120));
        for name in [
            "RSI_14",
            "ATR_14",
            "OBV",
            "STOCHk_14_3_3",
            "MACDh_12_26_9",
            "BBU_20_2.0",
            "ADX_14",
            "WILLR_14",
            "PSARaf_0.02_0.2",
            "ICHIMOKU_SPAN_B_52",
            "VWAP_D",
            "EMA_ENV_LOW_20_2.5%",
        ] {
            assert!(derived.get_by_name(name).is_some(), "missing {}", name);
        }
        assert_eq!(derived.report().skipped().count(), 0);
    }

    #[test]
    fn test_short_history_is_skipped_not_fatal() {
        let derived = IndicatorEngine::new(&IndicatorParams::default()).compute_table(&uptrend(20));
        assert!(derived.get_by_name("RSI_14").is_some());
        assert!(derived.get_by_name("ADX_14").is_none());
        assert_eq!(
            derived.report().outcome(&Indicator::Adx { period: 14 }),
            Some(&OutcomeStatus::Skipped(IndicatorSkip::InsufficientHistory {
                required: 28,
                available: 20,
            }))
        );
    }

    #[test]
    fn test_multi_line_indicators_need_history_for_every_line() {
        let requests = vec![
            Indicator::Ichimoku { tenkan: 9, kijun: 26, senkou_b: 52 },
            Indicator::Macd { fast: 12, slow: 26, signal: 9 },
            Indicator::Stochastic { k: 14, d: 3, smooth: 3 },
        ];
        let engine = IndicatorEngine::with_requests(requests.clone());

        let short = engine.compute_table(&uptrend(60));
        assert!(short.get_by_name("ICHIMOKU_SPAN_B_52").is_none());
        assert_eq!(
            short.report().outcome(&requests[0]),
            Some(&OutcomeStatus::Skipped(IndicatorSkip::InsufficientHistory {
                required: 78,
                available: 60,
            }))
        );

        for indicator in &requests {
            let required = indicator.lookback();
            let below = engine.compute_table(&uptrend(required - 1));
            assert!(matches!(
                below.report().outcome(indicator),
                Some(OutcomeStatus::Skipped(IndicatorSkip::InsufficientHistory { .. }))
            ));

            let exact = engine.compute_table(&uptrend(required));
            for line in indicator.lines() {
                let series = exact.get(&indicator.key(*line)).unwrap();
                assert!(
                    series.iter().any(Option::is_some),
                    "{} has no values at {} rows",
                    indicator.key(*line),
                    required
                );
            }
        }
    }

    #[test]
    fn test_huge_period_is_skipped_without_panicking() {
        let engine = IndicatorEngine::with_requests(vec![
            Indicator::Adx { period: usize::MAX },
            Indicator::Stochastic { k: usize::MAX, d: usize::MAX, smooth: usize::MAX },
            Indicator::Rsi { period: 14 },
        ]);
        let derived = engine.compute_table(&uptrend(50));
        assert!(derived.get_by_name("RSI_14").is_some());
        assert_eq!(derived.report().skipped().count(), 2);
        assert_eq!(
            derived.report().outcome(&Indicator::Adx { period: usize::MAX }),
            Some(&OutcomeStatus::Skipped(IndicatorSkip::InsufficientHistory {
                required: usize::MAX,
                available: 50,
            }))
        );
    }

    #[test]
    fn test_missing_volume_skips_volume_indicators() {
        let candles = uptrend(40).candles().to_vec();
        let derived = IndicatorEngine::new(&IndicatorParams::default())
            .compute_table(&CandleTable::without_volume(candles));
        assert!(derived.get_by_name("OBV").is_none());
        assert!(derived.get_by_name("VWAP_D").is_none());
        assert_eq!(
            derived.report().outcome(&Indicator::Obv),
            Some(&OutcomeStatus::Skipped(IndicatorSkip::MissingVolume))
        );
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let derived = compute(&RawTable::default(), &IndicatorParams::default()).unwrap();
        assert!(derived.is_empty());
        assert!(derived.column_names().is_empty());
        assert_eq!(derived.report().warnings.len(), 1);
    }

    #[test]
    fn test_compute_from_raw_columns() {
        let rows = 30;
        let col = |name: &str, f: &dyn Fn(usize) -> f64| RawColumn {
            name: name.to_string(),
            values: (0..rows).map(|i| json!(f(i))).collect(),
        };
        let raw = RawTable::from_columns(vec![
            col("Open Time", &|i| 1_700_000_000.0 + 3600.0 * i as f64),
            col("Open", &|i| 10.0 + i as f64),
            col("High", &|i| 11.0 + i as f64),
            col("Low", &|i| 9.0 + i as f64),
            col("Close", &|i| 10.5 + i as f64),
            col("Volume", &|_| 5.0),
        ])
        .unwrap();
        let engine = IndicatorEngine::with_requests(vec![Indicator::Atr { period: 14 }]);
        let derived = engine.compute(&raw).unwrap();
        assert_eq!(derived.len(), rows);
        assert!(derived.get_by_name("ATR_14").unwrap()[14].is_some());
    }

    #[test]
    fn test_schema_error_propagates() {
        let raw = RawTable::from_columns(vec![RawColumn {
            name: "close".to_string(),
            values: vec![json!(1.0)],
        }])
        .unwrap();
        assert!(compute(&raw, &IndicatorParams::default()).is_err());
    }

    #[test]
    fn test_duplicate_requests_collapse() {
        let bb = Indicator::Bollinger { period: 20, std_dev: Ratio::new(2.0) };
        let engine = IndicatorEngine::with_requests(vec![bb, bb]);
        assert_eq!(engine.requests().len(), 1);
    }
}
