//! Indicator parameter set with documented defaults.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::key::{Indicator, Ratio};
use crate::data::normalizer::parse_number;

/// Rejected parameter value. Values are never clamped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParamError {
    #[error("parameter '{key}' is not numeric: {value}")]
    NotNumeric { key: String, value: String },

    #[error("parameter '{key}' must be an integer, got {value}")]
    NotInteger { key: String, value: f64 },

    #[error("parameter '{key}' out of range: {value} ({expected})")]
    OutOfRange {
        key: String,
        value: f64,
        expected: &'static str,
    },

    #[error("inconsistent parameters: {0}")]
    Inconsistent(String),
}

/// Every recognised key, in documentation order.
pub const PARAM_KEYS: &[&str] = &[
    "rsi_period",
    "atr_period",
    "stoch_k_period",
    "stoch_d_period",
    "stoch_slowing_period",
    "macd_fast_period",
    "macd_slow_period",
    "macd_signal_period",
    "bb_period",
    "bb_std_dev",
    "ichi_tenkan_period",
    "ichi_kijun_period",
    "ichi_senkou_b_period",
    "adx_period",
    "willr_period",
    "psar_af",
    "psar_max_af",
    "ma_env_period",
    "ma_env_percent",
];

/// Per-indicator parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub atr_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub stoch_slowing_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub ichi_tenkan_period: usize,
    pub ichi_kijun_period: usize,
    pub ichi_senkou_b_period: usize,
    pub adx_period: usize,
    pub willr_period: usize,
    pub psar_af: f64,
    pub psar_max_af: f64,
    pub ma_env_period: usize,
    pub ma_env_percent: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            atr_period: 14,
            stoch_k_period: 14,
            stoch_d_period: 3,
            stoch_slowing_period: 3,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            ichi_tenkan_period: 9,
            ichi_kijun_period: 26,
            ichi_senkou_b_period: 52,
            adx_period: 14,
            willr_period: 14,
            psar_af: 0.02,
            psar_max_af: 0.2,
            ma_env_period: 20,
            ma_env_percent: 2.5,
        }
    }
}

impl IndicatorParams {
    /// Build from a key/value map. Missing keys keep their default and
    /// unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, Value>) -> Result<Self, ParamError> {
        let mut params = Self::default();
        for (key, value) in map {
            params.set(key, value)?;
        }
        params.validate()?;
        Ok(params)
    }

    /// Parse a JSON object of parameters
    pub fn from_json_str(content: &str) -> Result<Self, ParamError> {
        let map: HashMap<String, Value> = serde_json::from_str(content)
            .map_err(|e| ParamError::Inconsistent(format!("invalid parameter object: {}", e)))?;
        Self::from_map(&map)
    }

    /// Set a single key. Returns Ok for unknown keys.
    pub fn set(&mut self, key: &str, value: &Value) -> Result<(), ParamError> {
        match key {
            "rsi_period" => self.rsi_period = int_param(key, value)?,
            "atr_period" => self.atr_period = int_param(key, value)?,
            "stoch_k_period" => self.stoch_k_period = int_param(key, value)?,
            "stoch_d_period" => self.stoch_d_period = int_param(key, value)?,
            "stoch_slowing_period" => self.stoch_slowing_period = int_param(key, value)?,
            "macd_fast_period" => self.macd_fast_period = int_param(key, value)?,
            "macd_slow_period" => self.macd_slow_period = int_param(key, value)?,
            "macd_signal_period" => self.macd_signal_period = int_param(key, value)?,
            "bb_period" => self.bb_period = int_param(key, value)?,
            "bb_std_dev" => self.bb_std_dev = float_param(key, value)?,
            "ichi_tenkan_period" => self.ichi_tenkan_period = int_param(key, value)?,
            "ichi_kijun_period" => self.ichi_kijun_period = int_param(key, value)?,
            "ichi_senkou_b_period" => self.ichi_senkou_b_period = int_param(key, value)?,
            "adx_period" => self.adx_period = int_param(key, value)?,
            "willr_period" => self.willr_period = int_param(key, value)?,
            "psar_af" => self.psar_af = float_param(key, value)?,
            "psar_max_af" => self.psar_max_af = float_param(key, value)?,
            "ma_env_period" => self.ma_env_period = int_param(key, value)?,
            "ma_env_percent" => self.ma_env_percent = float_param(key, value)?,
            _ => debug!("Ignoring unknown indicator parameter '{}'", key),
        }
        Ok(())
    }

    /// Cross-parameter checks
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.macd_fast_period >= self.macd_slow_period {
            return Err(ParamError::Inconsistent(format!(
                "macd_fast_period ({}) must be below macd_slow_period ({})",
                self.macd_fast_period, self.macd_slow_period
            )));
        }
        if self.psar_af > self.psar_max_af {
            return Err(ParamError::Inconsistent(format!(
                "psar_af ({}) must not exceed psar_max_af ({})",
                self.psar_af, self.psar_max_af
            )));
        }
        Ok(())
    }

    /// Parameters as a plain key/value map, e.g. for presets
    pub fn to_map(&self) -> HashMap<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(object)) => object.into_iter().collect(),
            _ => HashMap::new(),
        }
    }

    /// Default request set: one request per supported indicator
    pub fn requests(&self) -> Vec<Indicator> {
        vec![
            Indicator::Rsi { period: self.rsi_period },
            Indicator::Atr { period: self.atr_period },
            Indicator::Obv,
            Indicator::Stochastic {
                k: self.stoch_k_period,
                d: self.stoch_d_period,
                smooth: self.stoch_slowing_period,
            },
            Indicator::Macd {
                fast: self.macd_fast_period,
                slow: self.macd_slow_period,
                signal: self.macd_signal_period,
            },
            Indicator::Bollinger {
                period: self.bb_period,
                std_dev: Ratio::new(self.bb_std_dev),
            },
            Indicator::Adx { period: self.adx_period },
            Indicator::WilliamsR { period: self.willr_period },
            Indicator::ParabolicSar {
                af: Ratio::new(self.psar_af),
                max_af: Ratio::new(self.psar_max_af),
            },
            Indicator::Ichimoku {
                tenkan: self.ichi_tenkan_period,
                kijun: self.ichi_kijun_period,
                senkou_b: self.ichi_senkou_b_period,
            },
            Indicator::Vwap,
            Indicator::Envelope {
                period: self.ma_env_period,
                percent: Ratio::new(self.ma_env_percent),
            },
        ]
    }
}

fn numeric(key: &str, value: &Value) -> Result<f64, ParamError> {
    parse_number(value).ok_or_else(|| ParamError::NotNumeric {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Largest accepted period; anything above is a caller error, not clamped
const MAX_PERIOD: f64 = u32::MAX as f64;

fn int_param(key: &str, value: &Value) -> Result<usize, ParamError> {
    let v = numeric(key, value)?;
    if v.fract() != 0.0 {
        return Err(ParamError::NotInteger {
            key: key.to_string(),
            value: v,
        });
    }
    if !(1.0..=MAX_PERIOD).contains(&v) {
        return Err(ParamError::OutOfRange {
            key: key.to_string(),
            value: v,
            expected: "integer in 1..=4294967295",
        });
    }
    Ok(v as usize)
}

fn float_param(key: &str, value: &Value) -> Result<f64, ParamError> {
    let v = numeric(key, value)?;
    if v <= 0.0 {
        return Err(ParamError::OutOfRange {
            key: key.to_string(),
            value: v,
            expected: "> 0",
        });
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_defaults_and_unknown_keys() {
        let params = IndicatorParams::from_map(&map(&[("colour", json!("red"))])).unwrap();
        assert_eq!(params, IndicatorParams::default());
        assert_eq!(params.requests().len(), 12);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let params = IndicatorParams::from_map(&map(&[
            ("rsi_period", json!("21")),
            ("bb_std_dev", json!(2.5)),
        ]))
        .unwrap();
        assert_eq!(params.rsi_period, 21);
        assert_eq!(params.bb_std_dev, 2.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            IndicatorParams::from_map(&map(&[("rsi_period", json!(0))])),
            Err(ParamError::OutOfRange { .. })
        ));
        assert!(matches!(
            IndicatorParams::from_map(&map(&[("rsi_period", json!(14.5))])),
            Err(ParamError::NotInteger { .. })
        ));
        assert!(matches!(
            IndicatorParams::from_map(&map(&[("bb_std_dev", json!("wide"))])),
            Err(ParamError::NotNumeric { .. })
        ));
        assert!(matches!(
            IndicatorParams::from_map(&map(&[("bb_std_dev", json!(-1.0))])),
            Err(ParamError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_oversized_period_rejected() {
        for huge in [json!(1e19), json!(1e30), json!("5000000000")] {
            assert!(matches!(
                IndicatorParams::from_map(&map(&[("adx_period", huge.clone())])),
                Err(ParamError::OutOfRange { ref key, .. }) if key == "adx_period"
            ));
        }
        assert!(matches!(
            IndicatorParams::from_map(&map(&[("rsi_period", json!(f64::INFINITY))])),
            Err(_)
        ));
        let params = IndicatorParams::from_map(&map(&[("adx_period", json!(u32::MAX))])).unwrap();
        assert_eq!(params.adx_period, u32::MAX as usize);
    }

    #[test]
    fn test_cross_checks() {
        assert!(matches!(
            IndicatorParams::from_map(&map(&[("macd_fast_period", json!(30))])),
            Err(ParamError::Inconsistent(_))
        ));
        assert!(matches!(
            IndicatorParams::from_map(&map(&[("psar_af", json!(0.5))])),
            Err(ParamError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_to_map_round_trips() {
        let mut params = IndicatorParams::default();
        params.rsi_period = 9;
        let restored = IndicatorParams::from_map(&params.to_map()).unwrap();
        assert_eq!(restored, params);
        for key in PARAM_KEYS {
            assert!(params.to_map().contains_key(*key));
        }
    }
}
