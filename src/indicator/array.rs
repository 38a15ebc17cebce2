//! Full history array manager for calculating indicator series.
//!
//! Every series has one entry per candle. `None` marks rows where the
//! indicator has not accumulated enough history (or is mathematically
//! undefined, e.g. a zero price range).

use chrono::{DateTime, NaiveDate, Utc};
use ta::indicators::{BollingerBands, Maximum, Minimum, OnBalanceVolume, SimpleMovingAverage, TrueRange};
use ta::{Next, Reset};

use crate::data::{Candle, CandleTable};

/// One value per candle, `None` where undefined
pub type Series = Vec<Option<f64>>;

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Simple moving average over runs of defined values.
///
/// An undefined input restarts the window.
pub fn sma_series(values: &[Option<f64>], n: usize) -> ta::errors::Result<Series> {
    let mut indicator = SimpleMovingAverage::new(n)?;
    let mut out = vec![None; values.len()];
    let mut run = 0usize;
    for (i, value) in values.iter().enumerate() {
        match value {
            Some(v) => {
                run += 1;
                let mean = indicator.next(*v);
                if run >= n {
                    out[i] = finite(mean);
                }
            }
            None => {
                if run > 0 {
                    indicator.reset();
                    run = 0;
                }
            }
        }
    }
    Ok(out)
}

/// Exponential moving average seeded with the SMA of the first `n` values
pub fn ema_series(values: &[Option<f64>], n: usize) -> Series {
    let multiplier = 2.0 / (n as f64 + 1.0);
    smoothed_series(values, n, |prev, x| x * multiplier + prev * (1.0 - multiplier))
}

/// Wilder's smoothing (alpha = 1/n) seeded with the SMA of the first `n` values
pub fn wilder_series(values: &[Option<f64>], n: usize) -> Series {
    let period = n as f64;
    smoothed_series(values, n, |prev, x| prev + (x - prev) / period)
}

fn smoothed_series(values: &[Option<f64>], n: usize, step: impl Fn(f64, f64) -> f64) -> Series {
    let mut out = vec![None; values.len()];
    if n == 0 {
        return out;
    }

    let mut run = 0usize;
    let mut seed_sum = 0.0;
    let mut current: Option<f64> = None;
    for (i, value) in values.iter().enumerate() {
        let Some(x) = *value else {
            run = 0;
            seed_sum = 0.0;
            current = None;
            continue;
        };

        run += 1;
        current = match current {
            Some(prev) => Some(step(prev, x)),
            None => {
                seed_sum += x;
                (run == n).then(|| seed_sum / n as f64)
            }
        };
        out[i] = current.and_then(finite);
    }
    out
}

fn zip_with(a: &[Option<f64>], b: &[Option<f64>], f: impl Fn(f64, f64) -> Option<f64>) -> Series {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => f(*x, *y).and_then(finite),
            _ => None,
        })
        .collect()
}

/// Shift a series forward by `offset` rows, dropping what falls off the end
fn shift_forward(values: &[Option<f64>], offset: usize) -> Series {
    (0..values.len())
        .map(|i| if i >= offset { values[i - offset] } else { None })
        .collect()
}

/// Bollinger band outputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollSeries {
    pub lower: Series,
    pub middle: Series,
    pub upper: Series,
    pub bandwidth: Series,
    pub percent: Series,
}

/// Parabolic SAR outputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SarSeries {
    pub long: Series,
    pub short: Series,
    pub af: Series,
    pub reversal: Series,
}

/// Ichimoku outputs, spans already displaced forward by the kijun period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IchimokuSeries {
    pub tenkan: Series,
    pub kijun: Series,
    pub span_a: Series,
    pub span_b: Series,
    pub chikou: Series,
}

/// Array manager over a complete candle table
/// Uses ta-rs library where it offers the calculation directly
#[derive(Debug, Clone, Default)]
pub struct ArrayManager {
    size: usize,

    pub datetime_array: Vec<DateTime<Utc>>,
    pub open_array: Vec<f64>,
    pub high_array: Vec<f64>,
    pub low_array: Vec<f64>,
    pub close_array: Vec<f64>,
    pub volume_array: Vec<f64>,
}

impl ArrayManager {
    /// Create a new ArrayManager from a candle table
    pub fn new(table: &CandleTable) -> Self {
        let candles = table.candles();
        Self {
            size: candles.len(),
            datetime_array: candles.iter().map(|c| c.datetime).collect(),
            open_array: candles.iter().map(|c| c.open).collect(),
            high_array: candles.iter().map(|c| c.high).collect(),
            low_array: candles.iter().map(|c| c.low).collect(),
            close_array: candles.iter().map(|c| c.close).collect(),
            volume_array: candles.iter().map(|c| c.volume).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Get close price array
    pub fn close(&self) -> &[f64] {
        &self.close_array
    }

    /// Get volume array
    pub fn volume(&self) -> &[f64] {
        &self.volume_array
    }

    /// Create a ta-rs data item from index
    fn get_data_item(&self, i: usize) -> Candle {
        Candle::new(
            self.datetime_array[i],
            self.open_array[i],
            self.high_array[i],
            self.low_array[i],
            self.close_array[i],
            self.volume_array[i],
        )
    }

    fn close_series(&self) -> Series {
        self.close_array.iter().map(|&c| Some(c)).collect()
    }

    // ==================== Moving Averages ====================

    /// Simple Moving Average of close
    pub fn sma_array(&self, n: usize) -> ta::errors::Result<Series> {
        sma_series(&self.close_series(), n)
    }

    /// Exponential Moving Average of close
    pub fn ema_array(&self, n: usize) -> Series {
        ema_series(&self.close_series(), n)
    }

    // ==================== Channels ====================

    /// Highest high over the last n candles
    pub fn highest_array(&self, n: usize) -> ta::errors::Result<Series> {
        let mut indicator = Maximum::new(n)?;
        Ok(self
            .high_array
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let value = indicator.next(v);
                if i + 1 >= n { finite(value) } else { None }
            })
            .collect())
    }

    /// Lowest low over the last n candles
    pub fn lowest_array(&self, n: usize) -> ta::errors::Result<Series> {
        let mut indicator = Minimum::new(n)?;
        Ok(self
            .low_array
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let value = indicator.next(v);
                if i + 1 >= n { finite(value) } else { None }
            })
            .collect())
    }

    fn midpoint_array(&self, n: usize) -> ta::errors::Result<Series> {
        let highest = self.highest_array(n)?;
        let lowest = self.lowest_array(n)?;
        Ok(zip_with(&highest, &lowest, |h, l| Some((h + l) / 2.0)))
    }

    /// Bollinger Bands
    pub fn boll_array(&self, n: usize, dev: f64) -> ta::errors::Result<BollSeries> {
        let mut indicator = BollingerBands::new(n, dev)?;
        let mut out = BollSeries::default();
        for (i, &close) in self.close_array.iter().enumerate() {
            let band = indicator.next(close);
            let ready = i + 1 >= n;
            let (lower, middle, upper) = if ready {
                (finite(band.lower), finite(band.average), finite(band.upper))
            } else {
                (None, None, None)
            };

            let bandwidth = match (lower, middle, upper) {
                (Some(l), Some(m), Some(u)) if m != 0.0 => finite(100.0 * (u - l) / m),
                _ => None,
            };
            let percent = match (lower, upper) {
                (Some(l), Some(u)) if u != l => finite((close - l) / (u - l)),
                _ => None,
            };

            out.lower.push(lower);
            out.middle.push(middle);
            out.upper.push(upper);
            out.bandwidth.push(bandwidth);
            out.percent.push(percent);
        }
        Ok(out)
    }

    /// EMA envelope: (middle, upper, lower) with bands `percent`% away from the EMA
    pub fn envelope_array(&self, n: usize, percent: f64) -> (Series, Series, Series) {
        let middle = self.ema_array(n);
        let ratio = percent / 100.0;
        let upper = middle.iter().map(|m| m.map(|m| m * (1.0 + ratio))).collect();
        let lower = middle.iter().map(|m| m.map(|m| m * (1.0 - ratio))).collect();
        (middle, upper, lower)
    }

    // ==================== Momentum Indicators ====================

    /// Relative Strength Index with Wilder's smoothing
    pub fn rsi_array(&self, n: usize) -> Series {
        let mut gains = vec![None; self.size];
        let mut losses = vec![None; self.size];
        for i in 1..self.size {
            let change = self.close_array[i] - self.close_array[i - 1];
            gains[i] = Some(change.max(0.0));
            losses[i] = Some((-change).max(0.0));
        }

        let avg_gain = wilder_series(&gains, n);
        let avg_loss = wilder_series(&losses, n);

        // A flat window has no direction: report the midpoint
        zip_with(&avg_gain, &avg_loss, |gain, loss| {
            if gain + loss == 0.0 {
                Some(50.0)
            } else {
                Some(100.0 * gain / (gain + loss))
            }
        })
    }

    /// MACD: (macd, signal, histogram)
    pub fn macd_array(&self, fast: usize, slow: usize, signal: usize) -> (Series, Series, Series) {
        let fast_ema = self.ema_array(fast);
        let slow_ema = self.ema_array(slow);
        let macd = zip_with(&fast_ema, &slow_ema, |f, s| Some(f - s));
        let signal_line = ema_series(&macd, signal);
        let hist = zip_with(&macd, &signal_line, |m, s| Some(m - s));
        (macd, signal_line, hist)
    }

    /// Stochastic oscillator: (%K smoothed, %D)
    pub fn stoch_array(&self, k: usize, d: usize, smooth: usize) -> ta::errors::Result<(Series, Series)> {
        let highest = self.highest_array(k)?;
        let lowest = self.lowest_array(k)?;
        let raw: Series = (0..self.size)
            .map(|i| match (highest[i], lowest[i]) {
                (Some(h), Some(l)) if h > l => finite(100.0 * (self.close_array[i] - l) / (h - l)),
                _ => None,
            })
            .collect();

        let k_line = sma_series(&raw, smooth)?;
        let d_line = sma_series(&k_line, d)?;
        Ok((k_line, d_line))
    }

    /// Williams %R
    pub fn willr_array(&self, n: usize) -> ta::errors::Result<Series> {
        let highest = self.highest_array(n)?;
        let lowest = self.lowest_array(n)?;
        Ok((0..self.size)
            .map(|i| match (highest[i], lowest[i]) {
                (Some(h), Some(l)) if h > l => finite(-100.0 * (h - self.close_array[i]) / (h - l)),
                _ => None,
            })
            .collect())
    }

    // ==================== Volatility ====================

    /// True range, undefined on the first candle
    pub fn trange_array(&self) -> Series {
        let mut indicator = TrueRange::new();
        let mut out: Series = (0..self.size)
            .map(|i| finite(indicator.next(&self.get_data_item(i))))
            .collect();
        if let Some(first) = out.first_mut() {
            *first = None;
        }
        out
    }

    /// Average True Range with Wilder's smoothing
    pub fn atr_array(&self, n: usize) -> Series {
        wilder_series(&self.trange_array(), n)
    }

    // ==================== Volume ====================

    /// On Balance Volume
    pub fn obv_array(&self) -> Series {
        let mut indicator = OnBalanceVolume::new();
        (0..self.size)
            .map(|i| finite(indicator.next(&self.get_data_item(i))))
            .collect()
    }

    /// Volume weighted average price, reset at each UTC calendar day
    pub fn vwap_array(&self) -> Series {
        let mut day: Option<NaiveDate> = None;
        let mut cum_pv = 0.0;
        let mut cum_volume = 0.0;
        (0..self.size)
            .map(|i| {
                let today = self.datetime_array[i].date_naive();
                if day != Some(today) {
                    day = Some(today);
                    cum_pv = 0.0;
                    cum_volume = 0.0;
                }
                let item = self.get_data_item(i);
                cum_pv += item.typical_price() * item.volume;
                cum_volume += item.volume;
                if cum_volume > 0.0 { finite(cum_pv / cum_volume) } else { None }
            })
            .collect()
    }

    // ==================== Directional Movement ====================

    /// Average Directional Index: (adx, +DI, -DI)
    pub fn adx_array(&self, n: usize) -> (Series, Series, Series) {
        let mut plus_dm = vec![None; self.size];
        let mut minus_dm = vec![None; self.size];

        // Calculate +DM, -DM
        for i in 1..self.size {
            let high_diff = self.high_array[i] - self.high_array[i - 1];
            let low_diff = self.low_array[i - 1] - self.low_array[i];

            let pdm = if high_diff > low_diff && high_diff > 0.0 { high_diff } else { 0.0 };
            let mdm = if low_diff > high_diff && low_diff > 0.0 { low_diff } else { 0.0 };

            plus_dm[i] = Some(pdm);
            minus_dm[i] = Some(mdm);
        }

        let smoothed_plus_dm = wilder_series(&plus_dm, n);
        let smoothed_minus_dm = wilder_series(&minus_dm, n);
        let smoothed_tr = wilder_series(&self.trange_array(), n);

        let plus_di = zip_with(&smoothed_plus_dm, &smoothed_tr, |dm, tr| {
            (tr != 0.0).then(|| 100.0 * dm / tr)
        });
        let minus_di = zip_with(&smoothed_minus_dm, &smoothed_tr, |dm, tr| {
            (tr != 0.0).then(|| 100.0 * dm / tr)
        });
        let dx = zip_with(&plus_di, &minus_di, |p, m| {
            let di_sum = p + m;
            (di_sum != 0.0).then(|| 100.0 * (p - m).abs() / di_sum)
        });

        // ADX is smoothed DX
        let adx = wilder_series(&dx, n);
        (adx, plus_di, minus_di)
    }

    // ==================== SAR (Parabolic SAR) ====================

    /// Parabolic SAR, split into long and short phases
    pub fn sar_array(&self, acceleration: f64, maximum: f64) -> SarSeries {
        let mut out = SarSeries {
            long: vec![None; self.size],
            short: vec![None; self.size],
            af: vec![None; self.size],
            reversal: vec![None; self.size],
        };
        if self.size < 2 {
            return out;
        }

        let h = &self.high_array;
        let l = &self.low_array;

        // Start short only when the second bar clearly moves down
        let up_move = h[1] - h[0];
        let down_move = l[0] - l[1];
        let mut is_long = !(down_move > up_move && down_move > 0.0);
        let mut sar = if is_long { l[0] } else { h[0] };
        let mut ep = if is_long { h[0] } else { l[0] };
        let mut af = acceleration;

        out.af[0] = Some(af);
        out.reversal[0] = Some(0.0);

        for i in 1..self.size {
            sar += af * (ep - sar);
            let mut reversed = false;

            if is_long {
                sar = sar.min(l[i - 1]);
                if i >= 2 {
                    sar = sar.min(l[i - 2]);
                }
                if l[i] < sar {
                    is_long = false;
                    reversed = true;
                    sar = ep;
                    ep = l[i];
                    af = acceleration;
                } else if h[i] > ep {
                    ep = h[i];
                    af = (af + acceleration).min(maximum);
                }
            } else {
                sar = sar.max(h[i - 1]);
                if i >= 2 {
                    sar = sar.max(h[i - 2]);
                }
                if h[i] > sar {
                    is_long = true;
                    reversed = true;
                    sar = ep;
                    ep = h[i];
                    af = acceleration;
                } else if l[i] < ep {
                    ep = l[i];
                    af = (af + acceleration).min(maximum);
                }
            }

            if is_long {
                out.long[i] = finite(sar);
            } else {
                out.short[i] = finite(sar);
            }
            out.af[i] = Some(af);
            out.reversal[i] = Some(if reversed { 1.0 } else { 0.0 });
        }
        out
    }

    // ==================== Ichimoku ====================

    /// Ichimoku cloud; spans are displaced forward by `kijun` rows.
    ///
    /// The conventional lagging span plots each close `kijun` rows in the
    /// past, which a row-aligned series can only express by reading the
    /// future. Here `chikou[i]` is simply `close[i]` from row `kijun` on,
    /// so it carries no information beyond the close itself and exists to
    /// keep the column set complete.
    pub fn ichimoku_array(&self, tenkan: usize, kijun: usize, senkou_b: usize) -> ta::errors::Result<IchimokuSeries> {
        let tenkan_line = self.midpoint_array(tenkan)?;
        let kijun_line = self.midpoint_array(kijun)?;
        let span_a = zip_with(&tenkan_line, &kijun_line, |t, k| Some((t + k) / 2.0));
        let span_b = self.midpoint_array(senkou_b)?;
        let chikou = self
            .close_array
            .iter()
            .enumerate()
            .map(|(i, &c)| if i >= kijun { Some(c) } else { None })
            .collect();

        Ok(IchimokuSeries {
            tenkan: tenkan_line,
            kijun: kijun_line,
            span_a: shift_forward(&span_a, kijun),
            span_b: shift_forward(&span_b, kijun),
            chikou,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_table(closes: &[f64]) -> CandleTable {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::new(
                    start + Duration::hours(4 * i as i64),
                    c,
                    c + 1.0,
                    c - 1.0,
                    c,
                    100.0 + i as f64,
                )
            })
            .collect();
        CandleTable::new(candles)
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1).collect()
    }

    #[test]
    fn test_sma_series_restarts_after_gap() {
        let values = vec![Some(1.0), Some(2.0), None, Some(3.0), Some(5.0)];
        let out = sma_series(&values, 2).unwrap();
        assert_eq!(out, vec![None, Some(1.5), None, None, Some(4.0)]);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let values: Series = [1.0, 2.0, 3.0, 4.0].iter().map(|&v| Some(v)).collect();
        let out = ema_series(&values, 3);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert!((out[3].unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_range_and_warmup() {
        let am = ArrayManager::new(&make_table(&wave(60)));
        let rsi = am.rsi_array(14);
        assert!(rsi[..14].iter().all(Option::is_none));
        for v in &rsi[14..] {
            let v = v.unwrap();
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn test_rsi_bounded_for_any_period_at_twice_its_length() {
        for period in [2, 3, 5, 9, 14, 21, 30] {
            let am = ArrayManager::new(&make_table(&wave(2 * period)));
            let rsi = am.rsi_array(period);
            assert_eq!(rsi.len(), 2 * period);
            assert!(rsi[..period].iter().all(Option::is_none), "period {}", period);
            for v in &rsi[period..] {
                let v = v.unwrap();
                assert!((0.0..=100.0).contains(&v), "period {} gave {}", period, v);
            }
        }
    }

    #[test]
    fn test_rsi_uptrend_saturates() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let am = ArrayManager::new(&make_table(&closes));
        let rsi = am.rsi_array(14);
        assert_eq!(rsi[29], Some(100.0));
    }

    #[test]
    fn test_rsi_flat_is_midpoint() {
        let am = ArrayManager::new(&make_table(&[10.0; 20]));
        assert_eq!(am.rsi_array(5)[19], Some(50.0));
    }

    #[test]
    fn test_atr_constant_range() {
        let am = ArrayManager::new(&make_table(&[10.0; 20]));
        let atr = am.atr_array(5);
        assert_eq!(atr[4], None);
        assert!((atr[5].unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bollinger_order() {
        let am = ArrayManager::new(&make_table(&wave(40)));
        let bb = am.boll_array(20, 2.0).unwrap();
        assert!(bb.middle[18].is_none());
        for i in 19..40 {
            let (l, m, u) = (bb.lower[i].unwrap(), bb.middle[i].unwrap(), bb.upper[i].unwrap());
            assert!(l <= m && m <= u);
        }
    }

    #[test]
    fn test_macd_histogram_is_difference() {
        let am = ArrayManager::new(&make_table(&wave(80)));
        let (macd, signal, hist) = am.macd_array(12, 26, 9);
        assert!(macd[24].is_none());
        assert!(macd[25].is_some());
        assert!(signal[32].is_none());
        let i = 79;
        assert!((hist[i].unwrap() - (macd[i].unwrap() - signal[i].unwrap())).abs() < 1e-9);
    }

    #[test]
    fn test_stoch_and_willr_bounds() {
        let am = ArrayManager::new(&make_table(&wave(60)));
        let (k, d) = am.stoch_array(14, 3, 3).unwrap();
        let willr = am.willr_array(14).unwrap();
        assert!(k[14].is_none());
        assert!(k[15].is_some());
        assert!(d[17].is_some());
        for v in k.iter().chain(d.iter()).flatten() {
            assert!((0.0..=100.0).contains(v));
        }
        for v in willr.iter().flatten() {
            assert!((-100.0..=0.0).contains(v));
        }
    }

    #[test]
    fn test_adx_warmup() {
        let am = ArrayManager::new(&make_table(&wave(60)));
        let (adx, plus, minus) = am.adx_array(14);
        assert!(plus[13].is_none());
        assert!(plus[14].is_some() && minus[14].is_some());
        assert!(adx[26].is_none());
        assert!(adx[27].is_some());
    }

    #[test]
    fn test_sar_uptrend_stays_long() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + 2.0 * i as f64).collect();
        let am = ArrayManager::new(&make_table(&closes));
        let sar = am.sar_array(0.02, 0.2);
        assert!(sar.long[0].is_none());
        assert!(sar.long[1..].iter().all(Option::is_some));
        assert!(sar.short.iter().all(Option::is_none));
        for i in 1..20 {
            assert!(sar.long[i].unwrap() < am.low_array[i]);
        }
        assert!(sar.af[19].unwrap() <= 0.2 + 1e-12);
    }

    #[test]
    fn test_ichimoku_spans_are_displaced() {
        let am = ArrayManager::new(&make_table(&wave(100)));
        let ichi = am.ichimoku_array(9, 26, 52).unwrap();
        assert!(ichi.tenkan[8].is_some());
        assert!(ichi.span_a[51].is_some());
        assert!(ichi.span_a[50].is_none());
        assert!(ichi.span_b[77].is_some());
        assert!(ichi.span_b[76].is_none());
        assert!(ichi.chikou[25].is_none());
        assert_eq!(ichi.chikou[26], Some(am.close_array[26]));
    }

    #[test]
    fn test_vwap_resets_daily() {
        let am = ArrayManager::new(&make_table(&wave(12)));
        let vwap = am.vwap_array();
        // six 4h candles per day, so row 6 starts a new day
        let first = am.get_data_item(6).typical_price();
        assert!((vwap[6].unwrap() - first).abs() < 1e-9);
    }

    #[test]
    fn test_envelope_brackets_ema() {
        let am = ArrayManager::new(&make_table(&wave(40)));
        let (mid, up, low) = am.envelope_array(20, 2.5);
        assert!(mid[18].is_none());
        let m = mid[30].unwrap();
        assert!((up[30].unwrap() - m * 1.025).abs() < 1e-9);
        assert!((low[30].unwrap() - m * 0.975).abs() < 1e-9);
    }

    #[test]
    fn test_obv_accumulates() {
        let am = ArrayManager::new(&make_table(&[1.0, 2.0, 3.0]));
        let obv = am.obv_array();
        assert_eq!(obv.len(), 3);
        assert!(obv[2].unwrap() > obv[1].unwrap());
    }
}
