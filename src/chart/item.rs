//! Chart items: one renderer per selectable element.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::analysis::{AnalysisBundle, FibTrend};
use super::base::{format_price, ChartConfig};
use super::figure::{Figure, Geometry, Style, Trace};
use crate::data::CandleTable;
use crate::indicator::{DerivedTable, Indicator, IndicatorKind, Line};

/// Everything a renderer may read.
pub struct DrawContext<'a> {
    pub candles: &'a CandleTable,
    pub derived: &'a DerivedTable,
    pub analysis: &'a AnalysisBundle,
    pub config: &'a ChartConfig,
    x: Vec<DateTime<Utc>>,
}

impl<'a> DrawContext<'a> {
    pub fn new(
        candles: &'a CandleTable,
        derived: &'a DerivedTable,
        analysis: &'a AnalysisBundle,
        config: &'a ChartConfig,
    ) -> Self {
        Self {
            candles,
            derived,
            analysis,
            config,
            x: candles.datetimes(),
        }
    }

    /// Shared time axis
    pub fn x(&self) -> &[DateTime<Utc>] {
        &self.x
    }

    /// Line trace of a derived series, `None` when the series is absent or
    /// not aligned with the candles
    fn series_trace(
        &self,
        indicator: &Indicator,
        line: Line,
        style: Style,
        as_bars: bool,
    ) -> Option<Trace> {
        let key = indicator.key(line);
        let series = self.derived.get(&key)?;
        if series.len() != self.x.len() {
            warn!(
                "Column {} has {} rows but the chart has {}, not drawn",
                key,
                series.len(),
                self.x.len()
            );
            return None;
        }
        let geometry = if as_bars {
            Geometry::Bars {
                x: self.x.clone(),
                y: series.to_vec(),
            }
        } else {
            Geometry::Line {
                x: self.x.clone(),
                y: series.to_vec(),
            }
        };
        Some(Trace::new(key.column_name(), geometry, style))
    }

    fn add_series(
        &self,
        figure: &mut Figure,
        row: usize,
        indicator: &Indicator,
        line: Line,
        style: Style,
    ) -> bool {
        match self.series_trace(indicator, line, style, false) {
            Some(trace) => {
                figure.add_trace(row, trace);
                true
            }
            None => false,
        }
    }

    fn add_threshold(&self, figure: &mut Figure, row: usize, name: &str, value: f64) {
        let (Some(first), Some(last)) = (self.x.first(), self.x.last()) else {
            return;
        };
        let style = Style::color(&self.config.palette.threshold).with_dash(&self.config.threshold_dash);
        figure.add_trace(
            row,
            Trace::new(
                name,
                Geometry::Segment {
                    x0: *first,
                    x1: *last,
                    y: value,
                },
                style,
            ),
        );
    }
}

/// Trait for chart items that can be drawn
pub trait ChartItem: Send + Sync {
    /// Append this item's traces to `row` of the figure
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>);
}

/// Candlestick chart item, always the first trace of the price panel
pub struct CandleItem;

impl ChartItem for CandleItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let candles = ctx.candles.candles();
        if candles.is_empty() {
            return;
        }
        let geometry = Geometry::Candlestick {
            x: ctx.x().to_vec(),
            open: candles.iter().map(|c| c.open).collect(),
            high: candles.iter().map(|c| c.high).collect(),
            low: candles.iter().map(|c| c.low).collect(),
            close: candles.iter().map(|c| c.close).collect(),
        };
        figure.add_trace(row, Trace::new("OHLC", geometry, Style::default()).with_legend());
    }
}

/// Volume bars straight from the candles
pub struct VolumeItem;

impl ChartItem for VolumeItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        if ctx.candles.is_empty() {
            return;
        }
        if !ctx.candles.has_volume() {
            debug!("No volume column, volume panel left empty");
            return;
        }
        let geometry = Geometry::Bars {
            x: ctx.x().to_vec(),
            y: ctx.candles.candles().iter().map(|c| Some(c.volume)).collect(),
        };
        figure.add_trace(row, Trace::new("Volume", geometry, Style::color(&ctx.config.palette.primary)));
    }
}

// ==================== Overlays ====================

pub struct BollingerItem;

impl ChartItem for BollingerItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let palette = &ctx.config.palette;
        for bb in ctx.derived.indicators_of(IndicatorKind::Bollinger) {
            ctx.add_series(figure, row, &bb, Line::Upper, Style::color(&palette.bollinger_upper));
            ctx.add_series(
                figure,
                row,
                &bb,
                Line::Lower,
                Style::color(&palette.bollinger_lower).with_fill(&palette.bollinger_lower),
            );
            ctx.add_series(figure, row, &bb, Line::Middle, Style::color(&palette.bollinger_middle));
        }
    }
}

pub struct IchimokuItem;

impl ChartItem for IchimokuItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let palette = &ctx.config.palette;
        for ichi in ctx.derived.indicators_of(IndicatorKind::Ichimoku) {
            ctx.add_series(figure, row, &ichi, Line::SpanA, Style::color(&palette.ichimoku_a));
            ctx.add_series(
                figure,
                row,
                &ichi,
                Line::SpanB,
                Style::color(&palette.ichimoku_b).with_fill(&palette.ichimoku_b),
            );
        }
    }
}

/// Parabolic SAR as a single marker series
pub struct SarItem;

impl ChartItem for SarItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        for sar in ctx.derived.indicators_of(IndicatorKind::ParabolicSar) {
            let (Some(long), Some(short)) = (
                ctx.derived.line(&sar, Line::Long),
                ctx.derived.line(&sar, Line::Short),
            ) else {
                continue;
            };
            if long.len() != ctx.x().len() {
                continue;
            }
            let y = long.iter().zip(short).map(|(l, s)| l.or(*s)).collect();
            let style = Style::color(&ctx.config.palette.parabolic_sar)
                .with_marker_size(ctx.config.sar_marker_size);
            let name = match sar {
                Indicator::ParabolicSar { af, max_af } => format!("PSAR_{}_{}", af, max_af),
                _ => "PSAR".to_string(),
            };
            figure.add_trace(
                row,
                Trace::new(name, Geometry::Markers { x: ctx.x().to_vec(), y }, style),
            );
        }
    }
}

pub struct VwapItem;

impl ChartItem for VwapItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        for vwap in ctx.derived.indicators_of(IndicatorKind::Vwap) {
            ctx.add_series(figure, row, &vwap, Line::Value, Style::color(&ctx.config.palette.vwap));
        }
    }
}

pub struct EnvelopeItem;

impl ChartItem for EnvelopeItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let color = &ctx.config.palette.ma_env;
        for env in ctx.derived.indicators_of(IndicatorKind::Envelope) {
            ctx.add_series(figure, row, &env, Line::Upper, Style::color(color));
            ctx.add_series(figure, row, &env, Line::Lower, Style::color(color).with_fill(color));
        }
    }
}

// ==================== Subplots ====================

pub struct MacdItem;

impl ChartItem for MacdItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let palette = &ctx.config.palette;
        for macd in ctx.derived.indicators_of(IndicatorKind::Macd) {
            ctx.add_series(figure, row, &macd, Line::Macd, Style::color(&palette.primary));
            ctx.add_series(figure, row, &macd, Line::Signal, Style::color(&palette.secondary));
            if let Some(trace) =
                ctx.series_trace(&macd, Line::Histogram, Style::color(&palette.up), true)
            {
                figure.add_trace(row, trace);
            }
        }
    }
}

pub struct RsiItem;

impl ChartItem for RsiItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let mut drawn = false;
        for rsi in ctx.derived.indicators_of(IndicatorKind::Rsi) {
            drawn |= ctx.add_series(figure, row, &rsi, Line::Value, Style::color(&ctx.config.palette.primary));
        }
        if drawn {
            ctx.add_threshold(figure, row, "Overbought", ctx.config.rsi_overbought);
            ctx.add_threshold(figure, row, "Oversold", ctx.config.rsi_oversold);
        }
    }
}

pub struct ObvItem;

impl ChartItem for ObvItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        for obv in ctx.derived.indicators_of(IndicatorKind::Obv) {
            ctx.add_series(figure, row, &obv, Line::Value, Style::color(&ctx.config.palette.primary));
        }
    }
}

pub struct AtrItem;

impl ChartItem for AtrItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        for atr in ctx.derived.indicators_of(IndicatorKind::Atr) {
            ctx.add_series(figure, row, &atr, Line::Value, Style::color(&ctx.config.palette.primary));
        }
    }
}

pub struct AdxItem;

impl ChartItem for AdxItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let palette = &ctx.config.palette;
        for adx in ctx.derived.indicators_of(IndicatorKind::Adx) {
            ctx.add_series(figure, row, &adx, Line::Adx, Style::color(&palette.primary));
            ctx.add_series(figure, row, &adx, Line::PlusDi, Style::color(&palette.up));
            ctx.add_series(figure, row, &adx, Line::MinusDi, Style::color(&palette.down));
        }
    }
}

pub struct StochItem;

impl ChartItem for StochItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let palette = &ctx.config.palette;
        let mut drawn = false;
        for stoch in ctx.derived.indicators_of(IndicatorKind::Stochastic) {
            drawn |= ctx.add_series(figure, row, &stoch, Line::K, Style::color(&palette.primary));
            ctx.add_series(figure, row, &stoch, Line::D, Style::color(&palette.secondary));
        }
        if drawn {
            ctx.add_threshold(figure, row, "Overbought", ctx.config.stoch_overbought);
            ctx.add_threshold(figure, row, "Oversold", ctx.config.stoch_oversold);
        }
    }
}

// ==================== Annotations ====================

fn level_segment(name: String, start: DateTime<Utc>, end: DateTime<Utc>, price: f64, style: Style) -> Trace {
    Trace::new(
        name,
        Geometry::Segment {
            x0: start,
            x1: end,
            y: price,
        },
        style,
    )
}

/// Dashed levels from each level's date to the last candle
pub struct SupportResistanceItem;

impl ChartItem for SupportResistanceItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let Some(levels) = ctx.analysis.support_resistance() else {
            debug!("Analysis bundle has no support/resistance levels");
            return;
        };
        let Some(last) = ctx.candles.last_datetime() else {
            return;
        };
        let palette = &ctx.config.palette;
        let dash = &ctx.config.level_dash;

        for level in &levels.supports {
            let style = Style::color(&palette.support).with_dash(dash);
            let name = format!("Support {}", format_price(level.price, 2));
            figure.add_trace(row, level_segment(name, level.date, last, level.price, style));
        }
        for level in &levels.resistances {
            let style = Style::color(&palette.resistance).with_dash(dash);
            let name = format!("Resistance {}", format_price(level.price, 2));
            figure.add_trace(row, level_segment(name, level.date, last, level.price, style));
        }
    }
}

/// Fibonacci retracement levels for one trend
pub struct FibonacciItem {
    trend: FibTrend,
}

impl FibonacciItem {
    pub fn new(trend: FibTrend) -> Self {
        Self { trend }
    }
}

impl ChartItem for FibonacciItem {
    fn draw(&self, figure: &mut Figure, row: usize, ctx: &DrawContext<'_>) {
        let Some(zone) = ctx.analysis.fibonacci(self.trend) else {
            debug!("Analysis bundle has no {} Fibonacci zone", self.trend.key());
            return;
        };
        let Some(end) = zone.end.or_else(|| ctx.candles.last_datetime()) else {
            return;
        };
        let palette = &ctx.config.palette;
        let color = match self.trend {
            FibTrend::Global => &palette.fib_global,
            FibTrend::Local => &palette.fib_local,
        };

        for (name, price) in &zone.levels {
            let style = Style::color(color).with_dash(&ctx.config.level_dash);
            figure.add_trace(row, level_segment(format!("Fib {}", name), zone.start, end, *price, style));
        }
    }
}
