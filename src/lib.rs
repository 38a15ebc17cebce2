//! Candle Chart - indicator computation and chart composition for OHLCV data
//!
//! The crate is a two stage pipeline:
//!
//! - `indicator` turns a candle table plus per-indicator parameters into a
//!   derived table of typed, named series with an explicit outcome report
//! - `chart` maps a selection of element identifiers onto a multi-panel
//!   figure, annotated with an externally supplied analysis bundle
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use candle_chart::chart::{AnalysisBundle, ChartComposer, Theme};
//! use candle_chart::data::RawTable;
//! use candle_chart::indicator::{compute, IndicatorParams};
//!
//! let raw = RawTable::from_json_str("[]").unwrap_or_default();
//! let derived = compute(&raw, &IndicatorParams::default()).unwrap();
//! let figure = ChartComposer::default().compose(
//!     derived.candles(),
//!     &derived,
//!     &["RSI", "Bollinger_Bands"],
//!     &AnalysisBundle::empty(),
//!     Theme::Dark,
//! );
//! println!("{}", figure.panel_count());
//! ```

pub mod app;
pub mod chart;
pub mod data;
pub mod indicator;
