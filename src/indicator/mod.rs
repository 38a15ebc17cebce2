//! Indicator computation: typed keys, parameters, series math and the engine.

pub mod array;
pub mod engine;
pub mod key;
pub mod params;

pub use array::{ArrayManager, Series};
pub use engine::{
    compute, ComputeReport, DerivedTable, IndicatorEngine, IndicatorOutcome, IndicatorSkip,
    OutcomeStatus,
};
pub use key::{format_float, Indicator, IndicatorKind, Line, Ratio, SeriesKey};
pub use params::{IndicatorParams, ParamError, PARAM_KEYS};
