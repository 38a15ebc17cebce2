//! Candle data: canonical types, schema normalization and data sources.

pub mod constant;
pub mod datafeed;
pub mod normalizer;
pub mod object;

pub use constant::Interval;
pub use datafeed::{
    BaseAnalysisSource, BaseDatafeed, DatafeedError, EmptyDatafeed, JsonFileAnalysisSource,
    JsonFileDatafeed,
};
pub use normalizer::{normalize, RawColumn, RawTable, SchemaError};
pub use object::{Candle, CandleTable, HistoryRequest};
