//! Chart composition: figure model, renderers and the composer.

pub mod analysis;
pub mod base;
pub mod composer;
pub mod figure;
pub mod item;
pub mod registry;

pub use analysis::{AnalysisBundle, FibTrend, FibonacciZone, Level, SupportResistance};
pub use base::{ChartConfig, Palette, Theme, ThemeStyle};
pub use composer::{compose, ChartComposer};
pub use figure::{Figure, Geometry, Layout, Panel, PanelKind, Style, Trace};
pub use item::{ChartItem, DrawContext};
pub use registry::{ElementId, ElementKind, Registry};
