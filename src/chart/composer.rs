//! Chart composer: selection in, multi panel figure out.

use tracing::{debug, info, warn};

use super::analysis::AnalysisBundle;
use super::base::{ChartConfig, Theme};
use super::figure::{Figure, PanelKind};
use super::item::{CandleItem, ChartItem, DrawContext};
use super::registry::{ElementId, Registry};
use crate::data::CandleTable;
use crate::indicator::DerivedTable;

/// Stateless composer parameterized by an immutable configuration.
#[derive(Debug, Clone, Default)]
pub struct ChartComposer {
    config: ChartConfig,
}

impl ChartComposer {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Resolve a raw selection: unknown identifiers are dropped and
    /// duplicates collapse onto their first occurrence.
    pub fn resolve_selection<S: AsRef<str>>(selection: &[S]) -> Vec<ElementId> {
        let mut resolved: Vec<ElementId> = Vec::with_capacity(selection.len());
        for raw in selection {
            match ElementId::parse(raw.as_ref()) {
                Some(id) if !resolved.contains(&id) => resolved.push(id),
                Some(_) => {}
                None => debug!("Ignoring unknown chart element '{}'", raw.as_ref()),
            }
        }
        resolved
    }

    /// Compose a figure.
    ///
    /// Row 1 holds the candlestick trace followed by overlays and
    /// annotations in selection order. Each subplot gets its own row in
    /// first-seen order. The theme is applied last.
    pub fn compose<S: AsRef<str>>(
        &self,
        candles: &CandleTable,
        derived: &DerivedTable,
        selection: &[S],
        analysis: &AnalysisBundle,
        theme: Theme,
    ) -> Figure {
        let registry = Registry::global();
        let elements: Vec<ElementId> = Self::resolve_selection(selection)
            .into_iter()
            .filter(|id| registry.contains(*id))
            .collect();
        let subplots: Vec<ElementId> = elements.iter().copied().filter(ElementId::is_subplot).collect();

        let kinds = std::iter::once(PanelKind::Price)
            .chain(subplots.iter().map(|id| PanelKind::Subplot(*id)))
            .collect();
        let mut figure = Figure::new(
            kinds,
            self.config.row_heights(subplots.len()),
            self.config.vertical_spacing,
        );

        if candles.is_empty() {
            warn!("Empty candle table, composing a figure without traces");
        } else {
            let ctx = DrawContext::new(candles, derived, analysis, &self.config);
            CandleItem.draw(&mut figure, 1, &ctx);

            for id in &elements {
                let row = subplots
                    .iter()
                    .position(|s| s == id)
                    .map(|index| index + 2)
                    .unwrap_or(1);
                if let Some(item) = registry.get(*id) {
                    item.draw(&mut figure, row, &ctx);
                }
            }
        }

        figure.apply_theme(theme.style(&self.config));
        info!(
            "Composed figure with {} panels and {} traces",
            figure.panel_count(),
            figure.trace_count()
        );
        figure
    }
}

/// Compose with the default configuration
pub fn compose<S: AsRef<str>>(
    candles: &CandleTable,
    derived: &DerivedTable,
    selection: &[S],
    analysis: &AnalysisBundle,
    theme: Theme,
) -> Figure {
    ChartComposer::default().compose(candles, derived, selection, analysis, theme)
}
