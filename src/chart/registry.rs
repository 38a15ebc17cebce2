//! Selection identifiers and the immutable renderer registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::analysis::FibTrend;
use super::item::{
    AdxItem, AtrItem, BollingerItem, ChartItem, EnvelopeItem, FibonacciItem, IchimokuItem,
    MacdItem, ObvItem, RsiItem, SarItem, StochItem, SupportResistanceItem, VolumeItem, VwapItem,
};

/// Where an element is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Drawn on the price panel
    Overlay,
    /// Gets its own panel below price
    Subplot,
    /// Drawn on the price panel from the analysis bundle
    Annotation,
}

/// Selectable chart element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementId {
    #[serde(rename = "Bollinger_Bands")]
    BollingerBands,
    #[serde(rename = "Ichimoku_Cloud")]
    IchimokuCloud,
    #[serde(rename = "Parabolic_SAR")]
    ParabolicSar,
    #[serde(rename = "VWAP")]
    Vwap,
    #[serde(rename = "Moving_Average_Envelopes")]
    MovingAverageEnvelopes,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "OBV")]
    Obv,
    #[serde(rename = "ATR")]
    Atr,
    #[serde(rename = "ADX")]
    Adx,
    #[serde(rename = "Stochastic_Oscillator")]
    StochasticOscillator,
    #[serde(rename = "Volume")]
    Volume,
    #[serde(rename = "support_resistance_levels")]
    SupportResistanceLevels,
    #[serde(rename = "fibonacci_global")]
    FibonacciGlobal,
    #[serde(rename = "fibonacci_local")]
    FibonacciLocal,
}

const ALL_ELEMENTS: [ElementId; 15] = [
    ElementId::BollingerBands,
    ElementId::IchimokuCloud,
    ElementId::ParabolicSar,
    ElementId::Vwap,
    ElementId::MovingAverageEnvelopes,
    ElementId::Macd,
    ElementId::Rsi,
    ElementId::Obv,
    ElementId::Atr,
    ElementId::Adx,
    ElementId::StochasticOscillator,
    ElementId::Volume,
    ElementId::SupportResistanceLevels,
    ElementId::FibonacciGlobal,
    ElementId::FibonacciLocal,
];

impl ElementId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementId::BollingerBands => "Bollinger_Bands",
            ElementId::IchimokuCloud => "Ichimoku_Cloud",
            ElementId::ParabolicSar => "Parabolic_SAR",
            ElementId::Vwap => "VWAP",
            ElementId::MovingAverageEnvelopes => "Moving_Average_Envelopes",
            ElementId::Macd => "MACD",
            ElementId::Rsi => "RSI",
            ElementId::Obv => "OBV",
            ElementId::Atr => "ATR",
            ElementId::Adx => "ADX",
            ElementId::StochasticOscillator => "Stochastic_Oscillator",
            ElementId::Volume => "Volume",
            ElementId::SupportResistanceLevels => "support_resistance_levels",
            ElementId::FibonacciGlobal => "fibonacci_global",
            ElementId::FibonacciLocal => "fibonacci_local",
        }
    }

    /// Exact identifier lookup; unknown identifiers yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        ALL_ELEMENTS.iter().copied().find(|id| id.as_str() == s)
    }

    pub fn all() -> &'static [ElementId] {
        &ALL_ELEMENTS
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementId::Macd
            | ElementId::Rsi
            | ElementId::Obv
            | ElementId::Atr
            | ElementId::Adx
            | ElementId::StochasticOscillator
            | ElementId::Volume => ElementKind::Subplot,
            ElementId::SupportResistanceLevels
            | ElementId::FibonacciGlobal
            | ElementId::FibonacciLocal => ElementKind::Annotation,
            _ => ElementKind::Overlay,
        }
    }

    pub fn is_subplot(&self) -> bool {
        self.kind() == ElementKind::Subplot
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Renderer table, built once and never mutated.
pub struct Registry {
    items: HashMap<ElementId, Box<dyn ChartItem>>,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

impl Registry {
    fn new() -> Self {
        let mut items: HashMap<ElementId, Box<dyn ChartItem>> = HashMap::new();
        items.insert(ElementId::BollingerBands, Box::new(BollingerItem));
        items.insert(ElementId::IchimokuCloud, Box::new(IchimokuItem));
        items.insert(ElementId::ParabolicSar, Box::new(SarItem));
        items.insert(ElementId::Vwap, Box::new(VwapItem));
        items.insert(ElementId::MovingAverageEnvelopes, Box::new(EnvelopeItem));
        items.insert(ElementId::Macd, Box::new(MacdItem));
        items.insert(ElementId::Rsi, Box::new(RsiItem));
        items.insert(ElementId::Obv, Box::new(ObvItem));
        items.insert(ElementId::Atr, Box::new(AtrItem));
        items.insert(ElementId::Adx, Box::new(AdxItem));
        items.insert(ElementId::StochasticOscillator, Box::new(StochItem));
        items.insert(ElementId::Volume, Box::new(VolumeItem));
        items.insert(ElementId::SupportResistanceLevels, Box::new(SupportResistanceItem));
        items.insert(
            ElementId::FibonacciGlobal,
            Box::new(FibonacciItem::new(FibTrend::Global)),
        );
        items.insert(
            ElementId::FibonacciLocal,
            Box::new(FibonacciItem::new(FibTrend::Local)),
        );
        Self { items }
    }

    /// Shared registry
    pub fn global() -> &'static Registry {
        &REGISTRY
    }

    pub fn get(&self, id: ElementId) -> Option<&dyn ChartItem> {
        self.items.get(&id).map(Box::as_ref)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.items.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_round_trip() {
        for id in ElementId::all() {
            assert_eq!(ElementId::parse(id.as_str()), Some(*id));
        }
        assert_eq!(ElementId::parse("rsi"), None);
        assert_eq!(ElementId::parse("Unknown"), None);
    }

    #[test]
    fn test_subplot_set() {
        let subplots: Vec<_> = ElementId::all().iter().filter(|id| id.is_subplot()).collect();
        assert_eq!(subplots.len(), 7);
        assert_eq!(ElementId::FibonacciLocal.kind(), ElementKind::Annotation);
        assert_eq!(ElementId::Vwap.kind(), ElementKind::Overlay);
    }

    #[test]
    fn test_every_identifier_is_registered() {
        let registry = Registry::global();
        for id in ElementId::all() {
            assert!(registry.contains(*id), "{} has no renderer", id);
        }
    }
}
