//! Figure model produced by the composer.
//!
//! The model is renderer agnostic: it only records panels, traces and
//! their styles, and serializes to JSON for an external front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::base::ThemeStyle;
use super::registry::ElementId;

/// Geometry of one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Candlestick {
        x: Vec<DateTime<Utc>>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
    },
    Line {
        x: Vec<DateTime<Utc>>,
        y: Vec<Option<f64>>,
    },
    Markers {
        x: Vec<DateTime<Utc>>,
        y: Vec<Option<f64>>,
    },
    Bars {
        x: Vec<DateTime<Utc>>,
        y: Vec<Option<f64>>,
    },
    /// Straight segment between two points in time at constant price
    Segment {
        x0: DateTime<Utc>,
        x1: DateTime<Utc>,
        y: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub color: Option<String>,
    pub width: Option<f64>,
    pub dash: Option<String>,
    /// Fill the area between this trace and the previous one
    pub fill_to_next: Option<String>,
    pub marker_size: Option<f64>,
}

impl Style {
    pub fn color(color: &str) -> Self {
        Self {
            color: Some(color.to_string()),
            ..Default::default()
        }
    }

    pub fn with_dash(mut self, dash: &str) -> Self {
        self.dash = Some(dash.to_string());
        self
    }

    pub fn with_fill(mut self, fill: &str) -> Self {
        self.fill_to_next = Some(fill.to_string());
        self
    }

    pub fn with_marker_size(mut self, size: f64) -> Self {
        self.marker_size = Some(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub geometry: Geometry,
    pub style: Style,
    pub show_legend: bool,
}

impl Trace {
    pub fn new(name: impl Into<String>, geometry: Geometry, style: Style) -> Self {
        Self {
            name: name.into(),
            geometry,
            style,
            show_legend: false,
        }
    }

    pub fn with_legend(mut self) -> Self {
        self.show_legend = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanelKind {
    Price,
    Subplot(ElementId),
}

/// One row of the figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// 1 based row number, the price panel is row 1
    pub row: usize,
    pub kind: PanelKind,
    pub height: f64,
    pub traces: Vec<Trace>,
}

/// Figure level layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub shared_x: bool,
    pub vertical_spacing: f64,
    pub theme: Option<ThemeStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub panels: Vec<Panel>,
    pub layout: Layout,
}

impl Figure {
    /// Empty figure with the given panel kinds and heights
    pub fn new(kinds: Vec<PanelKind>, heights: Vec<f64>, vertical_spacing: f64) -> Self {
        let panels = kinds
            .into_iter()
            .zip(heights)
            .enumerate()
            .map(|(i, (kind, height))| Panel {
                row: i + 1,
                kind,
                height,
                traces: Vec::new(),
            })
            .collect();
        Self {
            panels,
            layout: Layout {
                shared_x: true,
                vertical_spacing,
                theme: None,
            },
        }
    }

    /// Append a trace to a row; out of range rows are ignored
    pub fn add_trace(&mut self, row: usize, trace: Trace) {
        if let Some(panel) = row
            .checked_sub(1)
            .and_then(|index| self.panels.get_mut(index))
        {
            panel.traces.push(trace);
        }
    }

    pub fn panel(&self, row: usize) -> Option<&Panel> {
        row.checked_sub(1).and_then(|index| self.panels.get(index))
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn trace_count(&self) -> usize {
        self.panels.iter().map(|p| p.traces.len()).sum()
    }

    pub fn row_heights(&self) -> Vec<f64> {
        self.panels.iter().map(|p| p.height).collect()
    }

    /// Apply a figure level style; trace data is untouched
    pub fn apply_theme(&mut self, style: ThemeStyle) {
        self.layout.theme = Some(style);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::base::{ChartConfig, Theme};

    #[test]
    fn test_add_trace_by_row() {
        let mut figure = Figure::new(
            vec![PanelKind::Price, PanelKind::Subplot(ElementId::Rsi)],
            vec![0.8, 0.2],
            0.02,
        );
        let now = Utc::now();
        let segment = Geometry::Segment { x0: now, x1: now, y: 1.0 };
        figure.add_trace(2, Trace::new("a", segment.clone(), Style::default()));
        figure.add_trace(3, Trace::new("ignored", segment.clone(), Style::default()));
        figure.add_trace(0, Trace::new("ignored", segment, Style::default()));
        assert_eq!(figure.trace_count(), 1);
        assert_eq!(figure.panel(2).map(|p| p.traces.len()), Some(1));
        assert_eq!(figure.row_heights(), vec![0.8, 0.2]);
    }

    #[test]
    fn test_theme_does_not_touch_traces() {
        let mut figure = Figure::new(vec![PanelKind::Price], vec![1.0], 0.02);
        let now = Utc::now();
        figure.add_trace(1, Trace::new("s", Geometry::Segment { x0: now, x1: now, y: 2.0 }, Style::default()));
        let before = figure.panels.clone();
        figure.apply_theme(Theme::Dark.style(&ChartConfig::default()));
        assert_eq!(figure.panels, before);
        assert!(figure.to_json().unwrap().contains("plotly_dark"));
    }
}
