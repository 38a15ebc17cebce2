//! Base constants, chart configuration and themes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Overlay colors
pub const BOLLINGER_UPPER_COLOR: &str = "rgba(173,216,230,0.5)";
pub const BOLLINGER_LOWER_COLOR: &str = "rgba(173,216,230,0.2)";
pub const BOLLINGER_MIDDLE_COLOR: &str = "blue";
pub const ICHIMOKU_A_COLOR: &str = "rgba(255,0,0,0.5)";
pub const ICHIMOKU_B_COLOR: &str = "rgba(0,255,0,0.5)";
pub const SAR_COLOR: &str = "blue";
pub const VWAP_COLOR: &str = "orange";
pub const MA_ENV_COLOR: &str = "green";

// Annotation colors
pub const SUPPORT_COLOR: &str = "green";
pub const RESISTANCE_COLOR: &str = "red";
pub const FIB_GLOBAL_COLOR: &str = "purple";
pub const FIB_LOCAL_COLOR: &str = "green";

// Subplot colors
pub const UP_COLOR: &str = "rgb(38,166,154)";
pub const DOWN_COLOR: &str = "rgb(239,83,80)";
pub const PRIMARY_LINE_COLOR: &str = "rgb(41,98,255)";
pub const SECONDARY_LINE_COLOR: &str = "rgb(255,109,0)";
pub const THRESHOLD_COLOR: &str = "grey";

pub const LEVEL_DASH: &str = "dash";
pub const THRESHOLD_DASH: &str = "dot";

// Layout constants
pub const PRICE_ROW_SHARE: f64 = 0.8;
pub const VERTICAL_SPACING: f64 = 0.02;
pub const FIGURE_HEIGHT: u32 = 600;
pub const SAR_MARKER_SIZE: f64 = 4.0;

/// Format price with appropriate precision
pub fn format_price(price: f64, decimals: usize) -> String {
    format!("{:.prec$}", price, prec = decimals)
}

/// Color palette used by the renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub bollinger_upper: String,
    pub bollinger_lower: String,
    pub bollinger_middle: String,
    pub ichimoku_a: String,
    pub ichimoku_b: String,
    pub parabolic_sar: String,
    pub vwap: String,
    pub ma_env: String,
    pub support: String,
    pub resistance: String,
    pub fib_global: String,
    pub fib_local: String,
    pub up: String,
    pub down: String,
    pub primary: String,
    pub secondary: String,
    pub threshold: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            bollinger_upper: BOLLINGER_UPPER_COLOR.to_string(),
            bollinger_lower: BOLLINGER_LOWER_COLOR.to_string(),
            bollinger_middle: BOLLINGER_MIDDLE_COLOR.to_string(),
            ichimoku_a: ICHIMOKU_A_COLOR.to_string(),
            ichimoku_b: ICHIMOKU_B_COLOR.to_string(),
            parabolic_sar: SAR_COLOR.to_string(),
            vwap: VWAP_COLOR.to_string(),
            ma_env: MA_ENV_COLOR.to_string(),
            support: SUPPORT_COLOR.to_string(),
            resistance: RESISTANCE_COLOR.to_string(),
            fib_global: FIB_GLOBAL_COLOR.to_string(),
            fib_local: FIB_LOCAL_COLOR.to_string(),
            up: UP_COLOR.to_string(),
            down: DOWN_COLOR.to_string(),
            primary: PRIMARY_LINE_COLOR.to_string(),
            secondary: SECONDARY_LINE_COLOR.to_string(),
            threshold: THRESHOLD_COLOR.to_string(),
        }
    }
}

/// Immutable configuration threaded into the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub palette: Palette,
    pub level_dash: String,
    pub threshold_dash: String,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub stoch_overbought: f64,
    pub stoch_oversold: f64,
    pub price_row_share: f64,
    pub vertical_spacing: f64,
    pub sar_marker_size: f64,
    pub default_theme: Theme,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            level_dash: LEVEL_DASH.to_string(),
            threshold_dash: THRESHOLD_DASH.to_string(),
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            stoch_overbought: 80.0,
            stoch_oversold: 20.0,
            price_row_share: PRICE_ROW_SHARE,
            vertical_spacing: VERTICAL_SPACING,
            sar_marker_size: SAR_MARKER_SIZE,
            default_theme: Theme::Dark,
            height: FIGURE_HEIGHT,
        }
    }
}

impl ChartConfig {
    /// Row height fractions for a price panel plus `subplots` panels.
    ///
    /// The price row keeps its share and the rest is split evenly; with no
    /// subplot the price row takes everything.
    pub fn row_heights(&self, subplots: usize) -> Vec<f64> {
        if subplots == 0 {
            return vec![1.0];
        }
        let share = self.price_row_share.clamp(0.0, 1.0);
        let each = (1.0 - share) / subplots as f64;
        std::iter::once(share)
            .chain(std::iter::repeat(each).take(subplots))
            .collect()
    }
}

/// Figure theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn template(&self) -> &'static str {
        match self {
            Theme::Light => "plotly_white",
            Theme::Dark => "plotly_dark",
        }
    }

    /// Fixed style for this theme
    pub fn style(&self, config: &ChartConfig) -> ThemeStyle {
        let (background, axis_color) = match self {
            Theme::Light => ("white", "#444444"),
            Theme::Dark => ("#111111", "#cccccc"),
        };
        ThemeStyle {
            template: self.template().to_string(),
            background: background.to_string(),
            axis_color: axis_color.to_string(),
            height: config.height,
            drag_mode: "pan".to_string(),
            range_slider_visible: false,
            axes_visible: true,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "plotly_white" | "plotly" => Ok(Theme::Light),
            "dark" | "plotly_dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// Figure level style applied after every trace is in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeStyle {
    pub template: String,
    pub background: String,
    pub axis_color: String,
    pub height: u32,
    pub drag_mode: String,
    pub range_slider_visible: bool,
    pub axes_visible: bool,
}
