//! Candle Chart - command line entry point
//!
//! Loads a candle history from a local data directory, computes the
//! indicator set, composes the selected chart elements and writes the
//! figure as JSON.

use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use candle_chart::app::{init_logger, level_to_string, Settings};
use candle_chart::chart::{AnalysisBundle, ChartComposer, Theme};
use candle_chart::data::{
    BaseAnalysisSource, BaseDatafeed, DatafeedError, EmptyDatafeed, HistoryRequest, Interval,
    JsonFileAnalysisSource, JsonFileDatafeed,
};
use candle_chart::indicator::{IndicatorEngine, IndicatorParams};

const USAGE: &str = "usage: candle_chart --symbol SYMBOL --interval 4h --count 144 [--data-dir DIR] \
[--analysis FILE] [--params FILE] [--select A,B,C] [--theme light|dark] [--out FILE]";

const DEFAULT_SELECTION: &[&str] = &["Bollinger_Bands", "MACD", "RSI", "Volume"];

#[derive(Debug, Clone, PartialEq)]
struct Args {
    symbol: String,
    interval: Interval,
    count: usize,
    data_dir: Option<PathBuf>,
    analysis: Option<PathBuf>,
    params: Option<PathBuf>,
    select: Vec<String>,
    theme: Option<Theme>,
    out: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, Box<dyn Error>> {
    let mut symbol = None;
    let mut interval = Interval::Hour4;
    let mut count = 144usize;
    let mut data_dir = None;
    let mut analysis = None;
    let mut params = None;
    let mut select: Vec<String> = DEFAULT_SELECTION.iter().map(|s| s.to_string()).collect();
    let mut theme = None;
    let mut out = None;

    while let Some(flag) = args.next() {
        let mut value = || args.next().ok_or_else(|| format!("missing value for {}", flag));
        match flag.as_str() {
            "--symbol" => symbol = Some(value()?),
            "--interval" => {
                let raw = value()?;
                interval = raw
                    .parse()
                    .map_err(|_| DatafeedError::UnsupportedInterval(raw))?;
            }
            "--count" => count = value()?.parse()?,
            "--data-dir" => data_dir = Some(PathBuf::from(value()?)),
            "--analysis" => analysis = Some(PathBuf::from(value()?)),
            "--params" => params = Some(PathBuf::from(value()?)),
            "--select" => {
                select = value()?
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "--theme" => theme = Some(value()?.parse::<Theme>()?),
            "--out" => out = Some(PathBuf::from(value()?)),
            other => return Err(format!("unknown argument: {}", other).into()),
        }
    }

    let symbol = symbol.ok_or("--symbol is required")?;
    Ok(Args {
        symbol,
        interval,
        count,
        data_dir,
        analysis,
        params,
        select,
        theme,
        out,
    })
}

/// Settings preset overlaid with an optional parameter file
fn load_params(settings: &Settings, path: Option<&PathBuf>) -> Result<IndicatorParams, Box<dyn Error>> {
    let mut preset = settings.indicator.clone();
    if let Some(path) = path {
        let overrides: HashMap<String, Value> = serde_json::from_str(&fs::read_to_string(path)?)?;
        preset.extend(overrides);
    }
    Ok(IndicatorParams::from_map(&preset)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let settings_path = Settings::default_path();
    let (settings, loaded) = match Settings::load_if_exists(&settings_path) {
        Ok(Some(settings)) => (settings, Ok(true)),
        Ok(None) => (Settings::default(), Ok(false)),
        Err(e) => (Settings::default(), Err(e)),
    };
    init_logger(&settings.log)?;
    match loaded {
        Ok(true) => info!("Loaded settings from {}", settings_path.display()),
        Ok(false) => debug!("No settings at {}, using defaults", settings_path.display()),
        Err(e) => warn!("Ignoring unreadable settings {}: {}", settings_path.display(), e),
    }
    debug!("Log level {}", level_to_string(settings.log.level));

    let params = load_params(&settings, args.params.as_ref())?;
    let req = HistoryRequest::new(args.symbol.clone(), args.interval, args.count);

    let datafeed: Box<dyn BaseDatafeed> = match &args.data_dir {
        Some(dir) => Box::new(JsonFileDatafeed::new(dir.clone())),
        None => Box::new(EmptyDatafeed::new()),
    };
    let raw = datafeed.query_candles(&req).await;
    let analysis = match &args.analysis {
        Some(path) => JsonFileAnalysisSource::new(path).query_analysis(&req).await,
        None => Value::Object(Map::new()),
    };

    let derived = IndicatorEngine::new(&params).compute(&raw)?;
    let report = derived.report();
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    for (indicator, skip) in report.skipped() {
        warn!("{} skipped: {}", indicator, skip);
    }
    let gaps = derived.candles().gap_count(args.interval);
    if gaps > 0 {
        warn!("{} history has {} gaps wider than {}", req.symbol, gaps, args.interval);
    }

    let theme = args.theme.unwrap_or(settings.chart.default_theme);
    let composer = ChartComposer::new(settings.chart.clone());
    let figure = composer.compose(
        derived.candles(),
        &derived,
        args.select.as_slice(),
        &AnalysisBundle::new(analysis),
        theme,
    );

    let json = figure.to_json()?;
    match &args.out {
        Some(path) => {
            fs::write(path, json)?;
            info!("Figure written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
