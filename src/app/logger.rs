//! Logging setup for the chart binary.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::setting::LogSetting;
use super::utility::get_folder_path;

/// Log level constants (compatible with Python logging module)
pub const DEBUG: i32 = 10;
pub const INFO: i32 = 20;
pub const WARNING: i32 = 30;
pub const ERROR: i32 = 40;
pub const CRITICAL: i32 = 50;

/// Convert integer log level to tracing Level
pub fn level_from_int(level: i32) -> Level {
    match level {
        i32::MIN..=10 => Level::DEBUG,
        11..=20 => Level::INFO,
        21..=30 => Level::WARN,
        _ => Level::ERROR,
    }
}

/// Convert integer log level to string
pub fn level_to_string(level: i32) -> &'static str {
    match level {
        i32::MIN..=10 => "DEBUG",
        11..=20 => "INFO",
        21..=30 => "WARNING",
        31..=40 => "ERROR",
        _ => "CRITICAL",
    }
}

/// Log file for today, `<app dir>/log/chart_YYYYMMDD.log`
pub fn get_log_file_path() -> PathBuf {
    let today = Local::now().format("%Y%m%d").to_string();
    get_folder_path("log").join(format!("chart_{}.log", today))
}

/// Install the global subscriber. Call once, from the binary.
///
/// Console output goes to stderr so figure JSON on stdout stays clean.
pub fn init_logger(setting: &LogSetting) -> std::io::Result<()> {
    if !setting.active {
        return Ok(());
    }

    let filter = EnvFilter::from_default_env().add_directive(level_from_int(setting.level).into());

    let console_layer = setting.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_ansi(true)
            .boxed()
    });

    let file_layer = if setting.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(get_log_file_path())?;
        Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .boxed(),
        )
    } else {
        None
    };

    // A subscriber may already be installed, e.g. by a host application
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_int() {
        assert_eq!(level_from_int(DEBUG), Level::DEBUG);
        assert_eq!(level_from_int(INFO), Level::INFO);
        assert_eq!(level_from_int(WARNING), Level::WARN);
        assert_eq!(level_from_int(ERROR), Level::ERROR);
        assert_eq!(level_from_int(CRITICAL), Level::ERROR);
    }

    #[test]
    fn test_level_to_string() {
        assert_eq!(level_to_string(DEBUG), "DEBUG");
        assert_eq!(level_to_string(WARNING), "WARNING");
        assert_eq!(level_to_string(CRITICAL), "CRITICAL");
    }

    #[test]
    fn test_inactive_logger_is_noop() {
        let setting = LogSetting {
            active: false,
            ..Default::default()
        };
        assert!(init_logger(&setting).is_ok());
    }
}
