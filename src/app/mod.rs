//! Application plumbing: settings, logging and filesystem helpers.

pub mod logger;
pub mod setting;
pub mod utility;

pub use logger::{init_logger, level_from_int, level_to_string};
pub use setting::{LogSetting, SettingError, Settings};
