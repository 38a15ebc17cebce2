//! Filesystem helpers for the application directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const APP_DIR_NAME: &str = ".candle_chart";

/// Resolve the application directory: `<cwd>/<name>` when it already
/// exists, otherwise `<home>/<name>` (created on demand).
fn get_app_dir(dir_name: &str) -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let local_path = cwd.join(dir_name);
    if local_path.exists() {
        return local_path;
    }

    let home_path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let app_path = home_path.join(dir_name);
    if !app_path.exists() {
        let _ = fs::create_dir_all(&app_path);
    }
    app_path
}

/// Application directory
pub static APP_DIR: LazyLock<PathBuf> = LazyLock::new(|| get_app_dir(APP_DIR_NAME));

/// Get path for a file in the application directory
pub fn get_file_path(filename: &str) -> PathBuf {
    APP_DIR.join(filename)
}

/// Get path for a folder in the application directory, creating it
pub fn get_folder_path(folder_name: &str) -> PathBuf {
    ensure_folder(&APP_DIR.join(folder_name))
}

fn ensure_folder(path: &Path) -> PathBuf {
    if !path.exists() {
        let _ = fs::create_dir_all(path);
    }
    path.to_path_buf()
}
