//! Application data path resolution
//!
//! All paths are resolved from the platform data directory, never from the
//! current working directory, so the client behaves the same whether it is
//! started from a terminal or a desktop launcher.

use std::path::PathBuf;
use tracing::debug;

/// Get the application data directory for videolite.
///
/// Returns e.g. `~/.local/share/videolite/` on Linux or
/// `~/Library/Application Support/videolite/` on macOS.
/// Creates the directory if it doesn't exist.
pub fn get_app_data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir)
        .join("videolite");

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!("Failed to create app data directory {:?}: {}", dir, e);
    }

    debug!("App data directory: {:?}", dir);
    dir
}

/// Get the database path for videolite.
pub fn get_database_path() -> PathBuf {
    get_app_data_dir().join("videolite.db")
}
