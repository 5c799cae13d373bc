//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::paths::get_database_path;

/// Backend used when nothing has been persisted yet
pub const DEFAULT_INSTANCE: &str = "https://piped.video";

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base address used until the user picks another one
    pub default_instance: String,

    /// Upper bound for a single candidate attempt (seconds)
    pub attempt_timeout_secs: u64,

    /// Origin serving the application shell and static assets
    pub app_origin: String,

    /// Revision tag of the static asset manifest
    pub asset_revision: String,

    /// Largest response body the cache proxy will store (bytes)
    pub max_entry_bytes: usize,

    /// User agent sent with every request
    pub user_agent: String,

    /// SQLite file holding client state and cache generations
    pub database_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_instance: DEFAULT_INSTANCE.to_string(),
            attempt_timeout_secs: 10,
            app_origin: "http://localhost:8080".to_string(),
            asset_revision: "v1".to_string(),
            max_entry_bytes: 2 * 1024 * 1024, // 2 MiB
            user_agent: concat!("videolite/", env!("CARGO_PKG_VERSION")).to_string(),
            database_path: get_database_path(),
        }
    }
}

impl ClientConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs.max(1))
    }
}

/// Per-operation snapshot of the settings the core reads at call time.
///
/// Built fresh from the state store at the start of every search or
/// playback so a changed backend address takes effect on the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationConfig {
    pub instance_base: String,
    pub attempt_timeout: Duration,
}
