//! Persisted client state: backend address, last-played record, playlist

use crate::normalizer::VideoSummary;
use crate::resolver::CandidateRequest;
use crate::utils::config::{ClientConfig, OperationConfig};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, warn};

const INSTANCE_BASE_KEY: &str = "instance_base";
const LAST_PLAYED_KEY: &str = "last_played";

/// Most recent selection that reached a playback surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPlayed {
    pub id: String,
    pub summary: Option<VideoSummary>,
    pub stream_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub summary: VideoSummary,
    pub saved_at: DateTime<Utc>,
}

/// Key-value and playlist storage on top of SQLite
#[derive(Debug, Clone)]
pub struct StateStore {
    pool: Pool<Sqlite>,
}

impl StateStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Save setting
    pub async fn save_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        debug!("Saved setting: {} = {}", key, value);
        Ok(())
    }

    /// Get setting
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    pub async fn instance_base(&self, default: &str) -> Result<String> {
        Ok(self
            .get_setting(INSTANCE_BASE_KEY)
            .await?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// Persists a new backend address after checking it can build requests
    pub async fn set_instance_base(&self, base: &str) -> Result<()> {
        CandidateRequest::search(base, "probe")?;
        self.save_setting(INSTANCE_BASE_KEY, base.trim()).await
    }

    /// Fresh per-operation view of the settings the core depends on
    pub async fn operation_config(&self, config: &ClientConfig) -> Result<OperationConfig> {
        Ok(OperationConfig {
            instance_base: self.instance_base(&config.default_instance).await?,
            attempt_timeout: config.attempt_timeout(),
        })
    }

    pub async fn save_last_played(&self, record: &LastPlayed) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.save_setting(LAST_PLAYED_KEY, &json).await
    }

    pub async fn last_played(&self) -> Result<Option<LastPlayed>> {
        let Some(raw) = self.get_setting(LAST_PLAYED_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring unreadable last-played record: {}", e);
                Ok(None)
            }
        }
    }

    /// Appends to the playlist; returns false if the video is already saved
    pub async fn add_to_playlist(&self, summary: &VideoSummary) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO playlist (video_id, summary, saved_at) VALUES (?, ?, ?)",
        )
        .bind(&summary.id)
        .bind(serde_json::to_string(summary)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn remove_from_playlist(&self, video_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playlist WHERE video_id = ?")
            .bind(video_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_playlist(&self) -> Result<()> {
        sqlx::query("DELETE FROM playlist")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Saved entries in insertion order
    pub async fn playlist(&self) -> Result<Vec<PlaylistEntry>> {
        let rows = sqlx::query("SELECT * FROM playlist ORDER BY position")
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(row_into_playlist_entry(row)?);
        }

        Ok(entries)
    }

    /// Entries before and after `video_id`, for previous/next controls
    pub async fn playlist_neighbours(
        &self,
        video_id: &str,
    ) -> Result<(Option<PlaylistEntry>, Option<PlaylistEntry>)> {
        let mut entries = self.playlist().await?;
        let Some(index) = entries.iter().position(|e| e.summary.id == video_id) else {
            return Ok((None, None));
        };

        let next = (index + 1 < entries.len()).then(|| entries.remove(index + 1));
        let previous = (index > 0).then(|| entries.remove(index - 1));
        Ok((previous, next))
    }
}

/// Convert database row to playlist entry
fn row_into_playlist_entry(row: sqlx::sqlite::SqliteRow) -> Result<PlaylistEntry> {
    let video_id: String = row.get("video_id");
    let summary = serde_json::from_str(row.get::<&str, _>("summary"))
        .unwrap_or_else(|_| VideoSummary::new(video_id));

    Ok(PlaylistEntry {
        summary,
        saved_at: row.get("saved_at"),
    })
}
