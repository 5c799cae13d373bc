//! Generation-keyed response storage.
//!
//! Every entry belongs to exactly one generation. Reads always go through the
//! `active_generation` pointer inside a single statement, so a reader sees
//! either the old or the new generation's full index, never a mix.

use crate::resolver::HttpResponse;
use crate::utils::error::Result;
use chrono::Utc;
use reqwest::Url;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

const ACTIVE_GENERATION_KEY: &str = "active_generation";

/// Cache identity of a request
pub fn request_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    format!("GET {}", url)
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: Pool<Sqlite>,
}

impl CacheStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn active_generation(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM cache_meta WHERE key = ?")
            .bind(ACTIVE_GENERATION_KEY)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    /// Writes a complete generation in one transaction
    pub async fn install_generation(
        &self,
        generation: &str,
        shell_key: Option<&str>,
        entries: &[(String, HttpResponse)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cache_entries WHERE generation = ?")
            .bind(generation)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cache_generations WHERE generation = ?")
            .bind(generation)
            .execute(&mut *tx)
            .await?;

        for (key, response) in entries {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO cache_entries
                (generation, request_key, url, status, content_type, body, stored_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(generation)
            .bind(key)
            .bind(&response.url)
            .bind(response.status as i64)
            .bind(&response.content_type)
            .bind(&response.body)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO cache_generations (generation, shell_key, installed_at) VALUES (?, ?, ?)",
        )
        .bind(generation)
        .bind(shell_key)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Installed cache generation {} ({} entries)", generation, entries.len());
        Ok(())
    }

    /// Most recently installed generation, active or not
    pub async fn newest_generation(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT generation FROM cache_generations ORDER BY rowid DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("generation")))
    }

    /// Points reads at `generation` and drops every other generation
    pub async fn activate(&self, generation: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?, ?)")
            .bind(ACTIVE_GENERATION_KEY)
            .bind(generation)
            .execute(&mut *tx)
            .await?;
        let dropped = sqlx::query("DELETE FROM cache_entries WHERE generation != ?")
            .bind(generation)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM cache_generations WHERE generation != ?")
            .bind(generation)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(
            "Activated cache generation {} (dropped {} stale entries)",
            generation, dropped
        );
        Ok(dropped)
    }

    /// Entry stored under the active generation for `key`
    pub async fn lookup(&self, key: &str) -> Result<Option<HttpResponse>> {
        let row = sqlx::query(
            r#"
            SELECT url, status, content_type, body FROM cache_entries
            WHERE request_key = ?
              AND generation = (SELECT value FROM cache_meta WHERE key = ?)
            "#,
        )
        .bind(key)
        .bind(ACTIVE_GENERATION_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_into_response))
    }

    /// The active generation's application shell
    pub async fn lookup_shell(&self) -> Result<Option<HttpResponse>> {
        let row = sqlx::query(
            r#"
            SELECT e.url, e.status, e.content_type, e.body FROM cache_entries e
            JOIN cache_generations g
              ON g.generation = e.generation AND g.shell_key = e.request_key
            WHERE g.generation = (SELECT value FROM cache_meta WHERE key = ?)
            "#,
        )
        .bind(ACTIVE_GENERATION_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_into_response))
    }

    /// Adds or replaces one entry in the active generation.
    ///
    /// Returns false when no generation is active.
    pub async fn store_active(&self, key: &str, response: &HttpResponse) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO cache_entries
            (generation, request_key, url, status, content_type, body, stored_at)
            SELECT value, ?, ?, ?, ?, ?, ? FROM cache_meta WHERE key = ?
            "#,
        )
        .bind(key)
        .bind(&response.url)
        .bind(response.status as i64)
        .bind(&response.content_type)
        .bind(&response.body)
        .bind(Utc::now())
        .bind(ACTIVE_GENERATION_KEY)
        .execute(&self.pool)
        .await?;

        let stored = result.rows_affected() > 0;
        debug!("store {} -> {}", key, stored);
        Ok(stored)
    }

    pub async fn entry_count(&self) -> Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM cache_entries
            WHERE generation = (SELECT value FROM cache_meta WHERE key = ?)
            "#,
        )
        .bind(ACTIVE_GENERATION_KEY)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("n") as u64)
    }
}

fn row_into_response(row: sqlx::sqlite::SqliteRow) -> HttpResponse {
    HttpResponse {
        url: row.get("url"),
        status: row.get::<i64, _>("status") as u16,
        content_type: row.get("content_type"),
        body: row.get("body"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use tempfile::TempDir;

    async fn store() -> (CacheStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = initialize_database(&dir.path().join("cache.db")).await.unwrap();
        (CacheStore::new(pool), dir)
    }

    fn response(url: &str, body: &str) -> HttpResponse {
        HttpResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_request_key_ignores_fragment() {
        let a = Url::parse("http://app.local/index.html#top").unwrap();
        let b = Url::parse("http://app.local/index.html").unwrap();
        assert_eq!(request_key(&a), request_key(&b));
        assert_eq!(request_key(&b), "GET http://app.local/index.html");
    }

    #[tokio::test]
    async fn test_installed_generation_is_invisible_until_activated() {
        let (store, _dir) = store().await;
        let key = "GET http://app.local/".to_string();
        store
            .install_generation("g1", Some(&key), &[(key.clone(), response("http://app.local/", "one"))])
            .await
            .unwrap();

        assert!(store.lookup(&key).await.unwrap().is_none());
        assert_eq!(store.newest_generation().await.unwrap().as_deref(), Some("g1"));

        store.activate("g1").await.unwrap();
        assert_eq!(store.lookup(&key).await.unwrap().unwrap().body, b"one");
        assert_eq!(store.lookup_shell().await.unwrap().unwrap().body, b"one");
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_activation_drops_other_generations() {
        let (store, _dir) = store().await;
        let key = "GET http://app.local/".to_string();
        store
            .install_generation("g1", None, &[(key.clone(), response("http://app.local/", "one"))])
            .await
            .unwrap();
        store.activate("g1").await.unwrap();
        assert!(store
            .store_active("GET http://api.local/x", &response("http://api.local/x", "x"))
            .await
            .unwrap());

        store
            .install_generation("g2", None, &[(key.clone(), response("http://app.local/", "two"))])
            .await
            .unwrap();
        assert_eq!(store.lookup(&key).await.unwrap().unwrap().body, b"one");

        let dropped = store.activate("g2").await.unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(store.lookup(&key).await.unwrap().unwrap().body, b"two");
        assert!(store.lookup("GET http://api.local/x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_active_without_generation_is_refused() {
        let (store, _dir) = store().await;
        let stored = store
            .store_active("GET http://api.local/x", &response("http://api.local/x", "x"))
            .await
            .unwrap();
        assert!(!stored);
        assert_eq!(store.entry_count().await.unwrap(), 0);
    }
}
