//! Embedded single-file backend.
//!
//! One table maps the profile id (as a string key) to the entire
//! normalized document, nested presentations, publications, and any
//! processing payload included. Upserts are pure overwrites, so repeated
//! syncs of the same id are idempotent on their own.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::warn;

use super::{ProfileStore, Subdocument, UpsertFailure, UpsertOutcome};
use crate::db;
use crate::models::NormalizedProfile;

pub struct SingleFileStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SingleFileStore {
    /// Open (or create) the backing file and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect_file(path).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                record TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    async fn record(&self, id: i64) -> Result<Option<Value>> {
        let row: Option<String> = sqlx::query_scalar("SELECT record FROM profiles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(text) => Ok(Some(serde_json::from_str(&text).with_context(|| {
                format!("stored profile {id} is not valid JSON")
            })?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ProfileStore for SingleFileStore {
    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM profiles")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert(&self, profile: &NormalizedProfile) -> Result<UpsertOutcome> {
        let mut outcome = UpsertOutcome::clean(profile.id);
        let record = Value::Object(profile.record.clone()).to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO profiles (id, record) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET record = excluded.record
            "#,
        )
        .bind(profile.id.to_string())
        .bind(record)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(profile = profile.id, error = %e, "profile failed to save");
            outcome.failures.push(UpsertFailure {
                part: Subdocument::Profile,
                detail: e.to_string(),
            });
        }
        Ok(outcome)
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    /// Flush the write-ahead log, compact the file, and recount.
    async fn commit(&self) -> Result<u64> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        sqlx::query("VACUUM").execute(&self.pool).await?;
        self.count().await
    }

    async fn ids(&self) -> Result<Vec<i64>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT id FROM profiles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys.iter().filter_map(|key| key.parse().ok()).collect())
    }

    async fn profile(&self, id: i64) -> Result<Option<Value>> {
        self.record(id).await
    }

    async fn presentations(&self, id: i64) -> Result<Option<Value>> {
        Ok(self
            .record(id)
            .await?
            .and_then(|doc| doc.get("presentations").cloned()))
    }

    async fn publications(&self, id: i64) -> Result<Option<Value>> {
        Ok(self
            .record(id)
            .await?
            .and_then(|doc| doc.get("publications").cloned()))
    }

    async fn processing(&self, id: i64) -> Result<Option<Value>> {
        Ok(self
            .record(id)
            .await?
            .and_then(|doc| doc.get("processed").cloned()))
    }

    fn describe(&self) -> String {
        format!("single-file store at {}", self.path.display())
    }
}
