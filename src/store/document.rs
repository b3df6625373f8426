//! Split-storage backend: four collections keyed by profile id.
//!
//! Each upsert performs four independent inserts: presentations (with
//! `detail` stripped), publications (filtered to the allow-list), the
//! profile core (nested collections removed), and a derived processing
//! record. Ids carry a uniqueness constraint, so re-inserting without a
//! prior `clear` fails per step instead of overwriting; a failed step is
//! logged and reported while the remaining steps still run. The backend
//! is therefore idempotent only in combination with `clear`, never on
//! repeated upserts alone.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::{ProfileStore, Subdocument, UpsertFailure, UpsertOutcome};
use crate::db;
use crate::models::NormalizedProfile;
use crate::normalize::split_profile;

const COLLECTIONS: [&str; 4] = ["profiles", "presentations", "publications", "processed"];

pub struct DocumentStore {
    pool: SqlitePool,
    url: String,
}

impl DocumentStore {
    /// Connect and ensure all four collections exist.
    pub async fn open(url: &str) -> Result<Self> {
        let pool = db::connect_url(url).await?;
        create_collections(&pool).await?;
        Ok(Self {
            pool,
            url: url.to_string(),
        })
    }

    async fn insert(&self, collection: &str, id: i64, body: String) -> sqlx::Result<()> {
        let sql = format!("INSERT INTO {collection} (id, body) VALUES (?, ?)");
        sqlx::query(&sql).bind(id).bind(body).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch(&self, collection: &str, id: i64) -> Result<Option<Value>> {
        let sql = format!("SELECT body FROM {collection} WHERE id = ?");
        let row: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Derive and insert the processing-metadata record for one profile.
    ///
    /// `cap_modified` comes from the record's `lastModified`; a missing or
    /// unparseable stamp fails this step only.
    async fn insert_processing(&self, profile: &NormalizedProfile) -> Result<()> {
        let modified = profile
            .last_modified
            .as_deref()
            .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
            .ok_or_else(|| anyhow!("missing or unparseable lastModified"))?;

        let mut data = match self.fetch("processed", profile.id).await {
            Ok(Some(doc)) => doc
                .get("data")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            _ => Map::new(),
        };
        let now = Utc::now().timestamp();
        data.insert("cap_modified".to_string(), json!(modified.timestamp()));
        data.insert("cap_retrieved".to_string(), json!(now));

        let body = json!({ "lastModified": now, "data": data }).to_string();
        self.insert("processed", profile.id, body).await?;
        Ok(())
    }
}

async fn create_collections(pool: &SqlitePool) -> Result<()> {
    for collection in COLLECTIONS {
        let sql =
            format!("CREATE TABLE IF NOT EXISTS {collection} (id INTEGER PRIMARY KEY, body TEXT NOT NULL)");
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}

#[async_trait]
impl ProfileStore for DocumentStore {
    /// Drop and recreate all four collections.
    async fn clear(&self) -> Result<()> {
        for collection in COLLECTIONS {
            let sql = format!("DROP TABLE IF EXISTS {collection}");
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        create_collections(&self.pool).await
    }

    async fn upsert(&self, profile: &NormalizedProfile) -> Result<UpsertOutcome> {
        let id = profile.id;
        let mut outcome = UpsertOutcome::clean(id);
        let split = split_profile(&profile.record);

        let body = json!({ "presentations": split.presentations }).to_string();
        if let Err(e) = self.insert("presentations", id, body).await {
            warn!(profile = id, error = %e, "presentations failed to save");
            outcome.failures.push(UpsertFailure {
                part: Subdocument::Presentations,
                detail: e.to_string(),
            });
        }

        let body = json!({ "publications": split.publications }).to_string();
        if let Err(e) = self.insert("publications", id, body).await {
            warn!(profile = id, error = %e, "publications failed to save");
            outcome.failures.push(UpsertFailure {
                part: Subdocument::Publications,
                detail: e.to_string(),
            });
        }

        let body = Value::Object(split.core).to_string();
        if let Err(e) = self.insert("profiles", id, body).await {
            warn!(profile = id, error = %e, "profile failed to save");
            outcome.failures.push(UpsertFailure {
                part: Subdocument::Profile,
                detail: e.to_string(),
            });
        }

        if let Err(e) = self.insert_processing(profile).await {
            warn!(profile = id, error = %e, "failed to update process data");
            outcome.failures.push(UpsertFailure {
                part: Subdocument::Processing,
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

    /// Durability is per-insert here; commit only reports the count.
    async fn commit(&self) -> Result<u64> {
        let n = self.count().await?;
        info!(profiles = n, "document store commit");
        Ok(n)
    }

    async fn ids(&self) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM profiles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn profile(&self, id: i64) -> Result<Option<Value>> {
        Ok(self.fetch("profiles", id).await?.map(|mut doc| {
            // the id column is the primary key; restore it as a field
            if let Value::Object(map) = &mut doc {
                map.insert("profileId".to_string(), json!(id));
            }
            doc
        }))
    }

    async fn presentations(&self, id: i64) -> Result<Option<Value>> {
        Ok(self
            .fetch("presentations", id)
            .await?
            .and_then(|doc| doc.get("presentations").cloned()))
    }

    async fn publications(&self, id: i64) -> Result<Option<Value>> {
        Ok(self
            .fetch("publications", id)
            .await?
            .and_then(|doc| doc.get("publications").cloned()))
    }

    async fn processing(&self, id: i64) -> Result<Option<Value>> {
        self.fetch("processed", id).await
    }

    fn describe(&self) -> String {
        format!("document store at {}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::PUBLICATION_FIELDS;
    use serde_json::json;

    const LAST_MODIFIED: &str = "2015-08-17T10:55:46.772-07:00";

    fn profile(id: i64, name: &str) -> NormalizedProfile {
        let Value::Object(record) = json!({
            "profileId": id,
            "displayName": name,
            "lastModified": LAST_MODIFIED,
            "presentations": [{"title": "Talk", "detail": "stripped"}],
            "publications": [{"doiId": "10.1000/1", "title": "dropped"}]
        }) else {
            unreachable!()
        };
        NormalizedProfile {
            id,
            last_modified: Some(LAST_MODIFIED.to_string()),
            record,
        }
    }

    async fn open_store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("repo.db").display());
        let store = DocumentStore::open(&url).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn upsert_splits_into_four_collections() {
        let (_dir, store) = open_store().await;
        let outcome = store.upsert(&profile(1, "Jane")).await.unwrap();
        assert!(outcome.failures.is_empty());

        let core = store.profile(1).await.unwrap().unwrap();
        assert_eq!(core["profileId"], 1);
        assert_eq!(core["displayName"], "Jane");
        assert!(core.get("presentations").is_none());
        assert!(core.get("publications").is_none());

        let presentations = store.presentations(1).await.unwrap().unwrap();
        assert!(presentations[0].get("detail").is_none());

        let publications = store.publications(1).await.unwrap().unwrap();
        let keys = publications[0].as_object().unwrap();
        for key in keys.keys() {
            assert!(PUBLICATION_FIELDS.contains(&key.as_str()));
        }

        let processing = store.processing(1).await.unwrap().unwrap();
        let expected = DateTime::parse_from_rfc3339(LAST_MODIFIED).unwrap().timestamp();
        assert_eq!(processing["data"]["cap_modified"], json!(expected));
        assert!(processing["data"]["cap_retrieved"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn repeated_upsert_without_clear_fails_per_step() {
        let (_dir, store) = open_store().await;
        store.upsert(&profile(1, "first")).await.unwrap();
        let outcome = store.upsert(&profile(1, "second")).await.unwrap();

        assert!(!outcome.profile_stored());
        assert!(outcome.failed(Subdocument::Presentations));
        assert!(outcome.failed(Subdocument::Publications));
        assert!(outcome.failed(Subdocument::Processing));

        // the first write wins; nothing was overwritten
        let core = store.profile(1).await.unwrap().unwrap();
        assert_eq!(core["displayName"], "first");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_restores_insertability() {
        let (_dir, store) = open_store().await;
        store.upsert(&profile(1, "first")).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        let outcome = store.upsert(&profile(1, "second")).await.unwrap();
        assert!(outcome.failures.is_empty());
        let core = store.profile(1).await.unwrap().unwrap();
        assert_eq!(core["displayName"], "second");
    }

    #[tokio::test]
    async fn failed_step_does_not_block_siblings() {
        let (_dir, store) = open_store().await;
        // occupy the presentations slot so that step alone collides
        store
            .insert("presentations", 2, json!({"presentations": []}).to_string())
            .await
            .unwrap();

        let outcome = store.upsert(&profile(2, "Jane")).await.unwrap();
        assert!(outcome.failed(Subdocument::Presentations));
        assert!(outcome.profile_stored());
        assert!(!outcome.failed(Subdocument::Publications));
        assert!(!outcome.failed(Subdocument::Processing));

        assert!(store.profile(2).await.unwrap().is_some());
        assert!(store.publications(2).await.unwrap().is_some());
        assert!(store.processing(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_last_modified_fails_processing_only() {
        let (_dir, store) = open_store().await;
        let mut record = profile(3, "Jane");
        record.last_modified = None;

        let outcome = store.upsert(&record).await.unwrap();
        assert!(outcome.failed(Subdocument::Processing));
        assert!(outcome.profile_stored());
        assert!(store.processing(3).await.unwrap().is_none());
        assert!(store.profile(3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn profile_without_collections_stores_empty_sequences() {
        let (_dir, store) = open_store().await;
        let Value::Object(record) = json!({
            "profileId": 4,
            "lastModified": LAST_MODIFIED
        }) else {
            unreachable!()
        };
        let profile = NormalizedProfile {
            id: 4,
            last_modified: Some(LAST_MODIFIED.to_string()),
            record,
        };
        let outcome = store.upsert(&profile).await.unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(store.presentations(4).await.unwrap().unwrap(), json!([]));
        assert_eq!(store.publications(4).await.unwrap().unwrap(), json!([]));
    }
}
