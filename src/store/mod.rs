//! Storage abstraction for normalized profile records.
//!
//! The [`ProfileStore`] trait defines every persistence operation the sync
//! pipeline needs, enabling two interchangeable backends:
//!
//! - [`single_file::SingleFileStore`] — one embedded table mapping profile
//!   id to the whole document; upserts overwrite.
//! - [`document::DocumentStore`] — four collections (profiles,
//!   presentations, publications, processed) with insert-only uniqueness
//!   per profile id.
//!
//! The backend is chosen once at startup via [`open_store`]; implementations
//! must be `Send + Sync` to work with async runtimes.

pub mod document;
pub mod single_file;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::NormalizedProfile;

/// The sub-document an upsert step writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subdocument {
    Profile,
    Presentations,
    Publications,
    Processing,
}

impl fmt::Display for Subdocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subdocument::Profile => "profile",
            Subdocument::Presentations => "presentations",
            Subdocument::Publications => "publications",
            Subdocument::Processing => "processing",
        };
        f.write_str(name)
    }
}

/// A recoverable failure for one upsert step.
#[derive(Debug, Clone)]
pub struct UpsertFailure {
    pub part: Subdocument,
    pub detail: String,
}

/// Outcome of persisting a single profile.
///
/// Every failure recorded here is recoverable by contract: the caller logs
/// it and continues with the next record.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub id: i64,
    pub failures: Vec<UpsertFailure>,
}

impl UpsertOutcome {
    pub fn clean(id: i64) -> Self {
        Self {
            id,
            failures: Vec::new(),
        }
    }

    /// Whether the primary profile document landed.
    pub fn profile_stored(&self) -> bool {
        !self
            .failures
            .iter()
            .any(|failure| failure.part == Subdocument::Profile)
    }

    pub fn failed(&self, part: Subdocument) -> bool {
        self.failures.iter().any(|failure| failure.part == part)
    }
}

/// Abstract persistence backend for profile records.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Irreversibly empty all managed collections. Not atomic with the
    /// writes that follow it.
    async fn clear(&self) -> Result<()>;

    /// Persist one normalized profile and its derived sub-records.
    ///
    /// A single bad record never fails the run: per-step problems are
    /// logged and reported in the returned outcome, and the remaining
    /// steps still execute.
    async fn upsert(&self, profile: &NormalizedProfile) -> Result<UpsertOutcome>;

    /// Number of stored top-level profile records.
    async fn count(&self) -> Result<u64>;

    /// Backend-specific durability step; returns the resulting row count.
    async fn commit(&self) -> Result<u64>;

    /// All stored profile ids.
    async fn ids(&self) -> Result<Vec<i64>>;

    /// Point lookup of the stored profile document.
    async fn profile(&self, id: i64) -> Result<Option<Value>>;

    /// Point lookup of a profile's presentations.
    async fn presentations(&self, id: i64) -> Result<Option<Value>>;

    /// Point lookup of a profile's publications.
    async fn publications(&self, id: i64) -> Result<Option<Value>>;

    /// Point lookup of a profile's processing metadata.
    async fn processing(&self, id: i64) -> Result<Option<Value>>;

    /// Backend name and location for report lines.
    fn describe(&self) -> String;
}

/// Open the configured backend.
///
/// The strategy choice happens exactly once, here; everything downstream
/// goes through the trait. Opening also runs the backend's idempotent
/// schema setup.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn ProfileStore>> {
    match config.backend {
        StoreBackend::SingleFile => {
            let path = config
                .path
                .as_ref()
                .context("store.path is required for the single-file backend")?;
            Ok(Arc::new(single_file::SingleFileStore::open(path).await?))
        }
        StoreBackend::Document => {
            let url = config
                .url
                .as_deref()
                .context("store.url is required for the document backend")?;
            Ok(Arc::new(document::DocumentStore::open(url).await?))
        }
    }
}
