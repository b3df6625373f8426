//! Core data types flowing through the synchronization pipeline.
//!
//! Profiles are arbitrary nested JSON objects on the wire, so records are
//! carried as `serde_json` values; only the fields the pipeline itself
//! needs (id, modification stamp) are lifted out.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One page of the remote profiles listing.
///
/// Only the first page is guaranteed to carry the advertised totals; later
/// pages may omit any of these fields, so everything defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilePage {
    pub first_page: bool,
    pub last_page: bool,
    pub total_pages: u32,
    pub total_count: u64,
    pub values: Vec<Value>,
}

/// A profile record after sanitization, nested collections intact.
#[derive(Debug, Clone)]
pub struct NormalizedProfile {
    pub id: i64,
    /// The record's `lastModified` stamp, verbatim from the API.
    pub last_modified: Option<String>,
    pub record: Map<String, Value>,
}

/// The sub-documents a profile splits into for split-storage persistence.
#[derive(Debug, Clone)]
pub struct SplitProfile {
    /// The profile with nested collections and the id field removed.
    pub core: Map<String, Value>,
    /// Presentations with the `detail` field stripped from each element.
    pub presentations: Vec<Value>,
    /// Publications filtered down to the attribute allow-list.
    pub publications: Vec<Value>,
}

/// How a synchronization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The server signaled the last page and every page was processed.
    Complete,
    /// Pagination stopped early (failed page or page bound); whatever was
    /// fetched up to that point is committed.
    Partial,
    /// An unexpected failure aborted the page loop; the commit step still
    /// ran and the stored count reflects what landed.
    Failed,
}

/// Result of one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub pages_fetched: u32,
    /// Total pages advertised by the first page of the response, zero if
    /// the first page never arrived.
    pub total_pages: u32,
    /// Total record count advertised by the first page of the response.
    pub total_advertised: u64,
    /// Stored top-level profile count after commit.
    pub stored: u64,
}
