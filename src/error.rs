//! Failure classes of a synchronization run.
//!
//! Everything below the run boundary is recovered locally: record-level
//! failures are logged and skipped, a failed page stops pagination but the
//! run still commits. Only authentication failures abort before the store
//! is touched.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing credentials, a non-200 token response, or a malformed token
    /// body. Fatal for the run; no store mutation occurs.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Non-200 response for a profiles page request. Ends the page loop;
    /// the run proceeds to commit with partial data.
    #[error("Failed to GET profiles page {page}: {status}")]
    PageFetch { page: u32, status: u16 },

    /// Transport-level failure (timeout, connection refused) for a page
    /// request. Treated like a failed page.
    #[error("profiles page {page} request failed: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    /// A 200 page whose body could not be decoded.
    #[error("profiles page {page} returned a malformed body: {source}")]
    MalformedPage {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    /// A single record that could not be normalized. Logged and skipped.
    #[error("profile record rejected: {0}")]
    Record(String),
}
