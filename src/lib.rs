//! # Profile Sync
//!
//! **Full-refresh synchronization of researcher profile records into a
//! local store.**
//!
//! Profile Sync pulls the paginated profiles listing from a remote API,
//! sanitizes each record, and persists it into one of two interchangeable
//! backends: an embedded single-file table or a split document store.
//!
//! ## Data Flow
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ Token       │   │ SyncPipeline  │   │ ProfileStore │
//! │ endpoint    │──▶│ page loop +   │──▶│ single-file  │
//! │ Profiles API│   │ normalization │   │ or document  │
//! └────────────┘   └───────────────┘   └──────────────┘
//! ```
//!
//! 1. The [`auth`] module obtains a bearer token via a client-credentials
//!    grant and caches it until expiry.
//! 2. The [`sync`] pipeline clears the configured store and walks the
//!    listing page by page (`p`/`ps` query parameters) until the server
//!    signals the last page.
//! 3. Each record passes through the [`normalize`] policies: privileged
//!    identity fields are redacted, and the split backend additionally
//!    separates presentations (without `detail`), allow-listed
//!    publications, and derived processing metadata.
//! 4. The [`store`] backends persist records with different semantics:
//!    the single-file store overwrites per id, the document store inserts
//!    under a uniqueness constraint so only a fresh `clear` makes re-syncs
//!    idempotent.
//! 5. Whatever happens past authentication, the run ends with a commit
//!    and a stored-vs-advertised report.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Wire page, normalized profile, and report types |
//! | [`error`] | Failure taxonomy of a synchronization run |
//! | [`auth`] | Bearer-token lifecycle (client-credentials grant) |
//! | [`api`] | Paginated profiles API client |
//! | [`normalize`] | Privileged-field redaction and record splitting |
//! | [`db`] | SQLite connections for the stores |
//! | [`store`] | `ProfileStore` trait and both backends |
//! | [`sync`] | Full-refresh pipeline orchestration |
//! | [`get`] | Point lookups for the CLI |
//! | [`stats`] | Store status overview |

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod models;
pub mod normalize;
pub mod stats;
pub mod store;
pub mod sync;

pub use error::SyncError;
pub use models::{SyncOutcome, SyncReport};
pub use store::{open_store, ProfileStore};
pub use sync::SyncPipeline;
