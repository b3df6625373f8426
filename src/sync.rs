//! Full-refresh synchronization pipeline.
//!
//! Coordinates the whole flow: authenticate → clear the store → fetch
//! pages sequentially → normalize and persist each record → commit and
//! report. Per-record failures are recovered locally; a failed page stops
//! pagination but the run still commits whatever landed.

use anyhow::Result;
use tracing::{error, warn};

use crate::api::ProfileApi;
use crate::auth::TokenAuthenticator;
use crate::config::Config;
use crate::error::SyncError;
use crate::models::{SyncOutcome, SyncReport};
use crate::normalize::Normalizer;
use crate::store::ProfileStore;

/// Progress of one run: page counters, advertised totals (captured from
/// the first page only), and the running stored count.
#[derive(Debug, Default)]
struct SyncSession {
    pages_fetched: u32,
    total_pages: u32,
    total_count: u64,
    stored: u64,
}

enum LoopEnd {
    LastPage,
    PageFailure,
    PageBound,
}

pub struct SyncPipeline<'a> {
    auth: TokenAuthenticator,
    api: ProfileApi,
    normalizer: Normalizer,
    store: &'a dyn ProfileStore,
    max_pages: Option<u32>,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(config: &Config, store: &'a dyn ProfileStore) -> Result<Self> {
        Ok(Self {
            auth: TokenAuthenticator::new(&config.auth)?,
            api: ProfileApi::new(&config.api)?,
            normalizer: Normalizer::from_config(&config.sanitize),
            store,
            max_pages: config.api.max_pages,
        })
    }

    /// Run one full-refresh sync.
    ///
    /// Fails only when authentication does, in which case the store is
    /// untouched. Past that point the store is cleared and refilled page
    /// by page with no transaction around the run: a crash mid-way leaves
    /// it partially populated, and the recovery procedure is simply the
    /// next run. The commit step executes even when the page loop fails,
    /// so whatever was stored is still counted and reported.
    pub async fn run(&mut self) -> Result<SyncReport> {
        match self.auth.authenticate().await {
            Ok(true) => {}
            Ok(false) => {
                error!("failed to authenticate");
                return Err(SyncError::Authentication(
                    "token endpoint refused the credential pair".to_string(),
                )
                .into());
            }
            Err(e) => {
                error!(error = %e, "failed to authenticate");
                return Err(SyncError::Authentication(e.to_string()).into());
            }
        }
        let bearer = match self.auth.bearer() {
            Some(bearer) => bearer.to_owned(),
            None => {
                return Err(
                    SyncError::Authentication("no bearer token cached".to_string()).into(),
                )
            }
        };

        let mut session = SyncSession::default();
        let loop_result = self.fetch_all(&bearer, &mut session).await;

        let stored = match self.store.commit().await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "store commit failed");
                session.stored
            }
        };
        println!("Stored {} of {} profiles.", stored, session.total_count);
        println!("Stored profiles to {}.", self.store.describe());

        let outcome = match loop_result {
            Ok(LoopEnd::LastPage) => SyncOutcome::Complete,
            Ok(LoopEnd::PageFailure | LoopEnd::PageBound) => SyncOutcome::Partial,
            Err(e) => {
                error!(error = %e, "sync run failed");
                SyncOutcome::Failed
            }
        };

        Ok(SyncReport {
            outcome,
            pages_fetched: session.pages_fetched,
            total_pages: session.total_pages,
            total_advertised: session.total_count,
            stored,
        })
    }

    async fn fetch_all(&self, bearer: &str, session: &mut SyncSession) -> Result<LoopEnd> {
        self.store.clear().await?;

        let mut page = 1u32;
        loop {
            let data = match self.api.fetch_page(bearer, page).await {
                Ok(data) => data,
                Err(e @ (SyncError::PageFetch { .. } | SyncError::Transport { .. })) => {
                    error!(page, error = %e, "stopping pagination");
                    println!("{e}");
                    return Ok(LoopEnd::PageFailure);
                }
                Err(e) => return Err(e.into()),
            };

            session.pages_fetched += 1;
            if data.first_page {
                session.total_pages = data.total_pages;
                session.total_count = data.total_count;
                println!(
                    "Retrieved {} of {} pages ({} profiles).",
                    page, session.total_pages, session.total_count
                );
            } else {
                println!("Retrieved {} of {} pages.", page, session.total_pages);
            }

            for raw in data.values {
                let profile = match self.normalizer.process(raw) {
                    Ok(profile) => profile,
                    Err(e) => {
                        error!(page, error = %e, "skipping record");
                        continue;
                    }
                };
                match self.store.upsert(&profile).await {
                    Ok(outcome) => {
                        // per-step failures were already logged by the store
                        if outcome.profile_stored() {
                            session.stored += 1;
                        }
                    }
                    Err(e) => {
                        error!(profile = profile.id, error = %e, "profile failed to save");
                    }
                }
            }

            if data.last_page {
                return Ok(LoopEnd::LastPage);
            }
            if let Some(bound) = self.max_pages {
                if page >= bound {
                    warn!(bound, "page bound reached before the server signaled lastPage");
                    return Ok(LoopEnd::PageBound);
                }
            }
            page += 1;
        }
    }
}
