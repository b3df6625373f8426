//! Remote profile API client.
//!
//! Thin wrapper over reqwest for the paginated profiles listing. The
//! bearer credential is supplied per request by the caller; everything
//! else (JSON headers, timeouts) is fixed at construction.

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::SyncError;
use crate::models::ProfilePage;

const JSON_CONTENT: &str = "application/json";

/// Default request headers shared by the profile and token clients.
pub(crate) fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT));
    headers
}

pub struct ProfileApi {
    client: reqwest::Client,
    profiles_url: String,
    page_size: u32,
}

impl ProfileApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .default_headers(json_headers())
            .build()?;

        let profiles_url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.profiles_path
        );

        Ok(Self {
            client,
            profiles_url,
            page_size: config.page_size,
        })
    }

    /// Fetch one page of the profiles listing.
    ///
    /// Non-200 responses and transport failures come back as the
    /// pagination-ending error variants; a 200 with an undecodable body is
    /// reported separately so the caller can treat it as unexpected.
    pub async fn fetch_page(&self, bearer: &str, page: u32) -> Result<ProfilePage, SyncError> {
        let response = self
            .client
            .get(&self.profiles_url)
            .query(&[("p", page), ("ps", self.page_size)])
            .header(AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(|source| SyncError::Transport { page, source })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SyncError::PageFetch {
                page,
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|source| SyncError::MalformedPage { page, source })
    }
}
