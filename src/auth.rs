//! Bearer-token lifecycle against the OAuth client-credentials endpoint.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::api::json_headers;
use crate::config::AuthConfig;

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

/// Manages the bearer-token credential for the profile API.
///
/// A successful [`authenticate`](TokenAuthenticator::authenticate) caches
/// the token with its absolute expiry; until the expiry passes, later
/// calls return immediately without a network round-trip. The cached
/// bearer is what the pipeline attaches to every profile API request for
/// the lifetime of this instance.
pub struct TokenAuthenticator {
    client: reqwest::Client,
    token_url: String,
    user: String,
    secret: String,
    bearer: Option<String>,
    expiry: Option<DateTime<Utc>>,
}

impl TokenAuthenticator {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .default_headers(json_headers())
            .build()?;

        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            user: config.user.clone(),
            secret: config.secret.clone(),
            bearer: None,
            expiry: None,
        })
    }

    /// The cached bearer value (`"Bearer <token>"`), if one is held.
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Ensure a valid bearer token is cached.
    ///
    /// Returns `Ok(false)` when the credential pair is empty, the token
    /// endpoint answers non-200, or the body carries no access token.
    /// Transport failures surface as errors; the caller treats either
    /// shape as an authentication failure.
    pub async fn authenticate(&mut self) -> Result<bool> {
        if self.expiry.map_or(true, |expiry| Utc::now() >= expiry) {
            self.bearer = None;
            self.expiry = None;
        }
        if self.bearer.is_some() {
            return Ok(true);
        }
        if self.user.is_empty() && self.secret.is_empty() {
            return Ok(false);
        }

        let credentials = BASE64.encode(format!("{}:{}", self.user, self.secret));
        let response = self
            .client
            .get(&self.token_url)
            .query(&[("grant_type", "client_credentials")])
            .header(reqwest::header::AUTHORIZATION, format!("Basic {credentials}"))
            .send()
            .await
            .context("token endpoint request failed")?;

        if response.status() != reqwest::StatusCode::OK {
            debug!(status = %response.status(), "token endpoint refused the request");
            return Ok(false);
        }

        let body: TokenBody = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "token endpoint returned a malformed body");
                return Ok(false);
            }
        };
        let Some(token) = body.access_token else {
            return Ok(false);
        };

        self.bearer = Some(format!("Bearer {token}"));
        self.expiry = Some(Utc::now() + Duration::seconds(body.expires_in));
        debug!(expires_in = body.expires_in, "access token refreshed");
        Ok(true)
    }

    /// Forced refresh: invalidate the cached expiry, then authenticate.
    pub async fn reauthenticate(&mut self) -> Result<bool> {
        self.expiry = None;
        self.authenticate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(token_url: String, user: &str, secret: &str) -> AuthConfig {
        AuthConfig {
            token_url,
            user: user.to_string(),
            secret: secret.to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 2,
        }
    }

    async fn serve_token(body: Value, status: u16) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/token",
            get(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        axum::http::StatusCode::from_u16(status).unwrap(),
                        Json(body),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/token"), calls)
    }

    #[tokio::test]
    async fn empty_credentials_fail_without_network() {
        let mut auth =
            TokenAuthenticator::new(&config("http://127.0.0.1:1/token".into(), "", "")).unwrap();
        assert!(!auth.authenticate().await.unwrap());
        assert!(auth.bearer().is_none());
    }

    #[tokio::test]
    async fn caches_token_until_expiry() {
        let (url, calls) = serve_token(
            json!({"access_token": "abc", "expires_in": 3600}),
            200,
        )
        .await;
        let mut auth = TokenAuthenticator::new(&config(url, "user", "secret")).unwrap();

        assert!(auth.authenticate().await.unwrap());
        assert_eq!(auth.bearer(), Some("Bearer abc"));
        assert!(auth.authenticate().await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_is_cleared_and_refreshed() {
        let (url, calls) = serve_token(
            json!({"access_token": "abc", "expires_in": 3600}),
            200,
        )
        .await;
        let mut auth = TokenAuthenticator::new(&config(url, "user", "secret")).unwrap();

        assert!(auth.authenticate().await.unwrap());
        auth.expiry = Some(Utc::now() - Duration::seconds(1));
        assert!(auth.authenticate().await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reauthenticate_forces_refresh() {
        let (url, calls) = serve_token(
            json!({"access_token": "abc", "expires_in": 3600}),
            200,
        )
        .await;
        let mut auth = TokenAuthenticator::new(&config(url, "user", "secret")).unwrap();

        assert!(auth.authenticate().await.unwrap());
        assert!(auth.reauthenticate().await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_200_token_response_fails() {
        let (url, _) = serve_token(json!({"error": "invalid_client"}), 401).await;
        let mut auth = TokenAuthenticator::new(&config(url, "user", "bad")).unwrap();
        assert!(!auth.authenticate().await.unwrap());
        assert!(auth.bearer().is_none());
    }

    #[tokio::test]
    async fn missing_access_token_fails() {
        let (url, _) = serve_token(json!({"expires_in": 3600}), 200).await;
        let mut auth = TokenAuthenticator::new(&config(url, "user", "secret")).unwrap();
        assert!(!auth.authenticate().await.unwrap());
    }
}
