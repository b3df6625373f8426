use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::normalize::DEFAULT_PRIVILEGED_FIELDS;

/// Environment variable overriding `[auth] user`.
pub const TOKEN_USER_ENV: &str = "PROSYNC_TOKEN_USER";
/// Environment variable overriding `[auth] secret`.
pub const TOKEN_SECRET_ENV: &str = "PROSYNC_TOKEN_SECRET";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_profiles_path")]
    pub profiles_path: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Safety bound on the page loop. Unset means the loop runs until the
    /// server signals the last page.
    #[serde(default)]
    pub max_pages: Option<u32>,
}

fn default_profiles_path() -> String {
    "/profiles/v1".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_api_timeout() -> u64 {
    90
}
fn default_connect_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub token_url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_auth_timeout() -> u64 {
    30
}

/// Which persistence backend backs the pipeline. Selected once at startup;
/// everything downstream goes through the [`ProfileStore`](crate::store::ProfileStore) trait.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    SingleFile,
    Document,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the single-file backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Connection string for the document backend (e.g. `sqlite:data/profiles.db`).
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SanitizeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_privileged_fields")]
    pub privileged_fields: Vec<String>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            privileged_fields: default_privileged_fields(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_privileged_fields() -> Vec<String> {
    DEFAULT_PRIVILEGED_FIELDS
        .iter()
        .map(|f| f.to_string())
        .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Credentials may come from the environment instead of the config file.
    if let Ok(user) = std::env::var(TOKEN_USER_ENV) {
        config.auth.user = user;
    }
    if let Ok(secret) = std::env::var(TOKEN_SECRET_ENV) {
        config.auth.secret = secret;
    }

    if config.api.base_url.is_empty() {
        anyhow::bail!("api.base_url must be set");
    }

    if config.auth.token_url.is_empty() {
        anyhow::bail!("auth.token_url must be set");
    }

    if config.api.page_size == 0 {
        anyhow::bail!("api.page_size must be > 0");
    }

    match config.store.backend {
        StoreBackend::SingleFile => {
            if config.store.path.is_none() {
                anyhow::bail!("store.path must be set for the single-file backend");
            }
        }
        StoreBackend::Document => {
            if config.store.url.is_none() {
                anyhow::bail!("store.url must be set for the document backend");
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prosync.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults_applied() {
        let (_dir, path) = write_config(
            r#"
            [api]
            base_url = "https://api.example.edu"

            [auth]
            token_url = "https://authz.example.edu/oauth/token"

            [store]
            backend = "single-file"
            path = "data/profiles.db"
            "#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.api.profiles_path, "/profiles/v1");
        assert_eq!(config.api.timeout_secs, 90);
        assert_eq!(config.auth.timeout_secs, 30);
        assert!(config.sanitize.enabled);
        assert_eq!(config.sanitize.privileged_fields, ["uid", "universityId"]);
        assert!(config.api.max_pages.is_none());
    }

    #[test]
    fn document_backend_requires_url() {
        let (_dir, path) = write_config(
            r#"
            [api]
            base_url = "https://api.example.edu"

            [auth]
            token_url = "https://authz.example.edu/oauth/token"

            [store]
            backend = "document"
            "#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn zero_page_size_rejected() {
        let (_dir, path) = write_config(
            r#"
            [api]
            base_url = "https://api.example.edu"
            page_size = 0

            [auth]
            token_url = "https://authz.example.edu/oauth/token"

            [store]
            backend = "single-file"
            path = "data/profiles.db"
            "#,
        );
        assert!(load_config(&path).is_err());
    }
}
