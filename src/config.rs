//! Application configuration management.
//!
//! The client needs exactly two settings: the backend origin and the
//! directory for durable session storage. Both can come from the
//! environment (or a `.env` file); defaults cover the rest.

use std::path::PathBuf;

use anyhow::Result;

/// Application name used for the default storage directory path
const APP_NAME: &str = "gigmarket";

/// Default backend origin when `GIGMARKET_API_URL` is not set
const DEFAULT_API_BASE_URL: &str = "http://localhost:7205/api";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend REST API, without a trailing slash.
    pub api_base_url: String,
    /// Directory holding the durable session keys (tokens, profile snapshot).
    pub storage_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = std::env::var("GIGMARKET_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        let storage_dir = match std::env::var("GIGMARKET_STORAGE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?
                .join(APP_NAME),
        };

        Ok(Self {
            api_base_url,
            storage_dir,
        })
    }

    /// Build a config with explicit values, bypassing the environment.
    pub fn new(api_base_url: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            storage_dir: storage_dir.into(),
        }
    }
}
