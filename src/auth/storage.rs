//! Durable session storage.
//!
//! Four independent keys persisted across restarts, one file per key under
//! the configured storage directory:
//!
//! - `access_token`: short-lived bearer credential
//! - `refresh_token`: longer-lived credential exchanged for a new pair
//! - `profile.json`: last-known-good profile snapshot for instant paint
//!   (never authoritative, overwritten on every successful fetch)
//! - `last_refresh_attempt`: epoch millis of the last refresh attempt,
//!   used to throttle bootstrap-triggered refreshes
//!
//! Reads are infallible (a corrupt or unreadable key behaves like an absent
//! one, with a warning); writes propagate errors. `clear_all` attempts every
//! key even when one removal fails, so no partial-clear state survives a
//! logout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::warn;

use crate::models::UserProfile;

/// File names for the durable keys. Stable across releases: a rename here
/// silently logs out every user.
const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const PROFILE_KEY: &str = "profile.json";
const LAST_REFRESH_ATTEMPT_KEY: &str = "last_refresh_attempt";

/// The credential pair issued at login and rotated on every refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionStorage {
    dir: PathBuf,
}

impl SessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn read_key(&self, key: &str) -> Option<String> {
        let path = self.key_path(key);
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) => {
                warn!(key, error = %e, "Failed to read storage key");
                None
            }
        }
    }

    fn write_key(&self, key: &str, value: &str) -> Result<()> {
        std::fs::write(self.key_path(key), value)
            .with_context(|| format!("Failed to write storage key {key}"))
    }

    fn remove_key(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove storage key {key}"))?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ===== Credential pair =====

    pub fn access_token(&self) -> Option<String> {
        self.read_key(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_key(REFRESH_TOKEN_KEY)
    }

    /// Both tokens, or nothing: one token without its sibling is "no
    /// session".
    pub fn credentials(&self) -> Option<CredentialPair> {
        match (self.access_token(), self.refresh_token()) {
            (Some(access_token), Some(refresh_token)) => Some(CredentialPair {
                access_token,
                refresh_token,
            }),
            _ => None,
        }
    }

    pub fn store_credentials(&self, pair: &CredentialPair) -> Result<()> {
        self.write_key(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.write_key(REFRESH_TOKEN_KEY, &pair.refresh_token)?;
        Ok(())
    }

    pub fn clear_credentials(&self) -> Result<()> {
        let access = self.remove_key(ACCESS_TOKEN_KEY);
        let refresh = self.remove_key(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    // ===== Profile snapshot =====

    pub fn cached_profile(&self) -> Option<UserProfile> {
        let contents = self.read_key(PROFILE_KEY)?;
        match serde_json::from_str(&contents) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Failed to parse cached profile");
                None
            }
        }
    }

    pub fn store_profile(&self, profile: &UserProfile) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(profile).context("Failed to serialize profile")?;
        self.write_key(PROFILE_KEY, &contents)
    }

    pub fn clear_profile(&self) -> Result<()> {
        self.remove_key(PROFILE_KEY)
    }

    // ===== Refresh throttle timestamp =====

    /// Epoch millis of the last refresh attempt, if any.
    pub fn last_refresh_attempt(&self) -> Option<i64> {
        let contents = self.read_key(LAST_REFRESH_ATTEMPT_KEY)?;
        match contents.trim().parse() {
            Ok(millis) => Some(millis),
            Err(e) => {
                warn!(error = %e, "Failed to parse last refresh attempt timestamp");
                None
            }
        }
    }

    pub fn record_refresh_attempt(&self) -> Result<()> {
        self.write_key(
            LAST_REFRESH_ATTEMPT_KEY,
            &Utc::now().timestamp_millis().to_string(),
        )
    }

    // ===== Full teardown =====

    /// Remove every durable key. Each removal is attempted even if an
    /// earlier one fails; the first error is reported.
    pub fn clear_all(&self) -> Result<()> {
        let mut first_error = None;
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            PROFILE_KEY,
            LAST_REFRESH_ATTEMPT_KEY,
        ] {
            if let Err(e) = self.remove_key(key) {
                warn!(key, error = %e, "Failed to clear storage key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
