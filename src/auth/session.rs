//! Session lifecycle: the single owner of "who is logged in".
//!
//! The [`SessionStore`] wraps the API client and durable storage with a
//! small state machine. Consumers read [`SessionSnapshot`]s and react to
//! [`Navigation`] events; they never touch tokens directly.
//!
//! Bootstrap is two-phase: paint the cached profile immediately (marked
//! loading), then validate against `/user/me` and replace the optimistic
//! profile with the authoritative one. A transient network failure during
//! either phase keeps the cached session alive; only an authentication
//! failure tears it down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{RegisterData, UserProfile};
use crate::navigation::{Navigation, Navigator};

use super::storage::SessionStorage;
use super::token;

/// Minimum interval between bootstrap-triggered refresh attempts.
/// Guards against refresh storms when several surfaces bootstrap at once
/// (or the app relaunches in a crash loop). 401-triggered refreshes are
/// not throttled - those respond to a live server verdict.
const REFRESH_THROTTLE_MS: i64 = 10_000;

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
const REGISTRATION_SUCCESS_MESSAGE: &str =
    "Registration successful! Please verify your email to continue.";
const EMAIL_VERIFIED_MESSAGE: &str = "Email verified successfully! You can now log in.";
const PASSWORD_RESET_MESSAGE: &str =
    "Password reset successful! You can now log in with your new password.";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Before the first bootstrap.
    Uninitialized,
    /// Bootstrap in flight. `optimistic` is the cached profile being
    /// painted while the authoritative fetch runs.
    Bootstrapping { optimistic: Option<UserProfile> },
    /// No session.
    Anonymous,
    /// Validated against the backend.
    Authenticated(UserProfile),
}

/// What consumers render from. Derived from the state, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct SessionInner {
    state: SessionState,
    error: Option<String>,
}

pub struct SessionStore {
    api: ApiClient,
    storage: Arc<SessionStorage>,
    navigator: Arc<dyn Navigator>,
    inner: Mutex<SessionInner>,
    /// Set by [`force_refresh`](Self::force_refresh); consumed by the next
    /// bootstrap to bypass the already-validated short-circuit.
    force_refresh: AtomicBool,
}

impl SessionStore {
    pub fn new(
        api: ApiClient,
        storage: Arc<SessionStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            api,
            storage,
            navigator,
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                error: None,
            }),
            force_refresh: AtomicBool::new(false),
        }
    }

    // ===== State access =====

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().unwrap();
        let (user, is_loading) = match &inner.state {
            SessionState::Uninitialized => (None, true),
            SessionState::Bootstrapping { optimistic } => (optimistic.clone(), true),
            SessionState::Anonymous => (None, false),
            SessionState::Authenticated(profile) => (Some(profile.clone()), false),
        };
        SessionSnapshot {
            user,
            is_loading,
            error: inner.error.clone(),
        }
    }

    fn set_state(&self, state: SessionState) {
        self.inner.lock().unwrap().state = state;
    }

    fn set_authenticated(&self, profile: UserProfile) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = SessionState::Authenticated(profile);
        inner.error = None;
    }

    fn set_error(&self, message: impl Into<String>) {
        self.inner.lock().unwrap().error = Some(message.into());
    }

    fn clear_error(&self) {
        self.inner.lock().unwrap().error = None;
    }

    /// Resolve a Bootstrapping state using the optimistic profile: a cached
    /// profile stays painted (still plausibly valid), no cached profile
    /// means anonymous. Used when validation could not complete.
    fn settle_with_optimistic(&self, error: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        if let SessionState::Bootstrapping { optimistic } = &inner.state {
            inner.state = match optimistic.clone() {
                Some(profile) => SessionState::Authenticated(profile),
                None => SessionState::Anonymous,
            };
        }
        inner.error = error;
    }

    /// The session is definitively dead: wipe storage, go anonymous, send
    /// the user to login with an explanation.
    fn teardown_expired(&self) {
        if let Err(e) = self.storage.clear_all() {
            warn!(error = %e, "Failed to clear session storage");
        }
        {
            let mut inner = self.inner.lock().unwrap();
            inner.state = SessionState::Anonymous;
            inner.error = Some(SESSION_EXPIRED_MESSAGE.to_string());
        }
        self.navigator.navigate(Navigation::Login {
            redirect_to: None,
            message: Some(SESSION_EXPIRED_MESSAGE.to_string()),
        });
    }

    /// Request that the next bootstrap re-validate even if a user is
    /// already loaded.
    pub fn force_refresh(&self) {
        self.force_refresh.store(true, Ordering::SeqCst);
    }

    fn throttle_elapsed(&self) -> bool {
        match self.storage.last_refresh_attempt() {
            Some(last) => chrono::Utc::now().timestamp_millis() - last > REFRESH_THROTTLE_MS,
            None => true,
        }
    }

    // ===== Bootstrap =====

    /// Restore the session from durable storage and validate it.
    ///
    /// Called on startup and whenever a surface needs a trustworthy
    /// session (route guards call it before rendering protected content).
    /// Idempotent once a user is validated: repeat calls return without
    /// network traffic unless [`force_refresh`](Self::force_refresh) was
    /// requested.
    pub async fn bootstrap(&self) -> Result<(), ApiError> {
        let force = self.force_refresh.swap(false, Ordering::SeqCst);

        let Some(access_token) = self.storage.access_token() else {
            self.set_state(SessionState::Anonymous);
            return Ok(());
        };

        if !force {
            if let SessionState::Authenticated(_) = self.state() {
                debug!("Session already validated, skipping bootstrap");
                return Ok(());
            }
        }

        // Phase 1: optimistic paint while validation runs.
        if !matches!(self.state(), SessionState::Authenticated(_)) {
            let optimistic = self.storage.cached_profile();
            self.set_state(SessionState::Bootstrapping { optimistic });
        }

        if token::is_expired(&access_token) {
            if self.storage.refresh_token().is_none() {
                // Expired access token with nothing to exchange: dead session
                debug!("Expired access token without refresh token");
                if let Err(e) = self.storage.clear_all() {
                    warn!(error = %e, "Failed to clear session storage");
                }
                self.set_state(SessionState::Anonymous);
                return Ok(());
            }
            if !self.throttle_elapsed() {
                debug!("Refresh attempted recently, throttling bootstrap refresh");
                self.settle_with_optimistic(None);
                return Ok(());
            }
            if let Err(error) = self.api.refresh_session().await {
                if error.is_auth_invalid() && !error.is_retryable() {
                    info!("Stored session rejected during bootstrap refresh");
                    self.teardown_expired();
                    return Err(error);
                }
                warn!(error = %error, "Bootstrap refresh failed transiently, keeping cached session");
                self.settle_with_optimistic(Some(error.to_string()));
                return Err(error);
            }
        }

        // Phase 2: authoritative profile fetch.
        match self.api.current_user().await {
            Ok(profile) => {
                if let Err(e) = self.storage.store_profile(&profile) {
                    warn!(error = %e, "Failed to cache profile");
                }
                debug!(user = %profile.username, "Session validated");
                self.set_authenticated(profile);
                Ok(())
            }
            Err(ApiError::NotFound) => {
                // Authenticated token for a user that no longer exists
                self.teardown_expired();
                Err(ApiError::NotFound)
            }
            Err(error) if error.is_auth_invalid() && !error.is_retryable() => {
                info!("Stored session rejected during profile fetch");
                self.teardown_expired();
                Err(error)
            }
            Err(error) => {
                warn!(error = %error, "Profile fetch failed transiently, keeping cached session");
                self.settle_with_optimistic(Some(error.to_string()));
                Err(error)
            }
        }
    }

    // ===== Login / logout =====

    /// Authenticate, persist the session, and navigate to the landing page
    /// for the user's role (or back to `return_to` when a guard redirected
    /// here).
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        return_to: Option<&str>,
    ) -> Result<(), ApiError> {
        self.clear_error();
        let (pair, profile) = match self.api.login(email, password).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.set_error(error.to_string());
                return Err(error);
            }
        };

        // Storage failures degrade to an in-memory session rather than
        // failing a login the server accepted
        if let Err(e) = self.storage.store_credentials(&pair) {
            warn!(error = %e, "Failed to persist credentials");
        }
        if let Err(e) = self.storage.store_profile(&profile) {
            warn!(error = %e, "Failed to cache profile");
        }

        info!(user = %profile.username, "Logged in");
        let is_seller = profile.role.is_seller();
        // State is committed before the navigation event so route guards
        // observe the authenticated user on arrival
        self.set_authenticated(profile);

        let destination = match return_to {
            Some(path) => Navigation::Path(path.to_string()),
            None if is_seller => Navigation::SellerDashboard,
            None => Navigation::Dashboard,
        };
        self.navigator.navigate(destination);
        Ok(())
    }

    /// Drop the session unconditionally. Never fails from the caller's
    /// point of view: storage errors are logged and the in-memory session
    /// is cleared regardless.
    pub fn logout(&self) {
        if let Err(e) = self.storage.clear_all() {
            warn!(error = %e, "Failed to clear session storage on logout");
        }
        {
            let mut inner = self.inner.lock().unwrap();
            inner.state = SessionState::Anonymous;
            inner.error = None;
        }
        info!("Logged out");
        self.navigator.navigate(Navigation::Home);
    }

    // ===== Registration and recovery flows =====

    /// Begin registration: the backend emails a verification code and the
    /// user is sent to the verify-email screen.
    pub async fn register(&self, data: &RegisterData) -> Result<(), ApiError> {
        self.clear_error();
        match self.api.request_signup_code(data).await {
            Ok(_) => {
                self.navigator.navigate(Navigation::VerifyEmail {
                    email: data.email.clone(),
                    message: Some(REGISTRATION_SUCCESS_MESSAGE.to_string()),
                });
                Ok(())
            }
            Err(error) => {
                self.set_error(error.to_string());
                Err(error)
            }
        }
    }

    /// Complete registration with the emailed code, then hand off to login.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), ApiError> {
        self.clear_error();
        match self.api.confirm_signup_code(email, code).await {
            Ok(_) => {
                self.navigator.navigate(Navigation::Login {
                    redirect_to: None,
                    message: Some(EMAIL_VERIFIED_MESSAGE.to_string()),
                });
                Ok(())
            }
            Err(error) => {
                self.set_error(error.to_string());
                Err(error)
            }
        }
    }

    /// Ask the backend to email a password reset link. Returns whether the
    /// request was accepted; the failure reason lands in the session error.
    pub async fn request_password_reset(&self, email: &str) -> bool {
        self.clear_error();
        match self.api.request_password_reset(email).await {
            Ok(_) => true,
            Err(error) => {
                self.set_error(error.to_string());
                false
            }
        }
    }

    pub async fn reset_password(
        &self,
        email: &str,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        self.clear_error();
        match self.api.reset_password(email, reset_token, new_password).await {
            Ok(_) => {
                self.navigator.navigate(Navigation::Login {
                    redirect_to: None,
                    message: Some(PASSWORD_RESET_MESSAGE.to_string()),
                });
                Ok(())
            }
            Err(error) => {
                self.set_error(error.to_string());
                Err(error)
            }
        }
    }

    /// Replace the in-memory and cached profile after a successful profile
    /// mutation elsewhere, keeping snapshots consistent without a refetch.
    pub fn apply_profile(&self, profile: UserProfile) {
        if let Err(e) = self.storage.store_profile(&profile) {
            warn!(error = %e, "Failed to cache profile");
        }
        let mut inner = self.inner.lock().unwrap();
        if matches!(inner.state, SessionState::Authenticated(_)) {
            inner.state = SessionState::Authenticated(profile);
        }
    }
}
