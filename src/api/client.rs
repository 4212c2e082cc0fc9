//! API client for communicating with the GigMarket REST API.
//!
//! This module provides the `ApiClient` struct, the single gateway for all
//! backend traffic. Two cross-cutting behaviors live here:
//!
//! - every outgoing request carries `Authorization: Bearer <access token>`
//!   from durable storage when a token is present;
//! - a 401 response triggers a single-flight token refresh: the first
//!   request to observe the expiry performs the refresh, every concurrent
//!   request queues behind it, and all of them replay (or fail) together.
//!
//! Without the single-flight guard, N concurrent requests observing an
//! expired token would race N refresh calls against a rotating refresh
//! token, invalidating each other. The coordinator guarantees exactly one
//! refresh call per expiry event and that no queued request is dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::auth::storage::{CredentialPair, SessionStorage};
use crate::auth::token;
use crate::models::{
    Booking, NewBooking, NewReview, NewService, Notification, PaymentOutcome, PaymentRequest,
    ProfileUpdate, RegisterData, Review, ReviewUpdate, SellerStats, Service, ServiceFilters,
    ServicePatch, ServiceUpdate, UserProfile,
};
use crate::navigation::{Navigation, Navigator};

use super::error::extract_message;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    #[serde(rename = "avatarUrl")]
    avatar_url: String,
}

#[derive(Debug, Deserialize)]
struct ImageUploadResponse {
    #[serde(rename = "imageUrl")]
    image_url: String,
}

/// `{ "message": ... }` acknowledgement returned by most mutations.
#[derive(Debug, Deserialize)]
struct Ack {
    message: String,
}

// ============================================================================
// Refresh coordination
// ============================================================================

/// Outcome shared with queued requests: the new access token, or the
/// refresh error's message.
type SharedOutcome = Result<String, String>;

/// The pending-request queue. Exists only while a refresh is in flight;
/// drained (settled en masse, FIFO) the moment the refresh completes.
#[derive(Default)]
struct RefreshQueue {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<SharedOutcome>>,
}

enum RefreshTicket {
    /// This caller performs the refresh.
    Leader,
    /// This caller waits for the leader's outcome.
    Waiter(oneshot::Receiver<SharedOutcome>),
}

// ============================================================================
// Client
// ============================================================================

/// API client for the GigMarket backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the refresh coordinator is shared across clones.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    storage: Arc<SessionStorage>,
    navigator: Arc<dyn Navigator>,
    refresh_queue: Arc<Mutex<RefreshQueue>>,
}

impl ApiClient {
    /// Create a new API client. One instance (plus cheap clones) should
    /// live for the whole application so the refresh coordinator state is
    /// shared by every caller.
    pub fn new(
        base_url: impl Into<String>,
        storage: Arc<SessionStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            storage,
            navigator,
            refresh_queue: Arc::new(Mutex::new(RefreshQueue::default())),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(
        builder: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
        serde_json::from_str(text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response body: {e}"))
        })
    }

    // ===== Request dispatch =====

    /// Issue an authenticated request, recovering from credential expiry.
    ///
    /// `build` constructs the request from scratch so a queued request can
    /// be replayed after a refresh (multipart bodies cannot be cloned once
    /// built).
    async fn dispatch<T, F>(&self, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> reqwest::RequestBuilder,
    {
        let access_token = self.storage.access_token();
        let response = Self::bearer(build(&self.client), access_token.as_deref())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let text = response.text().await?;
            return Self::parse_json(&text);
        }

        if status == StatusCode::UNAUTHORIZED {
            let new_token = self.recover_from_unauthorized(access_token).await?;
            let replay = Self::bearer(build(&self.client), Some(new_token.as_str()))
                .send()
                .await?;
            let replay_status = replay.status();
            let text = replay.text().await.unwrap_or_default();
            if replay_status.is_success() {
                return Self::parse_json(&text);
            }
            if replay_status == StatusCode::UNAUTHORIZED {
                // A fresh token was rejected too: no second refresh round
                return Err(ApiError::Unauthorized);
            }
            return Err(self.classify_failure(replay_status, &text));
        }

        let text = response.text().await.unwrap_or_default();
        Err(self.classify_failure(status, &text))
    }

    /// Map a failed response to an error, emitting the unauthorized
    /// navigation event for 403s. Stored credentials are left untouched:
    /// the user is authenticated, just not permitted.
    fn classify_failure(&self, status: StatusCode, body: &str) -> ApiError {
        let error = ApiError::from_status(status, body);
        if matches!(error, ApiError::Forbidden(_)) {
            self.navigator.navigate(Navigation::Unauthorized);
        }
        error
    }

    /// Issue an unauthenticated request to one of the auth endpoints.
    ///
    /// These never enter the refresh flow: a 401 here means the submitted
    /// credentials are wrong, and the server's own message is what the
    /// user needs to see.
    async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Self::parse_json(&text);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Server(extract_message(&text)));
        }
        Err(ApiError::from_status(status, &text))
    }

    // ===== Verb helpers =====

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        self.dispatch(|client| client.get(&url)).await
    }

    async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        self.dispatch(|client| client.get(&url).query(query)).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        self.dispatch(|client| client.post(&url).json(body)).await
    }

    async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        self.dispatch(|client| client.put(&url).json(body)).await
    }

    async fn patch_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        self.dispatch(|client| client.patch(&url).json(body)).await
    }

    async fn patch_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        self.dispatch(|client| client.patch(&url)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        self.dispatch(|client| client.delete(&url)).await
    }

    // ===== Refresh coordination =====

    /// Recover from a 401 on an authenticated request. Returns the access
    /// token to replay with.
    async fn recover_from_unauthorized(
        &self,
        failed_token: Option<String>,
    ) -> Result<String, ApiError> {
        // The token may already have been rotated by a refresh that
        // completed while this request was in flight.
        if let Some(current) = self.storage.access_token() {
            if Some(current.as_str()) != failed_token.as_deref() {
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.storage.refresh_token() else {
            // Nothing to recover with: drop whatever partial state remains
            // and send the user to login.
            if let Err(e) = self.storage.clear_credentials() {
                warn!(error = %e, "Failed to clear credentials");
            }
            if let Err(e) = self.storage.clear_profile() {
                warn!(error = %e, "Failed to clear cached profile");
            }
            self.navigator.navigate(Navigation::Login {
                redirect_to: None,
                message: None,
            });
            return Err(ApiError::Unauthorized);
        };

        match self.enlist() {
            RefreshTicket::Waiter(receiver) => match receiver.await {
                Ok(Ok(new_token)) => Ok(new_token),
                Ok(Err(message)) => Err(ApiError::RefreshFailed(message)),
                // Leader dropped without settling (shouldn't happen)
                Err(_) => Err(ApiError::Unauthorized),
            },
            RefreshTicket::Leader => match self.drive_refresh(refresh_token).await {
                Ok(pair) => Ok(pair.access_token),
                Err(error) => Err(ApiError::RefreshFailed(error.to_string())),
            },
        }
    }

    /// Run the refresh to completion on a detached task and await its
    /// outcome.
    ///
    /// The leader's own future can be dropped mid-flight (the caller wraps
    /// the request in a timeout, or its task is aborted). If the refresh
    /// ran inline, that drop would leave `refreshing` set with the queued
    /// waiters never settled, and every later 401 would hang behind a
    /// flight that no longer exists. Detaching the work guarantees
    /// `settle` runs no matter what happens to the caller.
    async fn drive_refresh(&self, refresh_token: String) -> Result<CredentialPair, ApiError> {
        let client = self.clone();
        let task = tokio::spawn(async move {
            let outcome = client.perform_refresh(&refresh_token).await;
            client.settle(&outcome);
            outcome
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                // The task died before settling; release anyone queued
                let failure = Err(ApiError::Storage(format!(
                    "Refresh task failed: {join_error}"
                )));
                self.settle(&failure);
                failure
            }
        }
    }

    /// Join the refresh flight: the first caller leads, the rest queue.
    fn enlist(&self) -> RefreshTicket {
        let mut queue = self.refresh_queue.lock().unwrap();
        if queue.refreshing {
            let (sender, receiver) = oneshot::channel();
            queue.waiters.push(sender);
            RefreshTicket::Waiter(receiver)
        } else {
            queue.refreshing = true;
            RefreshTicket::Leader
        }
    }

    /// Settle every queued waiter with the flight's outcome (in the order
    /// they queued) and clear the queue.
    fn settle(&self, outcome: &Result<CredentialPair, ApiError>) {
        let shared: SharedOutcome = match outcome {
            Ok(pair) => Ok(pair.access_token.clone()),
            Err(error) => Err(error.to_string()),
        };
        let mut queue = self.refresh_queue.lock().unwrap();
        queue.refreshing = false;
        for waiter in queue.waiters.drain(..) {
            // A waiter that gave up awaiting is fine to ignore
            let _ = waiter.send(shared.clone());
        }
    }

    /// Call the refresh endpoint and persist the rotated pair.
    ///
    /// An auth-invalid rejection (the refresh token itself is no good)
    /// clears the stored credentials and profile; transient failures leave
    /// storage untouched so a flaky network never logs the user out. No
    /// navigation happens here either way - the caller decides.
    async fn perform_refresh(&self, refresh_token: &str) -> Result<CredentialPair, ApiError> {
        if let Err(e) = self.storage.record_refresh_attempt() {
            warn!(error = %e, "Failed to record refresh attempt timestamp");
        }

        // The backend keys refresh tokens by email; take it from the cached
        // profile, falling back to the JWT's email claim.
        let email = self
            .storage
            .cached_profile()
            .map(|profile| profile.email)
            .or_else(|| {
                self.storage
                    .access_token()
                    .and_then(|t| token::decode_claims(&t))
                    .and_then(|claims| claims.email)
            })
            .unwrap_or_default();

        debug!("Access token rejected, attempting refresh");

        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&serde_json::json!({ "email": email, "token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let error = ApiError::from_status(status, &text);
            if error.is_auth_invalid() {
                warn!("Refresh rejected, clearing stored session");
                if let Err(e) = self.storage.clear_credentials() {
                    warn!(error = %e, "Failed to clear credentials");
                }
                if let Err(e) = self.storage.clear_profile() {
                    warn!(error = %e, "Failed to clear cached profile");
                }
            } else {
                warn!(status = %status, "Refresh failed transiently, keeping session");
            }
            return Err(error);
        }

        let parsed: RefreshResponse = Self::parse_json(&text)?;
        let pair = CredentialPair {
            access_token: parsed.token,
            refresh_token: parsed.refresh_token,
        };
        self.storage.store_credentials(&pair).map_err(|e| {
            ApiError::Storage(format!("Failed to persist refreshed credentials: {e}"))
        })?;
        debug!("Session refreshed");
        Ok(pair)
    }

    /// Refresh the session explicitly (used by the bootstrap flow when the
    /// stored access token has expired). Shares the single-flight
    /// coordinator with 401-triggered refreshes.
    pub async fn refresh_session(&self) -> Result<(), ApiError> {
        let Some(refresh_token) = self.storage.refresh_token() else {
            return Err(ApiError::Unauthorized);
        };
        match self.enlist() {
            RefreshTicket::Waiter(receiver) => match receiver.await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(message)) => Err(ApiError::RefreshFailed(message)),
                Err(_) => Err(ApiError::Unauthorized),
            },
            RefreshTicket::Leader => self.drive_refresh(refresh_token).await.map(|_| ()),
        }
    }

    // ===== Auth endpoints =====

    /// Authenticate and return the credential pair plus the user's profile.
    /// Persisting them is the session store's job.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(CredentialPair, UserProfile), ApiError> {
        let response: LoginResponse = self
            .post_public(
                "/auth/login",
                &serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        Ok((
            CredentialPair {
                access_token: response.token,
                refresh_token: response.refresh_token,
            },
            response.user,
        ))
    }

    pub async fn request_signup_code(&self, data: &RegisterData) -> Result<String, ApiError> {
        let ack: Ack = self.post_public("/auth/request-signup-code", data).await?;
        Ok(ack.message)
    }

    pub async fn confirm_signup_code(&self, email: &str, code: &str) -> Result<String, ApiError> {
        let ack: Ack = self
            .post_public(
                "/auth/confirm-signup-code",
                &serde_json::json!({ "email": email, "token": code }),
            )
            .await?;
        Ok(ack.message)
    }

    /// The reset-request endpoint takes the raw email as a JSON string
    /// body, not an object.
    pub async fn request_password_reset(&self, email: &str) -> Result<String, ApiError> {
        let ack: Ack = self
            .post_public("/auth/request-password-reset", email)
            .await?;
        Ok(ack.message)
    }

    pub async fn reset_password(
        &self,
        email: &str,
        reset_token: &str,
        new_password: &str,
    ) -> Result<String, ApiError> {
        let ack: Ack = self
            .post_public(
                "/auth/reset-password",
                &serde_json::json!({
                    "email": email,
                    "token": reset_token,
                    "newPassword": new_password,
                }),
            )
            .await?;
        Ok(ack.message)
    }

    // ===== User endpoints =====

    /// Fetch the authoritative profile for the authenticated user.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.get("/user/me").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        self.patch_json("/user/update", update).await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<String, ApiError> {
        let ack: Ack = self
            .post_json(
                "/user/change-password",
                &serde_json::json!({
                    "currentPassword": current_password,
                    "newPassword": new_password,
                }),
            )
            .await?;
        Ok(ack.message)
    }

    /// Upload a new avatar image. Returns the URL of the stored image.
    pub async fn upload_avatar(
        &self,
        image: Vec<u8>,
        filename: &str,
    ) -> Result<String, ApiError> {
        let url = self.url("/user/avatar");
        let filename = filename.to_string();
        let response: AvatarResponse = self
            .dispatch(|client| {
                let part = multipart::Part::bytes(image.clone()).file_name(filename.clone());
                let form = multipart::Form::new().part("avatar", part);
                client.post(&url).multipart(form)
            })
            .await?;
        Ok(response.avatar_url)
    }

    pub async fn delete_account(&self) -> Result<String, ApiError> {
        let ack: Ack = self.delete("/user/delete").await?;
        Ok(ack.message)
    }

    /// Reactivate a deactivated account with an emailed token. Public: a
    /// deactivated account has no session to authenticate with.
    pub async fn reactivate_by_token(&self, email: &str, reactivation_token: &str) -> Result<String, ApiError> {
        let ack: Ack = self
            .post_public(
                "/user/reactivate-by-token",
                &serde_json::json!({
                    "email": email.trim(),
                    "token": reactivation_token.trim(),
                }),
            )
            .await?;
        Ok(ack.message)
    }

    // ===== Service endpoints =====

    /// Browse the public catalog, optionally filtered.
    pub async fn services(&self, filters: &ServiceFilters) -> Result<Vec<Service>, ApiError> {
        self.get_query("/service", filters).await
    }

    /// Listings owned by the authenticated seller.
    pub async fn seller_services(&self) -> Result<Vec<Service>, ApiError> {
        self.get("/service/seller").await
    }

    pub async fn service(&self, id: i64) -> Result<Service, ApiError> {
        self.get(&format!("/service/{id}")).await
    }

    pub async fn create_service(&self, service: &NewService) -> Result<Service, ApiError> {
        self.post_json("/service", service).await
    }

    pub async fn update_service(
        &self,
        id: i64,
        update: &ServiceUpdate,
    ) -> Result<String, ApiError> {
        let ack: Ack = self.put_json(&format!("/service/{id}"), update).await?;
        Ok(ack.message)
    }

    pub async fn patch_service(&self, id: i64, patch: &ServicePatch) -> Result<String, ApiError> {
        let ack: Ack = self.patch_json(&format!("/service/{id}"), patch).await?;
        Ok(ack.message)
    }

    pub async fn delete_service(&self, id: i64) -> Result<String, ApiError> {
        let ack: Ack = self.delete(&format!("/service/{id}")).await?;
        Ok(ack.message)
    }

    /// Upload a listing image. Field names match the backend DTO exactly
    /// ("Image", "ServiceId").
    pub async fn upload_service_image(
        &self,
        service_id: i64,
        image: Vec<u8>,
        filename: &str,
    ) -> Result<String, ApiError> {
        let url = self.url("/service/images/upload");
        let filename = filename.to_string();
        let response: ImageUploadResponse = self
            .dispatch(|client| {
                let part = multipart::Part::bytes(image.clone()).file_name(filename.clone());
                let form = multipart::Form::new()
                    .part("Image", part)
                    .text("ServiceId", service_id.to_string());
                client.post(&url).multipart(form)
            })
            .await?;
        Ok(response.image_url)
    }

    pub async fn delete_service_image(
        &self,
        service_id: i64,
        image_id: i64,
    ) -> Result<String, ApiError> {
        let ack: Ack = self
            .delete(&format!("/service/{service_id}/images/{image_id}"))
            .await?;
        Ok(ack.message)
    }

    // ===== Booking endpoints =====

    pub async fn create_booking(&self, booking: &NewBooking) -> Result<Booking, ApiError> {
        self.post_json("/booking", booking).await
    }

    /// Bookings made by the authenticated buyer.
    pub async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        self.get("/booking/my").await
    }

    /// Bookings received by the authenticated seller, with service and
    /// buyer details included.
    pub async fn seller_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        let url = self.url("/booking/seller");
        self.dispatch(|client| client.get(&url).query(&[("includeDetails", "true")]))
            .await
    }

    pub async fn update_booking_date(
        &self,
        id: i64,
        new_date: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        // The endpoint takes the date as a bare JSON string body
        let ack: Ack = self
            .put_json(&format!("/booking/{id}/date"), &new_date)
            .await?;
        Ok(ack.message)
    }

    pub async fn cancel_booking(&self, id: i64) -> Result<String, ApiError> {
        let ack: Ack = self.patch_empty(&format!("/booking/{id}/cancel")).await?;
        Ok(ack.message)
    }

    // ===== Payment endpoints =====

    /// Initiate payment for a booking. The amount is derived server-side;
    /// a redirect URL is returned for provider-redirect payment methods.
    pub async fn pay_booking(
        &self,
        booking_id: i64,
        payment: &PaymentRequest,
    ) -> Result<PaymentOutcome, ApiError> {
        self.post_json(&format!("/payment/booking/{booking_id}"), payment)
            .await
    }

    // ===== Review endpoints =====

    pub async fn create_review(&self, review: &NewReview) -> Result<Review, ApiError> {
        self.post_json("/review", review).await
    }

    pub async fn update_review(
        &self,
        id: i64,
        update: &ReviewUpdate,
    ) -> Result<String, ApiError> {
        let ack: Ack = self.put_json(&format!("/review/{id}"), update).await?;
        Ok(ack.message)
    }

    pub async fn delete_review(&self, id: i64) -> Result<String, ApiError> {
        let ack: Ack = self.delete(&format!("/review/{id}")).await?;
        Ok(ack.message)
    }

    pub async fn service_reviews(&self, service_id: i64) -> Result<Vec<Review>, ApiError> {
        self.get(&format!("/review/service/{service_id}")).await
    }

    /// Reviews written by the authenticated user.
    pub async fn my_reviews(&self) -> Result<Vec<Review>, ApiError> {
        self.get("/review/user").await
    }

    // ===== Notification endpoints =====

    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get("/notification").await
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<String, ApiError> {
        let ack: Ack = self.patch_empty(&format!("/notification/{id}/read")).await?;
        Ok(ack.message)
    }

    // ===== Seller dashboard =====

    pub async fn seller_stats(&self) -> Result<SellerStats, ApiError> {
        self.get("/seller/stats").await
    }
}
