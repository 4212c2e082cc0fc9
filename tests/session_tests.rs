//! Session lifecycle: login, bootstrap, throttling, and teardown.

mod common;

use std::sync::atomic::Ordering;

use gigmarket_core::models::UserProfile;
use gigmarket_core::{ApiError, Navigation, SessionState};

use common::{RefreshBehavior, TestHarness, TEST_EMAIL, TEST_PASSWORD};

fn cached_profile(username: &str) -> UserProfile {
    serde_json::from_value(serde_json::json!({
        "id": 7,
        "username": username,
        "email": TEST_EMAIL,
        "role": "user",
    }))
    .unwrap()
}

#[tokio::test]
async fn login_persists_session_and_navigates_to_dashboard() {
    let h = TestHarness::new().await;

    h.store
        .login(TEST_EMAIL, TEST_PASSWORD, None)
        .await
        .expect("login");

    let stored = h.storage.credentials().expect("credentials persisted");
    assert_eq!(stored.access_token, *h.backend.valid_access.lock().unwrap());
    assert_eq!(
        h.storage.cached_profile().map(|p| p.username),
        Some("ana".to_string())
    );

    let snap = h.store.snapshot();
    assert!(!snap.is_loading);
    assert_eq!(snap.user.map(|u| u.username), Some("ana".to_string()));
    assert_eq!(h.navigator.last(), Some(Navigation::Dashboard));
}

#[tokio::test]
async fn seller_login_lands_on_seller_dashboard() {
    let h = TestHarness::new().await;
    *h.backend.role.lock().unwrap() = "seller".to_string();

    h.store
        .login(TEST_EMAIL, TEST_PASSWORD, None)
        .await
        .expect("login");

    assert_eq!(h.navigator.last(), Some(Navigation::SellerDashboard));
}

#[tokio::test]
async fn login_returns_to_guarded_origin() {
    let h = TestHarness::new().await;

    h.store
        .login(TEST_EMAIL, TEST_PASSWORD, Some("/bookings/42"))
        .await
        .expect("login");

    assert_eq!(
        h.navigator.last(),
        Some(Navigation::Path("/bookings/42".to_string()))
    );
}

#[tokio::test]
async fn failed_login_surfaces_server_message_and_stores_nothing() {
    let h = TestHarness::new().await;

    let error = h
        .store
        .login(TEST_EMAIL, "wrong", None)
        .await
        .expect_err("login should fail");

    assert_eq!(error.to_string(), "Invalid email or password");
    assert_eq!(
        h.store.snapshot().error.as_deref(),
        Some("Invalid email or password")
    );
    assert!(h.storage.credentials().is_none());
    assert!(h.navigator.events().is_empty());
}

#[tokio::test]
async fn bootstrap_after_login_makes_no_network_calls() {
    let h = TestHarness::new().await;
    h.store
        .login(TEST_EMAIL, TEST_PASSWORD, None)
        .await
        .expect("login");

    h.store.bootstrap().await.expect("bootstrap");

    assert_eq!(h.backend.me_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bootstrap_validates_stored_session() {
    let h = TestHarness::new().await;
    h.seed_valid_session();

    h.store.bootstrap().await.expect("bootstrap");

    assert!(matches!(h.store.state(), SessionState::Authenticated(_)));
    assert_eq!(h.backend.me_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 0);
    // Authoritative profile now cached
    assert_eq!(
        h.storage.cached_profile().map(|p| p.username),
        Some("ana".to_string())
    );
}

#[tokio::test]
async fn bootstrap_replaces_optimistic_profile_with_authoritative_one() {
    let h = TestHarness::new().await;
    h.seed_valid_session();
    h.storage.store_profile(&cached_profile("old-name")).unwrap();

    h.store.bootstrap().await.expect("bootstrap");

    match h.store.state() {
        SessionState::Authenticated(profile) => assert_eq!(profile.username, "ana"),
        other => panic!("expected authenticated state, got {other:?}"),
    }
    assert_eq!(
        h.storage.cached_profile().map(|p| p.username),
        Some("ana".to_string())
    );
}

#[tokio::test]
async fn bootstrap_refreshes_expired_token_then_validates() {
    let h = TestHarness::new().await;
    h.seed_expired_session();

    h.store.bootstrap().await.expect("bootstrap");

    assert!(matches!(h.store.state(), SessionState::Authenticated(_)));
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.me_calls.load(Ordering::SeqCst), 1);
    let stored = h.storage.credentials().expect("rotated pair persisted");
    assert_eq!(stored.access_token, *h.backend.valid_access.lock().unwrap());
}

#[tokio::test]
async fn bootstrap_refresh_is_throttled_after_recent_attempt() {
    let h = TestHarness::new().await;
    h.seed_expired_session();
    h.storage.store_profile(&cached_profile("ana")).unwrap();
    // A refresh attempt just happened (e.g. by another surface)
    h.storage.record_refresh_attempt().unwrap();

    h.store.bootstrap().await.expect("bootstrap");

    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 0);
    // The cached profile stays painted rather than bouncing to anonymous
    assert!(matches!(h.store.state(), SessionState::Authenticated(_)));
}

#[tokio::test]
async fn rejected_bootstrap_refresh_tears_down_session() {
    let h = TestHarness::new().await;
    h.seed_expired_session();
    h.storage.store_profile(&cached_profile("ana")).unwrap();
    *h.backend.refresh_behavior.lock().unwrap() = RefreshBehavior::Fail {
        status: 401,
        message: "Refresh token expired".to_string(),
    };

    let error = h.store.bootstrap().await.expect_err("bootstrap should fail");
    assert!(error.is_auth_invalid());

    assert_eq!(h.store.state(), SessionState::Anonymous);
    assert!(h.storage.access_token().is_none());
    assert!(h.storage.refresh_token().is_none());
    assert!(h.storage.cached_profile().is_none());
    assert!(h.storage.last_refresh_attempt().is_none());
    assert_eq!(
        h.navigator.last(),
        Some(Navigation::Login {
            redirect_to: None,
            message: Some("Your session has expired. Please log in again.".to_string()),
        })
    );
}

#[tokio::test]
async fn transient_bootstrap_failure_keeps_cached_session() {
    let h = TestHarness::new().await;
    h.seed_expired_session();
    h.storage.store_profile(&cached_profile("ana")).unwrap();
    *h.backend.refresh_behavior.lock().unwrap() = RefreshBehavior::Fail {
        status: 500,
        message: "upstream timeout".to_string(),
    };

    let error = h.store.bootstrap().await.expect_err("bootstrap should fail");
    assert!(!error.is_auth_invalid());

    // Cached session survives: credentials intact, optimistic profile kept
    assert!(h.storage.credentials().is_some());
    match h.store.state() {
        SessionState::Authenticated(profile) => assert_eq!(profile.username, "ana"),
        other => panic!("expected cached session to survive, got {other:?}"),
    }
    assert!(h.store.snapshot().error.is_some());
    assert!(h.navigator.events().is_empty());
}

#[tokio::test]
async fn bootstrap_without_credentials_is_anonymous() {
    let h = TestHarness::new().await;

    h.store.bootstrap().await.expect("bootstrap");

    assert_eq!(h.store.state(), SessionState::Anonymous);
    assert_eq!(h.backend.me_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn force_refresh_revalidates_an_authenticated_session() {
    let h = TestHarness::new().await;
    h.store
        .login(TEST_EMAIL, TEST_PASSWORD, None)
        .await
        .expect("login");

    h.store.force_refresh();
    h.store.bootstrap().await.expect("bootstrap");

    assert_eq!(h.backend.me_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logout_clears_every_stored_key() {
    let h = TestHarness::new().await;
    h.store
        .login(TEST_EMAIL, TEST_PASSWORD, None)
        .await
        .expect("login");

    h.store.logout();

    assert!(h.storage.access_token().is_none());
    assert!(h.storage.refresh_token().is_none());
    assert!(h.storage.cached_profile().is_none());
    assert!(h.storage.last_refresh_attempt().is_none());
    assert_eq!(h.store.state(), SessionState::Anonymous);
    assert_eq!(h.navigator.last(), Some(Navigation::Home));
}

#[tokio::test]
async fn deleted_user_is_torn_down_on_bootstrap() {
    let h = TestHarness::new().await;
    h.seed_valid_session();
    // The backend no longer knows this user
    *h.backend.valid_access.lock().unwrap() = String::new();
    *h.backend.refresh_behavior.lock().unwrap() = RefreshBehavior::Fail {
        status: 401,
        message: "Refresh token invalid".to_string(),
    };

    let error = h.store.bootstrap().await.expect_err("bootstrap should fail");
    assert!(matches!(error, ApiError::RefreshFailed(_) | ApiError::Unauthorized));
    assert_eq!(h.store.state(), SessionState::Anonymous);
}
