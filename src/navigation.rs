//! Navigation intents emitted by the session and API layers.
//!
//! The core never manipulates routes itself. Redirects (to login on session
//! expiry, to the unauthorized page on 403, to a dashboard after login) are
//! emitted as [`Navigation`] events through the [`Navigator`] trait; the UI
//! shell decides how to realize them.

/// A navigation target within the application shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The public landing page.
    Home,
    /// The generic (buyer) dashboard.
    Dashboard,
    /// The seller dashboard.
    SellerDashboard,
    /// The login entry point. `redirect_to` preserves the path the user was
    /// trying to reach; `message` is a human-readable explanation (e.g.
    /// "Your session has expired").
    Login {
        redirect_to: Option<String>,
        message: Option<String>,
    },
    /// The "verify your email" step of the signup handshake.
    VerifyEmail {
        email: String,
        message: Option<String>,
    },
    /// The "authenticated but not permitted" page (distinct from login).
    Unauthorized,
    /// An arbitrary caller-supplied path, used for return-to-after-login.
    Path(String),
}

/// Sink for navigation events.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: Navigation);
}

/// Navigator that drops every event. Useful for headless use and tests that
/// don't assert on navigation.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _target: Navigation) {}
}
