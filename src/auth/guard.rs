//! Route guard evaluation.
//!
//! Pure decision logic over a [`SessionSnapshot`]: given the current
//! session and a route's role requirements, decide whether to render,
//! wait, or redirect. The caller turns the decision into an actual
//! navigation; nothing here performs I/O.

use crate::models::Role;

use super::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// The session is still bootstrapping; render a placeholder, not a
    /// redirect. Redirecting during bootstrap would bounce users with a
    /// perfectly valid stored session to the login screen.
    Loading,
    /// Render the protected content.
    Allow,
    /// Not logged in. `from` is the path to return to after login.
    RedirectToLogin { from: String },
    /// Logged in but lacking a required role.
    RedirectToUnauthorized,
}

/// Evaluate a guard for a route requiring any of `required_roles` (an
/// empty slice means any authenticated user).
pub fn evaluate(
    snapshot: &SessionSnapshot,
    required_roles: &[Role],
    current_path: &str,
) -> GuardDecision {
    if snapshot.is_loading {
        return GuardDecision::Loading;
    }
    let Some(user) = &snapshot.user else {
        return GuardDecision::RedirectToLogin {
            from: current_path.to_string(),
        };
    };
    if required_roles.is_empty() || required_roles.iter().any(|role| *role == user.role) {
        GuardDecision::Allow
    } else {
        GuardDecision::RedirectToUnauthorized
    }
}
