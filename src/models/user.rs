//! User identity and profile models.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A user's role in the marketplace.
///
/// The backend stores roles as free-form strings with inconsistent casing
/// ("seller", "Seller", "SELLER" all occur in the wild), so the role is
/// normalized to lowercase on ingress and every comparison goes through the
/// normalized form.
#[derive(Debug, Clone, Eq)]
pub enum Role {
    Seller,
    User,
    Other(String),
}

impl Role {
    /// Normalizing constructor: trims and lowercases the raw value.
    pub fn new(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "seller" => Role::Seller,
            "user" => Role::User,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Seller => "seller",
            Role::User => "user",
            Role::Other(s) => s.as_str(),
        }
    }

    pub fn is_seller(&self) -> bool {
        matches!(self, Role::Seller)
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        // `Other` values built directly by callers may not be normalized
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().to_lowercase().hash(state);
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::new(&raw))
    }
}

/// The authenticated user's profile as served by `GET /user/me`.
///
/// The backend has shipped the phone and avatar fields under more than one
/// name; the aliases keep older responses parseable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(default, alias = "phoneNumber", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(
        default,
        alias = "profilePictureUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for the signup-code handshake (`POST /auth/request-signup-code`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Partial profile update for `PATCH /user/update`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Aggregate numbers shown on the seller dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerStats {
    #[serde(default)]
    pub total_services: u32,
    #[serde(default)]
    pub total_bookings: u32,
    #[serde(default)]
    pub total_earnings: f64,
    #[serde(default)]
    pub completed_bookings: u32,
}
