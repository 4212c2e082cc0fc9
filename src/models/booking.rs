//! Booking lifecycle models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A booking as returned by the `/booking` endpoints.
///
/// The detail fields (`service_name`, `buyer_username`, `price`) are only
/// populated by the seller-side listing with `includeDetails=true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub booking_date: DateTime<Utc>,
    pub status: String,
    pub service_id: i64,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

/// Payload for `POST /booking`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub service_id: i64,
    pub booking_date: DateTime<Utc>,
}
