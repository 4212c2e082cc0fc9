//! Payment initiation models.
//!
//! Payment processing itself is delegated to an external provider; the
//! backend only needs a payment method reference and an optional return URL
//! for redirect-based methods.

use serde::{Deserialize, Serialize};

/// Payload for `POST /payment/booking/{id}`. The amount is derived by the
/// backend from the booking.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_method_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    /// Set to true to only accept direct card payments (no provider
    /// redirect).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_redirect_payments: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub message: String,
    /// Present when the payment method requires a provider-side redirect.
    #[serde(default)]
    pub redirect_url: Option<String>,
}
