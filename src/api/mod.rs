//! REST API client module for the GigMarket backend.
//!
//! All backend traffic flows through [`ApiClient`], which attaches the
//! bearer credential to every request and recovers transparently from
//! access-token expiry. Failures are normalized into [`ApiError`].

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
