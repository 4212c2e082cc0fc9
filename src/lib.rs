//! Core library for the GigMarket client.
//!
//! GigMarket is a services marketplace connecting sellers offering services
//! with buyers booking them. This crate is the client core that every UI
//! shell (desktop, mobile, web view) builds on:
//!
//! - [`api::ApiClient`]: the single HTTP gateway to the backend, with bearer
//!   credential attachment and transparent single-flight token refresh
//! - [`auth::SessionStore`]: the authentication lifecycle (bootstrap, login,
//!   signup handshake, password reset, logout)
//! - [`auth::SessionStorage`]: durable storage for the credential pair and
//!   the cached profile snapshot
//! - [`models`]: data models for users, services, bookings, payments,
//!   reviews, and notifications
//!
//! The crate performs no rendering and installs no tracing subscriber; it
//! emits navigation intents through the [`navigation::Navigator`] trait and
//! leaves realization to the embedding shell.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, ApiError};
pub use auth::{
    CredentialPair, GuardDecision, SessionSnapshot, SessionState, SessionStorage, SessionStore,
};
pub use config::Config;
pub use navigation::{Navigation, Navigator, NoopNavigator};
