//! Data models for GigMarket entities.
//!
//! This module contains all the data structures exchanged with the
//! marketplace backend:
//!
//! - `UserProfile`, `Role`: the authenticated identity
//! - `Service`, `ServiceImage`: seller listings
//! - `Booking`, `PaymentRequest`: the booking and payment lifecycle
//! - `Review`: ratings left by buyers
//! - `Notification`, `SellerStats`: dashboard data

pub mod booking;
pub mod notification;
pub mod payment;
pub mod review;
pub mod service;
pub mod user;

pub use booking::{Booking, NewBooking};
pub use notification::Notification;
pub use payment::{PaymentOutcome, PaymentRequest};
pub use review::{NewReview, Review, ReviewUpdate};
pub use service::{
    NewService, Service, ServiceFilters, ServiceImage, ServicePatch, ServiceUpdate,
};
pub use user::{ProfileUpdate, RegisterData, Role, SellerStats, UserProfile};
