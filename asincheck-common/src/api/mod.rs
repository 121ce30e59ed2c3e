//! Backend API types shared across asincheck crates
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Wire types mirroring the gateway's JSON payloads
//! - Pure functions over those types (status classification, field fallbacks,
//!   usage percentage math)
//!
//! No HTTP client dependencies - the reqwest gateway lives in `asincheck-cli`.

pub mod status;
pub mod types;

pub use status::{
    DetailedStatus, FieldAccessor, StatusClass, StatusDisplay, BRAND_SOURCES,
    PLACEHOLDER_IMAGE_URL, TITLE_SOURCES,
};
pub use types::{
    BillingInfo, BillingInfoResponse, CheckDetails, CheckRequest, CheckResponse, CheckResult,
    LoginRequest, LoginResponse, PendingChange, Plan, RefreshRequest, RefreshResponse,
    SubscriptionData, SubscriptionDataResponse, Usage, UsageReport, UserProfile,
};
