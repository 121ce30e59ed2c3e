//! Test Helper Utilities
//!
//! Local axum backend standing in for the ASIN gateway.

pub mod mock_backend;

pub use mock_backend::{
    spawn_mock_backend, OUTAGE_REFRESH_TOKEN, PASSWORD, SELLER_EMAIL, UNVERIFIED_EMAIL,
};
