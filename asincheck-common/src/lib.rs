//! # asincheck Common Library
//!
//! Shared code for the asincheck client crates including:
//! - Backend wire types (check results, subscription snapshot, billing info)
//! - Status classification and display field fallback chains
//! - Event types (AsincheckEvent enum) and the EventBus
//! - Configuration loading
//! - Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
