//! Gateway request/response types
//!
//! All payloads are camelCase JSON. Optional backend fields default to `None`
//! so older or partial responses still decode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ========================================
// ASIN Check
// ========================================

/// Body of `POST /asin/check`
///
/// The batch processor always sends exactly one ASIN per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub asins: Vec<String>,
}

impl CheckRequest {
    pub fn single(asin: &str) -> Self {
        Self {
            asins: vec![asin.to_string()],
        }
    }
}

/// Nested product details returned by the catalog lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// Eligibility result for one ASIN
///
/// Display fields are resolved through the accessor chains in
/// [`crate::api::status`]; read them via `display_title()` / `display_brand()`
/// rather than the raw fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// ASIN as submitted
    pub asin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CheckDetails>,
    /// `Eligible`, `APPROVAL REQUIRED`, `Restricted`, `Ineligible` or absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_status: Option<String>,
    /// Legacy eligibility flag, consulted when `detailed_status` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sellable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Usage counters piggybacked on check responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub current: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Response of `POST /asin/check`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ========================================
// Subscription / Usage
// ========================================

/// Subscription plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub code: String,
    pub name: String,
    /// `-1` for unlimited plans
    #[serde(default)]
    pub monthly_limit: i64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Monthly usage counters
///
/// `limit == -1` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub current: i64,
    pub limit: i64,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_date: Option<String>,
}

impl Usage {
    /// Sentinel limit value for unlimited plans
    pub const UNLIMITED: i64 = -1;

    /// `round(current / limit * 100)`, or 0 for zero and unlimited limits
    pub fn compute_percentage(current: i64, limit: i64) -> f64 {
        if limit <= 0 {
            return 0.0;
        }
        (current as f64 / limit as f64 * 100.0).round()
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == Self::UNLIMITED
    }

    /// Overwrite `current` and keep `percentage` consistent with it
    pub fn set_current(&mut self, current: i64) {
        self.current = current;
        self.percentage = Self::compute_percentage(current, self.limit);
    }
}

/// Per-status count within the monthly statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub count: u64,
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthStatistics {
    /// Keyed by status name (e.g. `eligible`, `restricted`)
    #[serde(default)]
    pub breakdown: BTreeMap<String, BreakdownEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default)]
    pub this_month: MonthStatistics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Unified plan + usage + statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionData {
    pub plan: Plan,
    pub usage: Usage,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub subscription: SubscriptionStatus,
}

/// Response of `GET /user/subscription-data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDataResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<SubscriptionData>,
    #[serde(default)]
    pub message: Option<String>,
}

// ========================================
// Billing
// ========================================

/// Scheduled plan change (downgrade/upgrade at period end)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub target_plan: String,
    #[serde(default)]
    pub effective_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInfo {
    #[serde(default)]
    pub current_plan: Option<String>,
    #[serde(default)]
    pub subscription_end_date: Option<String>,
    #[serde(default)]
    pub remaining_days: Option<i64>,
    #[serde(default)]
    pub pending_change: Option<PendingChange>,
}

/// Response of `GET /subscription/billing-info`
///
/// Billing fields sit at the top level next to `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingInfoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub info: BillingInfo,
    #[serde(default)]
    pub message: Option<String>,
}

// ========================================
// Auth
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
