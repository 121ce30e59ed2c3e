//! Eligibility status classification and display field resolution
//!
//! One table drives the status class (success/warning/error) and the display
//! label used by the result table, the status sort key and the CSV export:
//!
//! | detailedStatus      | class   | label               |
//! |---------------------|---------|---------------------|
//! | `Eligible`          | success | `SELLABLE`          |
//! | `APPROVAL REQUIRED` | warning | `APPROVAL REQUIRED` |
//! | `Restricted`        | error   | `RESTRICTED`        |
//! | `Ineligible`        | error   | `NOT ELIGIBLE`      |
//! | absent, sellable    | success | `SELLABLE`          |
//! | absent, otherwise   | error   | `NOT SELLABLE`      |
//!
//! Title and brand come from several backend fields. The candidates are listed
//! once, in priority order, in [`TITLE_SOURCES`] and [`BRAND_SOURCES`]; the
//! first non-blank value wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::CheckResult;

/// Shown when a result carries no image
pub const PLACEHOLDER_IMAGE_URL: &str = "https://m.media-amazon.com/images/G/01/x-locale/common/no-image.gif";

/// Status class used for counters and styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Success,
    Warning,
    Error,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Success => "success",
            StatusClass::Warning => "warning",
            StatusClass::Error => "error",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known `detailedStatus` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailedStatus {
    Eligible,
    ApprovalRequired,
    Restricted,
    Ineligible,
}

impl DetailedStatus {
    /// Parse a backend status string (case-insensitive, surrounding whitespace ignored)
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("Eligible") {
            Some(DetailedStatus::Eligible)
        } else if raw.eq_ignore_ascii_case("APPROVAL REQUIRED") {
            Some(DetailedStatus::ApprovalRequired)
        } else if raw.eq_ignore_ascii_case("Restricted") {
            Some(DetailedStatus::Restricted)
        } else if raw.eq_ignore_ascii_case("Ineligible") {
            Some(DetailedStatus::Ineligible)
        } else {
            None
        }
    }

    pub fn class(&self) -> StatusClass {
        match self {
            DetailedStatus::Eligible => StatusClass::Success,
            DetailedStatus::ApprovalRequired => StatusClass::Warning,
            DetailedStatus::Restricted | DetailedStatus::Ineligible => StatusClass::Error,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DetailedStatus::Eligible => "SELLABLE",
            DetailedStatus::ApprovalRequired => "APPROVAL REQUIRED",
            DetailedStatus::Restricted => "RESTRICTED",
            DetailedStatus::Ineligible => "NOT ELIGIBLE",
        }
    }
}

/// Class + label pair for one result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDisplay {
    pub class: StatusClass,
    pub label: String,
}

/// Reads one candidate display field from a result
pub type FieldAccessor = for<'a> fn(&'a CheckResult) -> Option<&'a str>;

fn details_title(result: &CheckResult) -> Option<&str> {
    result.details.as_ref().and_then(|d| d.title.as_deref())
}

fn details_item_name(result: &CheckResult) -> Option<&str> {
    result.details.as_ref().and_then(|d| d.item_name.as_deref())
}

fn top_level_title(result: &CheckResult) -> Option<&str> {
    result.title.as_deref()
}

fn details_brand(result: &CheckResult) -> Option<&str> {
    result.details.as_ref().and_then(|d| d.brand.as_deref())
}

fn top_level_brand(result: &CheckResult) -> Option<&str> {
    result.brand.as_deref()
}

/// Title candidates in priority order
pub const TITLE_SOURCES: &[FieldAccessor] = &[details_title, details_item_name, top_level_title];

/// Brand candidates in priority order
pub const BRAND_SOURCES: &[FieldAccessor] = &[details_brand, top_level_brand];

/// First candidate holding a non-blank value
pub fn first_non_empty<'a>(result: &'a CheckResult, sources: &[FieldAccessor]) -> Option<&'a str> {
    sources
        .iter()
        .find_map(|source| source(result).filter(|value| !value.trim().is_empty()))
}

impl CheckResult {
    pub fn display_title(&self) -> Option<&str> {
        first_non_empty(self, TITLE_SOURCES)
    }

    pub fn display_brand(&self) -> Option<&str> {
        first_non_empty(self, BRAND_SOURCES)
    }

    pub fn image_url_or_placeholder(&self) -> &str {
        self.image_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(PLACEHOLDER_IMAGE_URL)
    }

    /// Display class and label (see module table)
    pub fn status_display(&self) -> StatusDisplay {
        match self.detailed_status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => match DetailedStatus::parse(raw) {
                Some(status) => StatusDisplay {
                    class: status.class(),
                    label: status.label().to_string(),
                },
                None if raw.to_ascii_uppercase().contains("APPROVAL") => StatusDisplay {
                    class: StatusClass::Warning,
                    label: raw.to_ascii_uppercase(),
                },
                None => StatusDisplay {
                    class: StatusClass::Error,
                    label: raw.to_ascii_uppercase(),
                },
            },
            _ if self.sellable == Some(true) => StatusDisplay {
                class: StatusClass::Success,
                label: "SELLABLE".to_string(),
            },
            _ => StatusDisplay {
                class: StatusClass::Error,
                label: "NOT SELLABLE".to_string(),
            },
        }
    }

    /// Bucket used by the batch progress counters
    ///
    /// `sellable == true` wins, then any status mentioning APPROVAL, else error.
    pub fn counter_class(&self) -> StatusClass {
        if self.sellable == Some(true) {
            StatusClass::Success
        } else if self
            .detailed_status
            .as_deref()
            .is_some_and(|s| s.to_ascii_uppercase().contains("APPROVAL"))
        {
            StatusClass::Warning
        } else {
            StatusClass::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::CheckDetails;

    fn result_with_status(status: Option<&str>, sellable: Option<bool>) -> CheckResult {
        CheckResult {
            asin: "B0C31QBVQ1".to_string(),
            detailed_status: status.map(str::to_string),
            sellable,
            ..Default::default()
        }
    }

    #[test]
    fn test_eligible_is_success_sellable() {
        let display = result_with_status(Some("Eligible"), None).status_display();
        assert_eq!(display.class, StatusClass::Success);
        assert_eq!(display.label, "SELLABLE");
    }

    #[test]
    fn test_approval_required_is_warning() {
        let display = result_with_status(Some("APPROVAL REQUIRED"), Some(false)).status_display();
        assert_eq!(display.class, StatusClass::Warning);
        assert_eq!(display.label, "APPROVAL REQUIRED");
    }

    #[test]
    fn test_restricted_and_ineligible_are_errors() {
        let restricted = result_with_status(Some("Restricted"), None).status_display();
        assert_eq!(restricted.class, StatusClass::Error);
        assert_eq!(restricted.label, "RESTRICTED");

        let ineligible = result_with_status(Some("Ineligible"), None).status_display();
        assert_eq!(ineligible.class, StatusClass::Error);
        assert_eq!(ineligible.label, "NOT ELIGIBLE");
    }

    #[test]
    fn test_legacy_sellable_fallback() {
        let sellable = result_with_status(None, Some(true)).status_display();
        assert_eq!(sellable.class, StatusClass::Success);
        assert_eq!(sellable.label, "SELLABLE");

        let not_sellable = result_with_status(None, Some(false)).status_display();
        assert_eq!(not_sellable.class, StatusClass::Error);
        assert_eq!(not_sellable.label, "NOT SELLABLE");

        let blank = result_with_status(Some("  "), None).status_display();
        assert_eq!(blank.label, "NOT SELLABLE");
    }

    #[test]
    fn test_unknown_status_strings() {
        let approval = result_with_status(Some("Brand approval pending"), None).status_display();
        assert_eq!(approval.class, StatusClass::Warning);
        assert_eq!(approval.label, "BRAND APPROVAL PENDING");

        let other = result_with_status(Some("Hazmat"), None).status_display();
        assert_eq!(other.class, StatusClass::Error);
        assert_eq!(other.label, "HAZMAT");
    }

    #[test]
    fn test_counter_class_prefers_sellable_flag() {
        assert_eq!(
            result_with_status(Some("APPROVAL REQUIRED"), Some(true)).counter_class(),
            StatusClass::Success
        );
        assert_eq!(
            result_with_status(Some("APPROVAL REQUIRED"), None).counter_class(),
            StatusClass::Warning
        );
        assert_eq!(
            result_with_status(Some("Eligible"), None).counter_class(),
            StatusClass::Error
        );
        assert_eq!(result_with_status(None, None).counter_class(), StatusClass::Error);
    }

    #[test]
    fn test_title_fallback_order() {
        let mut result = CheckResult {
            asin: "B0DRW7WRX3".to_string(),
            title: Some("Top".to_string()),
            details: Some(CheckDetails {
                title: Some("  ".to_string()),
                item_name: Some("Item name".to_string()),
                brand: None,
            }),
            ..Default::default()
        };
        assert_eq!(result.display_title(), Some("Item name"));

        result.details = None;
        assert_eq!(result.display_title(), Some("Top"));

        result.title = None;
        assert_eq!(result.display_title(), None);
    }

    #[test]
    fn test_brand_fallback_order() {
        let result = CheckResult {
            asin: "B0DRW7WRX3".to_string(),
            brand: Some("Outer".to_string()),
            details: Some(CheckDetails {
                brand: Some("Inner".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(result.display_brand(), Some("Inner"));
    }

    #[test]
    fn test_image_placeholder() {
        let mut result = result_with_status(None, None);
        assert_eq!(result.image_url_or_placeholder(), PLACEHOLDER_IMAGE_URL);
        result.image_url = Some("https://img.example/x.jpg".to_string());
        assert_eq!(result.image_url_or_placeholder(), "https://img.example/x.jpg");
    }
}
