//! Date utilities

use chrono::Local;

/// Today's local date as `YYYY-MM-DD`
///
/// Used for the `Check Date` export column and default export file names.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}
