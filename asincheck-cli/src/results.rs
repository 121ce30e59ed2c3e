//! Accumulated check results with view-level sorting and CSV export
//!
//! [`ResultSet`] is the canonical, insertion-ordered list (most recent first).
//! Sorting never reorders it; [`ResultSet::sorted`] returns a borrowed view.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;

use asincheck_common::api::CheckResult;
use asincheck_common::{Error, Result};
use tracing::info;

pub const CSV_HEADER: &str = "ASIN,Title,Brand,Status,Check Date";

/// Canonical result list for the current session
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    items: VecDeque<CheckResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest result goes first
    pub fn prepend(&mut self, result: CheckResult) {
        self.items.push_front(result);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckResult> {
        self.items.iter()
    }

    /// Borrowed view ordered by `spec`
    pub fn sorted(&self, spec: SortSpec) -> Vec<&CheckResult> {
        let mut view: Vec<&CheckResult> = self.items.iter().collect();
        sort_view(&mut view, spec);
        view
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Canonical order, untouched
    #[default]
    Insertion,
    Asin,
    /// Case-insensitive, through the title fallback chain
    Title,
    /// Display label, not the raw status code
    Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Column-header behavior: same key flips direction, new key starts ascending
    pub fn select(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = self.direction.toggled();
        } else {
            self.key = key;
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn toggle(&mut self) {
        self.direction = self.direction.toggled();
    }
}

fn title_key(result: &CheckResult) -> String {
    result.display_title().unwrap_or("").to_lowercase()
}

fn compare(a: &CheckResult, b: &CheckResult, key: SortKey) -> Ordering {
    match key {
        SortKey::Insertion => Ordering::Equal,
        SortKey::Asin => a.asin.cmp(&b.asin),
        SortKey::Title => title_key(a).cmp(&title_key(b)),
        SortKey::Status => a.status_display().label.cmp(&b.status_display().label),
    }
}

/// Stable sort of a borrowed view
pub fn sort_view(view: &mut [&CheckResult], spec: SortSpec) {
    view.sort_by(|a, b| {
        let ordering = compare(a, b, spec.key);
        match spec.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

// ========================================
// CSV Export
// ========================================

/// Wrap in double quotes, doubling embedded quotes
fn quote_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Quote only when the field would otherwise break the row
fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        quote_csv(field)
    } else {
        field.to_string()
    }
}

/// Write rows as CSV; every row carries the same `check_date`
pub fn write_csv<W: Write>(rows: &[&CheckResult], check_date: &str, writer: &mut W) -> Result<()> {
    if rows.is_empty() {
        return Err(Error::InvalidInput("No results to export".to_string()));
    }

    writeln!(writer, "{}", CSV_HEADER)?;
    for row in rows {
        writeln!(
            writer,
            "{},{},{},{},{}",
            escape_csv(&row.asin),
            quote_csv(row.display_title().unwrap_or("")),
            quote_csv(row.display_brand().unwrap_or("")),
            escape_csv(&row.status_display().label),
            check_date
        )?;
    }
    Ok(())
}

pub fn export_csv(rows: &[&CheckResult], check_date: &str) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(rows, check_date, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
}

/// Export to a file; an empty row set fails before the file is created
pub fn export_to_path(rows: &[&CheckResult], check_date: &str, path: &Path) -> Result<()> {
    let content = export_csv(rows, check_date)?;
    std::fs::write(path, content)?;
    info!("Exported {} results to {}", rows.len(), path.display());
    Ok(())
}

pub fn default_export_file_name(date: &str) -> String {
    format!("asin-results-{}.csv", date)
}
