//! Terminal output for the `asincheck` binary
//!
//! Results and usage go to stdout; progress and notices go to stderr so
//! stdout can be piped.

use std::io::{self, Write};

use asincheck_common::api::{CheckResult, Usage, UserProfile};
use asincheck_common::events::{NoticeLevel, ProgressCounters};

use crate::subscription::UsageSnapshot;

const TITLE_WIDTH: usize = 48;
const BRAND_WIDTH: usize = 20;

/// Single-line progress (`\r`-rewritten by the caller)
pub fn progress_line(progress: &ProgressCounters) -> String {
    format!(
        "[{}/{}] {:>3.0}%  sellable {}  approval {}  error {}",
        progress.processed,
        progress.total,
        progress.percentage(),
        progress.success,
        progress.warning,
        progress.error
    )
}

pub fn notice_line(level: NoticeLevel, message: &str) -> String {
    let tag = match level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    format!("{}: {}", tag, message)
}

/// Cut to `width` characters, marking the cut with `...`
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

pub fn write_results_table(rows: &[&CheckResult], writer: &mut dyn Write) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(writer, "No results.");
    }

    writeln!(
        writer,
        "{:<12} {:<20} {:<tw$} {:<bw$}",
        "ASIN",
        "STATUS",
        "TITLE",
        "BRAND",
        tw = TITLE_WIDTH,
        bw = BRAND_WIDTH
    )?;
    for row in rows {
        let status = row.status_display();
        writeln!(
            writer,
            "{:<12} {:<20} {:<tw$} {:<bw$}",
            row.asin,
            status.label,
            truncate(row.display_title().unwrap_or("-"), TITLE_WIDTH),
            truncate(row.display_brand().unwrap_or("-"), BRAND_WIDTH),
            tw = TITLE_WIDTH,
            bw = BRAND_WIDTH
        )?;
    }
    Ok(())
}

pub fn usage_line(usage: &Usage) -> String {
    if usage.is_unlimited() {
        format!("Usage: {} checks this month (unlimited)", usage.current)
    } else {
        format!(
            "Usage: {} / {} checks this month ({:.0}%)",
            usage.current, usage.limit, usage.percentage
        )
    }
}

pub fn write_usage_summary(snapshot: &UsageSnapshot, writer: &mut dyn Write) -> io::Result<()> {
    let Some(data) = snapshot.data.as_ref() else {
        let reason = snapshot.error.as_deref().unwrap_or("not loaded");
        return writeln!(writer, "Subscription data unavailable ({})", reason);
    };

    writeln!(writer, "Plan: {} ({})", data.plan.name, data.plan.code)?;
    writeln!(writer, "{}", usage_line(&data.usage))?;
    if let Some(reset) = &data.usage.reset_date {
        writeln!(writer, "Resets: {}", reset)?;
    }
    if let Some(end) = &data.subscription.end_date {
        writeln!(writer, "Subscription ends: {}", end)?;
    }

    if !data.statistics.this_month.breakdown.is_empty() {
        writeln!(writer, "This month:")?;
        for (status, entry) in &data.statistics.this_month.breakdown {
            writeln!(
                writer,
                "  {:<20} {:>6}  {:>5.1}%",
                status, entry.count, entry.percentage
            )?;
        }
    }

    if let Some(billing) = &snapshot.billing {
        if let Some(days) = billing.remaining_days {
            writeln!(writer, "Days remaining in period: {}", days)?;
        }
        if let Some(change) = &billing.pending_change {
            writeln!(
                writer,
                "Pending change: switching to {} on {}",
                change.target_plan,
                change.effective_date.as_deref().unwrap_or("period end")
            )?;
        }
    }

    if let Some(error) = &snapshot.error {
        writeln!(writer, "(stale: {})", error)?;
    }
    Ok(())
}

pub fn whoami_line(user: Option<&UserProfile>) -> String {
    match user {
        Some(user) => match &user.name {
            Some(name) => format!("{} <{}>", name, user.email),
            None => user.email.clone(),
        },
        None => "Not signed in".to_string(),
    }
}
