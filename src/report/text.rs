//! Plain text report.

use super::{format_duration, Report, ReportRow};
use std::fmt::{self, Write};

const RULE: &str = "========================================================";
const SEPARATOR: &str = "--------------------------------------------------------";

pub fn render(report: &Report) -> String {
    let mut out = String::new();
    if let Err(e) = write_report(&mut out, report) {
        tracing::warn!("Could not format text report: {}", e);
    }
    out
}

fn write_report(out: &mut impl Write, report: &Report) -> fmt::Result {
    let summary = &report.summary;

    writeln!(out, "{RULE}")?;
    writeln!(out, "        PORTFOLIO VISITOR INSIGHTS")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Generated: {}", report.generated_at)?;
    writeln!(out, "Window: last {} days", report.window_days)?;
    writeln!(out, "Scoring: {}", report.scoring)?;
    writeln!(
        out,
        "Sessions: {} | Mean active time: {} | Median scroll: {:.0}%",
        summary.sessions,
        format_duration(summary.mean_active_secs.round() as u64),
        summary.median_scroll_pct
    )?;
    writeln!(out, "{SEPARATOR}")?;

    for row in &report.rows {
        write_row(out, row)?;
    }
    Ok(())
}

fn write_row(out: &mut impl Write, row: &ReportRow) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "Identity: {}", row.identity)?;
    writeln!(out, "Session: {}", row.session_id)?;
    writeln!(out, "Last seen: {}", row.last_seen)?;
    writeln!(out, "Device: {} ({})", row.device_model, row.device_type)?;
    writeln!(out, "System: {} / {}", row.os, row.browser)?;
    writeln!(out, "Source: {}", row.source)?;
    writeln!(out, "Visit: #{}", row.visit_number)?;
    writeln!(out, "Time Spent: {}", row.duration())?;
    writeln!(out, "Scroll Depth: {}%", row.scroll_pct)?;
    writeln!(out, "Interactions: {}", row.events_display(" > "))?;
    writeln!(out, "Intent: {}", row.intent)?;
    writeln!(out, "{SEPARATOR}")
}
