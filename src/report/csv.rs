//! CSV report. One header line, then one row per session.

use super::{Report, ReportRow};

pub const HEADER: &str = "session_id,last_seen,identity,device_type,device_model,os,browser,\
source,visit_number,active_time,active_secs,scroll_pct,events,intent";

pub fn render(report: &Report) -> String {
    let mut out = String::with_capacity(HEADER.len() + report.rows.len() * 160);
    out.push_str(HEADER);
    out.push('\n');
    for row in &report.rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

pub fn render_row(row: &ReportRow) -> String {
    let fields = [
        row.session_id.clone(),
        row.last_seen.clone(),
        row.identity.clone(),
        row.device_type.clone(),
        row.device_model.clone(),
        row.os.clone(),
        row.browser.clone(),
        row.source.clone(),
        row.visit_number.to_string(),
        row.duration(),
        row.active_secs.to_string(),
        row.scroll_pct.to_string(),
        row.events_display(" | "),
        row.intent.to_string(),
    ];
    fields.iter().map(|f| escape(f.as_str())).collect::<Vec<_>>().join(",")
}

/// Quote a field when it holds a delimiter, quote or line break.
pub fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
