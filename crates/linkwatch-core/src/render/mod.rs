//! HTML rendering of log lines
//!
//! Shared by the read-only query surface (`/logs`, `/errors`) and the
//! shipping payload's `htmlLogs` field. Each line becomes one `<div>` with
//! a severity class derived from the message content.

use crate::config::SeverityThresholds;

/// Per-line severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warn,
    Error,
}

impl Severity {
    /// CSS class name for this severity
    pub fn css_class(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

/// Classify one log line
///
/// Outage and failure markers are errors; throughput measurements beyond
/// the configured cutoffs are warnings; everything else is ok.
pub fn classify_line(line: &str, thresholds: &SeverityThresholds) -> Severity {
    // "DOWN" must stay case-sensitive: throughput lines carry "Download:"
    if line.contains("DOWN") || line.contains("failed") || line.contains("error") {
        return Severity::Error;
    }

    if let Some(sample) = parse_throughput(line) {
        let (download, upload, ping) = sample;
        if download < thresholds.min_download_mbps
            || upload < thresholds.min_upload_mbps
            || ping > thresholds.max_ping_ms
        {
            return Severity::Warn;
        }
    }

    Severity::Ok
}

/// Render an ordered sequence of log lines as an HTML fragment
pub fn render_html(lines: &[String], thresholds: &SeverityThresholds) -> String {
    let mut html = String::with_capacity(lines.len() * 64);
    html.push_str("<div class=\"log\">\n");
    for line in lines {
        let severity = classify_line(line, thresholds);
        html.push_str(&format!(
            "<div class=\"{}\">{}</div>\n",
            severity.css_class(),
            escape(line)
        ));
    }
    html.push_str("</div>\n");
    html
}

/// Pull `(download, upload, ping)` out of a throughput line, if it is one
fn parse_throughput(line: &str) -> Option<(f64, f64, f64)> {
    let download = field_value(line, "Download:")?;
    let upload = field_value(line, "Upload:")?;
    let ping = field_value(line, "Ping:")?;
    Some((download, upload, ping))
}

fn field_value(line: &str, field: &str) -> Option<f64> {
    let rest = &line[line.find(field)? + field.len()..];
    rest.split_whitespace().next()?.parse().ok()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> SeverityThresholds {
        SeverityThresholds::default()
    }

    #[test]
    fn outage_lines_are_errors() {
        let t = thresholds();
        assert_eq!(
            classify_line("2025-03-01T12:00:00.000Z NETWORK DOWN", &t),
            Severity::Error
        );
        assert_eq!(
            classify_line("2025-03-01T12:00:00.000Z Speed test failed", &t),
            Severity::Error
        );
    }

    #[test]
    fn slow_throughput_is_warn_fast_is_ok() {
        let t = thresholds();
        let slow = "2025-03-01T12:00:00.000Z Ping: 250.0 ms Download: 2.10 Mbit/s Upload: 0.40 Mbit/s";
        let fast = "2025-03-01T12:00:00.000Z Ping: 18.0 ms Download: 95.00 Mbit/s Upload: 40.00 Mbit/s";
        assert_eq!(classify_line(slow, &t), Severity::Warn);
        assert_eq!(classify_line(fast, &t), Severity::Ok);
    }

    #[test]
    fn plain_status_lines_are_ok() {
        let t = thresholds();
        assert_eq!(
            classify_line("2025-03-01T12:00:00.000Z NETWORK UP", &t),
            Severity::Ok
        );
        assert_eq!(
            classify_line("2025-03-01T12:00:00.000Z FIBRE CONNECTED", &t),
            Severity::Ok
        );
    }

    #[test]
    fn rendered_lines_are_escaped() {
        let t = thresholds();
        let lines = vec!["<script>alert(1)</script>".to_string()];
        let html = render_html(&lines, &t);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
