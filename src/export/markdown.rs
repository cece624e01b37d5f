//! Markdown report.

use super::TIMESTAMP_FORMAT;
use crate::output::{AnalysisReport, Bucket, Importance, GENERAL_CATEGORY};
use chrono::{DateTime, Local};
use std::fmt::Write;

/// Render the report as Markdown.
///
/// User and admin sections are always present; the compatibility section
/// only when there are warnings.
pub fn render_markdown(report: &AnalysisReport, generated_at: &DateTime<Local>) -> String {
    let req = &report.request;
    let mut md = String::new();

    let _ = writeln!(md, "# {} Release Notes Analysis\n", req.display_name());
    let _ = writeln!(
        md,
        "Analysis from version {} to {}",
        req.current_version, req.target_version
    );
    if req.plugin_from.is_some() || req.plugin_to.is_some() {
        let _ = writeln!(
            md,
            "Plugin version: {} → {}",
            req.plugin_from.as_deref().unwrap_or("?"),
            req.plugin_to.as_deref().unwrap_or("?")
        );
    }
    let _ = writeln!(
        md,
        "Generated on: {}\n",
        generated_at.format(TIMESTAMP_FORMAT)
    );

    for (bucket, heading) in [
        (Bucket::User, "## 👤 User Changes"),
        (Bucket::Admin, "## ⚙️ Admin Changes"),
    ] {
        let _ = writeln!(md, "{heading}\n");
        for (category, changes) in report.analysis.grouped(bucket) {
            if category != GENERAL_CATEGORY {
                let _ = writeln!(md, "### {category}\n");
            }
            for change in changes {
                let marker = match change.importance {
                    Importance::Major => "🔴",
                    Importance::Minor => "🟡",
                };
                let _ = writeln!(md, "{marker} {}\n", change.text);
            }
        }
    }

    if !report.analysis.compatibility.is_empty() {
        md.push_str("## ⚠️ Compatibility Warnings\n\n");
        for warning in &report.analysis.compatibility {
            let _ = writeln!(md, "- ⚠️ {}\n", warning.text);
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures;
    use crate::output::Analysis;

    #[test]
    fn layout() {
        let md = render_markdown(&fixtures::report(), &fixtures::generated_at());
        let expected = "# Script Runner Release Notes Analysis

Analysis from version 9.4.0 to 10.3.0
Generated on: 2024-11-05 14:30:00

## 👤 User Changes

### New Features

🟡 Duplicate feature for Fragments

🟡 Dark theme

## ⚙️ Admin Changes

### Security Improvements

🔴 Version 9.6.0 addresses a CVE <script>

## ⚠️ Compatibility Warnings

- ⚠️ Jira 10 requires 9.1.1 & later

";
        assert_eq!(md, expected);
    }

    #[test]
    fn no_warning_section_without_warnings() {
        let mut report = fixtures::report();
        report.analysis = Analysis::default();
        let md = render_markdown(&report, &fixtures::generated_at());
        assert!(md.contains("## 👤 User Changes"));
        assert!(md.contains("## ⚙️ Admin Changes"));
        assert!(!md.contains("Compatibility Warnings"));
    }

    #[test]
    fn plugin_versions_when_known() {
        let mut report = fixtures::report();
        report.request.plugin_from = Some("8.20.0".into());
        report.request.plugin_to = Some("9.6.0".into());
        let md = render_markdown(&report, &fixtures::generated_at());
        assert!(md.contains("Plugin version: 8.20.0 → 9.6.0\n"));
    }
}
