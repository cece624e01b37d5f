//! Standalone HTML report: the three buckets side by side.

use super::TIMESTAMP_FORMAT;
use crate::output::{AnalysisReport, Bucket, Change, Importance, GENERAL_CATEGORY};
use chrono::{DateTime, Local};
use std::fmt::Write;

pub const MAJOR_BADGE_COLOR: &str = "#F6C344";
pub const MINOR_BADGE_COLOR: &str = "#4C9AFF";
pub const WARNING_COLOR: &str = "#FF5630";

const STYLE: &str = r#"body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; color: #172B4D; margin: 2rem; }
.meta { color: #6B778C; margin: 0.2rem 0; }
table.analysis { width: 100%; border-collapse: collapse; table-layout: fixed; margin-top: 1.5rem; }
table.analysis th { color: #6B778C; font-size: 1.1rem; font-weight: normal; text-align: left; padding-bottom: 1rem; }
table.analysis td { vertical-align: top; padding-right: 1.5rem; }
.subsection-header { color: #172B4D; font-size: 1rem; margin: 1rem 0 0.5rem 0; font-weight: 500; }
.change-item { margin-bottom: 0.8rem; }
.badge { color: black; padding: 0.2rem 0.5rem; border-radius: 1rem; font-size: 0.8rem; margin-right: 0.5rem; }
.source-errors { color: #6B778C; font-size: 0.9rem; margin-top: 2rem; }"#;

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
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

fn importance_badge(importance: Importance) -> String {
    let color = match importance {
        Importance::Major => MAJOR_BADGE_COLOR,
        Importance::Minor => MINOR_BADGE_COLOR,
    };
    format!(
        r#"<span class="badge" style="background-color: {color}">{}</span>"#,
        importance.as_str()
    )
}

fn changes_cell(groups: Vec<(&str, Vec<&Change>)>) -> String {
    let mut cell = String::new();
    for (category, changes) in groups {
        if category != GENERAL_CATEGORY {
            let _ = writeln!(
                cell,
                r#"<p class="subsection-header">{}</p>"#,
                escape_html(category)
            );
        }
        for change in changes {
            let _ = writeln!(
                cell,
                r#"<div class="change-item">{}{}</div>"#,
                importance_badge(change.importance),
                escape_html(&change.text)
            );
        }
    }
    cell
}

/// Render the report as a self-contained HTML page.
pub fn render_html(report: &AnalysisReport, generated_at: &DateTime<Local>) -> String {
    let req = &report.request;
    let title = format!("{} Release Notes Analysis", req.display_name());
    let mut html = String::new();

    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, r#"<html lang="en">"#);
    let _ = writeln!(html, "<head>");
    let _ = writeln!(html, r#"<meta charset="utf-8">"#);
    let _ = writeln!(html, "<title>{}</title>", escape_html(&title));
    let _ = writeln!(html, "<style>\n{STYLE}\n</style>");
    let _ = writeln!(html, "</head>");
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "<h1>{}</h1>", escape_html(&title));
    let _ = writeln!(
        html,
        r#"<p class="meta">Analysis from version {} to {}</p>"#,
        escape_html(&req.current_version),
        escape_html(&req.target_version)
    );
    if req.plugin_from.is_some() || req.plugin_to.is_some() {
        let _ = writeln!(
            html,
            r#"<p class="meta">Plugin version: {} → {}</p>"#,
            escape_html(req.plugin_from.as_deref().unwrap_or("?")),
            escape_html(req.plugin_to.as_deref().unwrap_or("?"))
        );
    }
    let _ = writeln!(
        html,
        r#"<p class="meta">Generated on: {} · {}</p>"#,
        generated_at.format(TIMESTAMP_FORMAT),
        escape_html(&report.engine.to_string())
    );

    let _ = writeln!(html, r#"<table class="analysis">"#);
    let _ = writeln!(
        html,
        "<tr><th>👤 User Changes</th><th>⚙️ Admin Changes</th><th>⚠️ Compatibility Warnings</th></tr>"
    );
    let _ = writeln!(html, "<tr>");
    let _ = writeln!(
        html,
        "<td>\n{}</td>",
        changes_cell(report.analysis.grouped(Bucket::User))
    );
    let _ = writeln!(
        html,
        "<td>\n{}</td>",
        changes_cell(report.analysis.grouped(Bucket::Admin))
    );
    let _ = writeln!(html, "<td>");
    for warning in &report.analysis.compatibility {
        let _ = writeln!(
            html,
            r#"<div class="change-item"><span style="color: {WARNING_COLOR}">{}</span></div>"#,
            escape_html(&warning.text)
        );
    }
    let _ = writeln!(html, "</td>");
    let _ = writeln!(html, "</tr>");
    let _ = writeln!(html, "</table>");

    if !report.source_errors.is_empty() {
        let _ = writeln!(html, r#"<div class="source-errors">"#);
        let _ = writeln!(html, "<p>Sources that could not be read:</p>\n<ul>");
        for e in &report.source_errors {
            let _ = writeln!(html, "<li>{}</li>", escape_html(&e.to_string()));
        }
        let _ = writeln!(html, "</ul>\n</div>");
    }

    let _ = writeln!(html, "</body>");
    let _ = writeln!(html, "</html>");
    html
}
