//! Report export: Markdown, PDF, HTML and JSON renderings of an
//! [`AnalysisReport`].
//!
//! Every renderer takes the generation timestamp as an argument so output is
//! reproducible in tests.

pub mod html;
pub mod markdown;
pub mod pdf;

use crate::error::RelnotesError;
use crate::output::AnalysisReport;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

pub use html::render_html;
pub use markdown::render_markdown;
pub use pdf::render_pdf;

/// Timestamp layout used in every report header.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File formats a report can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Pdf,
    Html,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Html => "text/html",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = RelnotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "pdf" => Ok(ExportFormat::Pdf),
            "html" | "htm" => Ok(ExportFormat::Html),
            "json" => Ok(ExportFormat::Json),
            other => Err(RelnotesError::InvalidConfig(format!(
                "unknown export format '{other}' (expected markdown, pdf, html or json)"
            ))),
        }
    }
}

/// Render `report` in `format`.
pub fn render(
    report: &AnalysisReport,
    format: ExportFormat,
    generated_at: &DateTime<Local>,
) -> Result<Vec<u8>, RelnotesError> {
    match format {
        ExportFormat::Markdown => Ok(render_markdown(report, generated_at).into_bytes()),
        ExportFormat::Html => Ok(render_html(report, generated_at).into_bytes()),
        ExportFormat::Pdf => render_pdf(report, generated_at),
        ExportFormat::Json => serde_json::to_vec_pretty(report)
            .map_err(|e| RelnotesError::Internal(format!("JSON serialisation failed: {e}"))),
    }
}

/// `{plugin}_analysis.{ext}` with the plugin name lower-cased and spaces
/// replaced by underscores.
pub fn default_file_name(plugin_name: &str, extension: &str) -> String {
    let stem = plugin_name.trim().to_lowercase().replace(' ', "_");
    format!("{stem}_analysis.{extension}")
}

/// Where a report goes for an `--output` value.
///
/// An existing directory, or a path ending in a separator (which need not
/// exist yet), receives `file_name`; anything else is the file itself.
pub fn output_path(out: &Path, file_name: &str) -> PathBuf {
    let raw = out.as_os_str().to_string_lossy();
    if out.is_dir() || raw.ends_with(['/', std::path::MAIN_SEPARATOR]) {
        out.join(file_name)
    } else {
        out.to_path_buf()
    }
}

/// Write `bytes` to `path` atomically (temp file in the same directory, then
/// rename), creating parent directories as needed.
pub async fn write_report(path: &Path, bytes: &[u8]) -> Result<(), RelnotesError> {
    let write_err = |e: std::io::Error| RelnotesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }

    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(
            default_file_name("Script Runner", "pdf"),
            "script_runner_analysis.pdf"
        );
        assert_eq!(default_file_name("Unknown Plugin", "md"), "unknown_plugin_analysis.md");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert!("docx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Json.extension(), "json");
    }

    #[test]
    fn json_round_trips_analysis() {
        let report = fixtures::report();
        let bytes = render(&report, ExportFormat::Json, &fixtures::generated_at()).unwrap();
        let back: AnalysisReport = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.analysis, report.analysis);
    }

    #[test]
    fn output_directory_or_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            output_path(dir.path(), "tempo_analysis.md"),
            dir.path().join("tempo_analysis.md")
        );

        let fresh = format!("{}/reports/", dir.path().display());
        assert_eq!(
            output_path(Path::new(&fresh), "tempo_analysis.md"),
            dir.path().join("reports").join("tempo_analysis.md")
        );

        let file = dir.path().join("custom.md");
        assert_eq!(output_path(&file, "tempo_analysis.md"), file);
    }

    #[tokio::test]
    async fn report_lands_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = format!("{}/reports/", dir.path().display());
        let path = output_path(Path::new(&out), "tempo_analysis.md");
        write_report(&path, b"# Tempo\n").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("reports/tempo_analysis.md")).unwrap(),
            "# Tempo\n"
        );
    }

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/nested/out.md");
        write_report(&path, b"# hi\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi\n");
        assert!(!dir.path().join("reports/nested/out.md.tmp").exists());
    }
}
