//! Error types for the relnotes-analyzer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RelnotesError`]: **Fatal**: the analysis cannot proceed at all
//!   (no readable release notes, provider not configured, LLM unreachable).
//!   Returned as `Err(RelnotesError)` from the top-level `analyze*` functions.
//!
//! * [`SourceError`]: **Non-fatal**: one release-note source failed (a URL
//!   returned 404, a PDF was missing or corrupt, an entry was not a URL)
//!   while the others were fine. Stored in
//!   [`crate::output::AnalysisReport::source_errors`] so callers still get an
//!   analysis of whatever could be read.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the relnotes-analyzer library.
#[derive(Debug, Error)]
pub enum RelnotesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but reading it failed.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every source was empty or failed; there is nothing to send to the model.
    #[error("No content to analyze. Please provide either URLs or a PDF file.{detail}")]
    NoContent { detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The bytes are not a PDF document.
    #[error("'{origin}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { origin: String, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{origin}' is corrupt: {detail}")]
    CorruptPdf { origin: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{origin}' is encrypted and requires a password.\nProvide it with --pdf-password <PASSWORD>.")]
    PasswordRequired { origin: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{origin}'")]
    WrongPassword { origin: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first use.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM backend '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call failed after all retries.
    #[error("Error analyzing release notes with {provider}: {message}")]
    LlmApiError { provider: String, message: String },

    /// The LLM call timed out on every attempt.
    #[error("LLM call timed out after {secs}s ({attempts} attempts)\nIncrease --api-timeout or use a smaller model.")]
    ApiTimeout { secs: u64, attempts: u32 },

    /// The local inference server could not be reached.
    #[error("Error connecting to Ollama at '{host}': {reason}\nPlease ensure Ollama is running and accessible.")]
    OllamaUnavailable { host: String, reason: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Rendering the PDF report failed.
    #[error("Failed to generate PDF report: {0}")]
    PdfExportFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single release-note source.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SourceError {
    /// The entry is not an HTTP/HTTPS URL.
    #[error("Invalid URL '{url}': release notes must be fetched over HTTP or HTTPS")]
    InvalidUrl { url: String },

    /// The URL was beyond the `max_urls` limit and was not fetched.
    #[error("Skipped URL {url}: at most {max} URLs are analysed")]
    OverLimit { url: String, max: usize },

    /// HTTP request failed or returned a non-success status.
    #[error("Error fetching URL {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The download exceeded the configured timeout.
    #[error("Error fetching URL {url}: timed out after {secs}s")]
    FetchTimeout { url: String, secs: u64 },

    /// The PDF could not be opened or its text could not be extracted.
    #[error("Error processing PDF {origin}: {detail}")]
    PdfFailed { origin: String, detail: String },

    /// The source was readable but contained no text.
    #[error("{origin}: no text content found")]
    Empty { origin: String },
}

impl SourceError {
    /// The URL or path the error refers to.
    pub fn origin(&self) -> &str {
        match self {
            SourceError::InvalidUrl { url }
            | SourceError::OverLimit { url, .. }
            | SourceError::FetchFailed { url, .. }
            | SourceError::FetchTimeout { url, .. } => url,
            SourceError::PdfFailed { origin, .. } | SourceError::Empty { origin } => origin,
        }
    }
}
