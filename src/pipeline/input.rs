//! Source acquisition: fetch release-note pages and read the local PDF.
//!
//! ## Failure model
//!
//! Every source stands on its own. An entry that is not an HTTP(S) URL, a URL
//! beyond `max_urls`, a PDF path that is missing or not a PDF, and a source
//! that fails while being read (404, timeout, corrupt PDF, empty page) each
//! become a [`SourceError`]; the analysis continues with whatever else could
//! be read. Only a run where no source produced text fails, with
//! [`RelnotesError::NoContent`].
//!
//! URLs are fetched concurrently but results keep the order the caller gave,
//! so the notes reach the model in a stable order.

use crate::config::AnalysisConfig;
use crate::error::{RelnotesError, SourceError};
use crate::output::{AnalysisRequest, SourceKind, SourceText};
use crate::pipeline::{html, llm, pdf};
use edgequake_llm::LLMProvider;
use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Separator between the texts of consecutive sources.
pub const SOURCE_SEPARATOR: &str = "\n\n";

/// Largest response body read from a release-notes URL.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Body of a fetched URL, classified by content type and magic bytes.
#[derive(Debug)]
pub enum FetchedBody {
    Html(String),
    Text(String),
    Pdf(Vec<u8>),
}

/// Model used to transcribe PDF pages that have no text layer.
#[derive(Clone, Copy)]
pub struct VisionTranscriber<'a> {
    pub provider: &'a Arc<dyn LLMProvider>,
    pub label: &'a str,
}

/// Everything read from a request's sources.
#[derive(Debug, Default)]
pub struct Gathered {
    /// Sources that produced text, in request order (URLs, then the PDF).
    pub sources: Vec<SourceText>,
    pub errors: Vec<SourceError>,
    pub transcription_input_tokens: u64,
    pub transcription_output_tokens: u64,
}

impl Gathered {
    /// All source texts joined with [`SOURCE_SEPARATOR`], cut to
    /// `max_chars` characters when set.
    pub fn notes(&self, max_chars: Option<usize>) -> String {
        let joined = self
            .sources
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(SOURCE_SEPARATOR);

        match max_chars.and_then(|max| joined.char_indices().nth(max)) {
            Some((idx, _)) => {
                warn!(
                    "Release notes truncated to {} characters",
                    max_chars.unwrap_or_default()
                );
                joined[..idx].to_string()
            }
            None => joined,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetch one URL.
///
/// A body is treated as PDF when the server says `application/pdf` or the
/// bytes start with `%PDF`, as plain text for `text/plain`, and as HTML
/// otherwise. Bodies larger than [`MAX_BODY_BYTES`] are rejected.
pub async fn fetch_url(url: &str, timeout_secs: u64) -> Result<FetchedBody, SourceError> {
    fetch_url_capped(url, timeout_secs, MAX_BODY_BYTES).await
}

async fn fetch_url_capped(
    url: &str,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<FetchedBody, SourceError> {
    info!("Fetching release notes from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SourceError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            SourceError::FetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SourceError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let mut response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(SourceError::FetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let too_large = || SourceError::FetchFailed {
        url: url.to_string(),
        reason: format!("response larger than {} bytes", max_bytes),
    };
    if response
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_err)? {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }
    debug!(
        "Fetched {} bytes from {} ({})",
        bytes.len(),
        url,
        if content_type.is_empty() {
            "no content type"
        } else {
            content_type.as_str()
        }
    );

    Ok(classify_body(&content_type, bytes))
}

fn classify_body(content_type: &str, bytes: Vec<u8>) -> FetchedBody {
    if content_type.contains("application/pdf") || bytes.starts_with(b"%PDF") {
        FetchedBody::Pdf(bytes)
    } else if content_type.starts_with("text/plain") {
        FetchedBody::Text(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        FetchedBody::Html(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Validate a local PDF path: exists, readable, `%PDF` magic.
pub fn validate_local_pdf(path: &Path) -> Result<(), RelnotesError> {
    if !path.exists() {
        return Err(RelnotesError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            let read = f
                .read(&mut magic)
                .map_err(|source| RelnotesError::ReadFailed {
                    path: path.to_path_buf(),
                    source,
                })?;
            pdf::check_pdf_magic(&magic[..read], &path.display().to_string())?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(RelnotesError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(RelnotesError::ReadFailed {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    debug!("Validated local PDF: {}", path.display());
    Ok(())
}

/// Read every source of `request`.
///
/// URLs past the first `max_urls` are skipped with a warning and recorded as
/// [`SourceError::OverLimit`].
///
/// # Errors
/// [`RelnotesError::NoContent`] when the request names no source or no
/// source produced text.
pub async fn gather_sources(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
    vision: Option<VisionTranscriber<'_>>,
) -> Result<Gathered, RelnotesError> {
    let mut urls = request.non_empty_urls();
    let skipped = if urls.len() > config.max_urls {
        warn!(
            "{} URLs given, only the first {} are analysed",
            urls.len(),
            config.max_urls
        );
        urls.split_off(config.max_urls)
    } else {
        Vec::new()
    };

    let total = urls.len() + usize::from(request.pdf.is_some());
    if total == 0 {
        return Err(RelnotesError::NoContent {
            detail: String::new(),
        });
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(total);
    }

    let mut outcomes: Vec<Result<SourceOutcome, SourceError>> = stream::iter(
        urls.iter()
            .map(|url| report(config, url, url_source(url, config, vision))),
    )
    .buffered(config.max_urls)
    .collect()
    .await;

    if let Some(ref path) = request.pdf {
        let origin = path.display().to_string();
        outcomes.push(report(config, &origin, local_pdf_source(path.clone(), config, vision)).await);
    }

    for url in skipped {
        let err = SourceError::OverLimit {
            url: url.to_string(),
            max: config.max_urls,
        };
        warn!("{}", err);
        if let Some(ref cb) = config.progress_callback {
            cb.on_source_error(url, &err.to_string());
        }
        outcomes.push(Err(err));
    }

    let mut gathered = Gathered::default();
    for outcome in outcomes {
        match outcome {
            Ok(o) => {
                gathered.transcription_input_tokens += o.input_tokens;
                gathered.transcription_output_tokens += o.output_tokens;
                gathered.sources.push(o.source);
            }
            Err(e) => gathered.errors.push(e),
        }
    }

    if gathered.sources.is_empty() {
        let detail = gathered
            .errors
            .iter()
            .map(|e| format!("\n  • {e}"))
            .collect::<String>();
        return Err(RelnotesError::NoContent { detail });
    }

    info!(
        "Gathered {} source(s), {} failed",
        gathered.sources.len(),
        gathered.errors.len()
    );
    Ok(gathered)
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct SourceOutcome {
    source: SourceText,
    input_tokens: u64,
    output_tokens: u64,
}

impl SourceOutcome {
    fn plain(source: SourceText) -> Self {
        Self {
            source,
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// Wrap a source future with its progress events.
async fn report(
    config: &AnalysisConfig,
    origin: &str,
    fut: impl std::future::Future<Output = Result<SourceOutcome, SourceError>>,
) -> Result<SourceOutcome, SourceError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_source_start(origin);
    }
    let result = fut.await;
    match &result {
        Ok(o) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_source_complete(origin, o.source.text.chars().count());
            }
        }
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_source_error(origin, &e.to_string());
            }
        }
    }
    result
}

async fn url_source(
    url: &str,
    config: &AnalysisConfig,
    vision: Option<VisionTranscriber<'_>>,
) -> Result<SourceOutcome, SourceError> {
    if !is_url(url) {
        return Err(SourceError::InvalidUrl {
            url: url.to_string(),
        });
    }
    match fetch_url(url, config.download_timeout_secs).await? {
        FetchedBody::Html(body) => {
            text_source(url, SourceKind::Html, html::html_to_text(&body)).map(SourceOutcome::plain)
        }
        FetchedBody::Text(body) => {
            text_source(url, SourceKind::Text, body.trim().to_string()).map(SourceOutcome::plain)
        }
        FetchedBody::Pdf(bytes) => pdf_source(bytes, url, config, vision).await,
    }
}

async fn local_pdf_source(
    path: PathBuf,
    config: &AnalysisConfig,
    vision: Option<VisionTranscriber<'_>>,
) -> Result<SourceOutcome, SourceError> {
    let origin = path.display().to_string();
    validate_local_pdf(&path).map_err(|e| SourceError::PdfFailed {
        origin: origin.clone(),
        detail: e.to_string(),
    })?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| SourceError::PdfFailed {
            origin: origin.clone(),
            detail: e.to_string(),
        })?;
    pdf_source(bytes, &origin, config, vision).await
}

fn text_source(origin: &str, kind: SourceKind, text: String) -> Result<SourceText, SourceError> {
    if text.trim().is_empty() {
        return Err(SourceError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(SourceText {
        origin: origin.to_string(),
        kind,
        text,
        pages: None,
        transcribed_pages: 0,
    })
}

/// Extract a PDF's text, transcribing image-only pages when a model is
/// available.
async fn pdf_source(
    bytes: Vec<u8>,
    origin: &str,
    config: &AnalysisConfig,
    vision: Option<VisionTranscriber<'_>>,
) -> Result<SourceOutcome, SourceError> {
    let pdf_failed = |e: RelnotesError| SourceError::PdfFailed {
        origin: origin.to_string(),
        detail: e.to_string(),
    };

    let mut extracted = pdf::extract_text(
        bytes,
        origin,
        config.pdf_password.as_deref(),
        vision.is_some(),
        config.max_rendered_pixels,
    )
    .await
    .map_err(pdf_failed)?;

    let mut outcome_tokens = (0u64, 0u64);
    let mut transcribed = 0usize;

    if let Some(vision) = vision {
        for (page_num, image) in std::mem::take(&mut extracted.image_pages) {
            let data = match pdf::encode_page(&image) {
                Ok(d) => d,
                Err(e) => {
                    warn!("{}: page {} encoding failed: {}", origin, page_num, e);
                    continue;
                }
            };
            match llm::transcribe_page(vision.provider, vision.label, page_num, data, config).await
            {
                Ok(c) => {
                    outcome_tokens.0 += c.input_tokens;
                    outcome_tokens.1 += c.output_tokens;
                    if let Some(slot) = extracted.pages.get_mut(page_num - 1) {
                        *slot = c.content;
                        transcribed += 1;
                    }
                }
                Err(e) => warn!("{}: page {} transcription failed: {}", origin, page_num, e),
            }
        }
    } else {
        let blank = extracted.pages.iter().filter(|p| p.trim().is_empty()).count();
        if blank > 0 {
            warn!(
                "{}: {} page(s) without a text layer skipped (no vision model)",
                origin, blank
            );
        }
    }

    let mut source = text_source(origin, SourceKind::Pdf, extracted.joined_text())?;
    source.pages = Some(extracted.page_count);
    source.transcribed_pages = transcribed;

    Ok(SourceOutcome {
        source,
        input_tokens: outcome_tokens.0,
        output_tokens: outcome_tokens.1,
    })
}
