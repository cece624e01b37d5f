//! Analysis entry points.
//!
//! [`analyze`] runs the whole pipeline: read the sources, ask the model (or
//! the keyword engine), parse the reply. [`analyze_text`] starts from text the
//! caller already has, and [`extract`] stops after reading the sources.

use crate::backend::{self, ResolvedProvider};
use crate::config::{AnalysisConfig, Backend};
use crate::error::RelnotesError;
use crate::export::{self, ExportFormat};
use crate::output::{
    Analysis, AnalysisEngine, AnalysisReport, AnalysisRequest, AnalysisStats, SourceKind,
    SourceText,
};
use crate::pipeline::input::{self, Gathered, VisionTranscriber};
use crate::pipeline::{keywords, llm, parse};
use crate::prompts;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Timeout for the Ollama reachability check that precedes a local run.
const OLLAMA_CHECK_TIMEOUT_SECS: u64 = 5;

/// Analyse the release notes a request points at.
///
/// # Returns
/// `Ok(AnalysisReport)` as long as at least one source could be read and the
/// engine answered; failed sources are listed in
/// [`AnalysisReport::source_errors`].
///
/// # Errors
/// - [`RelnotesError::NoContent`] when no source produced text
/// - provider not configured, Ollama unreachable
/// - [`RelnotesError::LlmApiError`] / [`RelnotesError::ApiTimeout`] after
///   all retries
pub async fn analyze(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, RelnotesError> {
    let total_start = Instant::now();
    info!(
        "Analysing {} ({} → {})",
        request.display_name(),
        request.current_version,
        request.target_version
    );

    let provider = prepare_provider(config).await?;

    let vision = match (&provider, config.vision_fallback) {
        (Some(p), true) => Some(VisionTranscriber {
            provider: &p.provider,
            label: &p.name,
        }),
        _ => None,
    };

    let fetch_start = Instant::now();
    let gathered = input::gather_sources(request, config, vision).await?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

    let notes = gathered.notes(config.max_input_chars);
    let mut report = run_engine(&notes, request, config, provider.as_ref()).await?;

    report.stats.sources_ok = gathered.sources.len();
    report.stats.sources_failed = gathered.errors.len();
    report.stats.input_tokens += gathered.transcription_input_tokens;
    report.stats.output_tokens += gathered.transcription_output_tokens;
    report.stats.fetch_duration_ms = fetch_duration_ms;
    report.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    report.sources = gathered.sources;
    report.source_errors = gathered.errors;

    finish(&report, config);
    Ok(report)
}

/// Analyse release notes the caller already has as text.
pub async fn analyze_text(
    text: &str,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, RelnotesError> {
    let total_start = Instant::now();
    let text = text.trim();
    if text.is_empty() {
        return Err(RelnotesError::NoContent {
            detail: String::new(),
        });
    }

    let provider = prepare_provider(config).await?;

    let notes = match config.max_input_chars.and_then(|max| text.char_indices().nth(max)) {
        Some((idx, _)) => {
            warn!(
                "Release notes truncated to {} characters",
                config.max_input_chars.unwrap_or_default()
            );
            text[..idx].to_string()
        }
        None => text.to_string(),
    };
    let mut report = run_engine(&notes, request, config, provider.as_ref()).await?;

    report.sources = vec![SourceText {
        origin: "<text>".to_string(),
        kind: SourceKind::Text,
        text: text.to_string(),
        pages: None,
        transcribed_pages: 0,
    }];
    report.stats.sources_ok = 1;
    report.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    finish(&report, config);
    Ok(report)
}

/// Read the sources of a request without analysing them.
///
/// Needs no LLM provider; PDF pages without a text layer are skipped.
pub async fn extract(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<Gathered, RelnotesError> {
    input::gather_sources(request, config, None).await
}

/// Analyse and write the report to `output_path` in `format`.
///
/// Nothing is written when the analysis found no changes; check
/// [`Analysis::is_empty`] on the returned report.
pub async fn analyze_to_file(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
    output_path: impl AsRef<Path>,
    format: ExportFormat,
) -> Result<AnalysisReport, RelnotesError> {
    let report = analyze(request, config).await?;
    if report.analysis.is_empty() {
        warn!("Analysis is empty; nothing written");
        return Ok(report);
    }

    let generated_at = chrono::Local::now();
    let bytes = match format {
        ExportFormat::Pdf => {
            let owned = report.clone();
            tokio::task::spawn_blocking(move || export::render(&owned, format, &generated_at))
                .await
                .map_err(|e| RelnotesError::Internal(format!("PDF export task panicked: {e}")))??
        }
        _ => export::render(&report, format, &generated_at)?,
    };
    export::write_report(output_path.as_ref(), &bytes).await?;
    Ok(report)
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, RelnotesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RelnotesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(request, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the provider and, for a local backend, check the server is up
/// before any source is fetched.
async fn prepare_provider(config: &AnalysisConfig) -> Result<Option<ResolvedProvider>, RelnotesError> {
    let provider = backend::resolve_provider(config)?;
    if config.backend == Backend::Ollama && config.provider.is_none() {
        let model = config.effective_model(Backend::Ollama);
        backend::check_ollama(&config.ollama_host, &model, OLLAMA_CHECK_TIMEOUT_SECS).await?;
    }
    Ok(provider)
}

/// Categorise `notes` with the model, or with keywords when there is none.
async fn run_engine(
    notes: &str,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
    provider: Option<&ResolvedProvider>,
) -> Result<AnalysisReport, RelnotesError> {
    let mut stats = AnalysisStats {
        input_chars: notes.chars().count(),
        ..AnalysisStats::default()
    };

    let Some(provider) = provider else {
        let analysis =
            keywords::analyze_keywords(notes, &request.current_version, &request.target_version);
        return Ok(report_for(request, analysis, AnalysisEngine::Keywords, None, stats));
    };

    let engine = AnalysisEngine::Llm {
        provider: provider.name.clone(),
        model: provider.model.clone(),
    };
    let style = config.effective_style();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or_else(|| prompts::system_prompt(style));
    let user_prompt = prompts::build_user_prompt(request, notes);

    if let Some(ref cb) = config.progress_callback {
        cb.on_llm_start(&engine.to_string(), stats.input_chars);
    }

    let completion = llm::complete(
        &provider.provider,
        &provider.name,
        system_prompt,
        &user_prompt,
        config,
    )
    .await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_llm_complete(completion.content.chars().count());
    }

    let analysis = parse::parse_response(&completion.content, style);
    if analysis.is_empty() && !completion.content.trim().is_empty() {
        warn!(
            "Model reply did not follow the {:?} layout; no items recognised",
            style
        );
    }

    stats.input_tokens = completion.input_tokens;
    stats.output_tokens = completion.output_tokens;
    stats.llm_duration_ms = completion.duration_ms;

    Ok(report_for(
        request,
        analysis,
        engine,
        Some(completion.content),
        stats,
    ))
}

fn report_for(
    request: &AnalysisRequest,
    analysis: Analysis,
    engine: AnalysisEngine,
    raw_response: Option<String>,
    stats: AnalysisStats,
) -> AnalysisReport {
    AnalysisReport {
        request: request.clone(),
        analysis,
        engine,
        sources: Vec::new(),
        source_errors: Vec::new(),
        raw_response,
        stats,
    }
}

fn finish(report: &AnalysisReport, config: &AnalysisConfig) {
    let a = &report.analysis;
    info!(
        "Analysis complete with {}: {} user, {} admin, {} compatibility, {}ms",
        report.engine,
        a.user.len(),
        a.admin.len(),
        a.compatibility.len(),
        report.stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_complete(a.user.len(), a.admin.len(), a.compatibility.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptStyle;
    use crate::output::Importance;
    use crate::progress::AnalysisProgressCallback;
    use edgequake_llm::MockProvider;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl AnalysisProgressCallback for Events {
        fn on_llm_start(&self, engine: &str, _input_chars: usize) {
            self.0.lock().unwrap().push(format!("llm:{engine}"));
        }
        fn on_llm_complete(&self, response_chars: usize) {
            self.0.lock().unwrap().push(format!("reply:{response_chars}"));
        }
        fn on_analysis_complete(&self, user: usize, admin: usize, compatibility: usize) {
            self.0
                .lock()
                .unwrap()
                .push(format!("done:{user}/{admin}/{compatibility}"));
        }
    }

    fn keyword_config(events: Arc<Events>) -> AnalysisConfig {
        AnalysisConfig::builder()
            .backend(Backend::Keywords)
            .progress_callback(events)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn text_analysis_with_keywords() {
        let events = Arc::new(Events::default());
        let config = keyword_config(events.clone());
        let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0");
        let notes = "Version 9.2.0\nNew Duplicate feature.\nVersion 9.6.0\nSecurity fix. Requires Jira 11.0.0.";

        let report = analyze_text(notes, &request, &config).await.unwrap();
        assert_eq!(report.engine, AnalysisEngine::Keywords);
        assert!(report.raw_response.is_none());
        assert_eq!(report.analysis.user.len(), 1);
        assert_eq!(report.analysis.admin.len(), 1);
        assert_eq!(report.analysis.compatibility.len(), 1);
        assert_eq!(report.stats.sources_ok, 1);
        assert_eq!(report.stats.input_chars, notes.chars().count());

        let seen = events.0.lock().unwrap().clone();
        assert_eq!(seen, vec!["done:1/1/1".to_string()]);
    }

    #[tokio::test]
    async fn blank_text_is_no_content() {
        let config = keyword_config(Arc::new(Events::default()));
        let err = analyze_text("  \n", &AnalysisRequest::default(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RelnotesError::NoContent { .. }));
    }

    #[tokio::test]
    async fn input_chars_respect_limit() {
        let config = AnalysisConfig::builder()
            .backend(Backend::Keywords)
            .max_input_chars(10)
            .build()
            .unwrap();
        let report = analyze_text("Version 1.0.0 new feature", &AnalysisRequest::default(), &config)
            .await
            .unwrap();
        assert_eq!(report.stats.input_chars, 10);
    }

    const SECTIONED_REPLY: &str = "Admin Changes:
Security Improvements:
• Version 9.6.0 fixes a critical vulnerability in the admin console

User Changes:
• Version 9.2.0 adds a Duplicate action for Fragments

Compatibility Warnings:
• Version 10.1.0 removes the deprecated REST endpoint
";

    const FLAT_REPLY: &str = "New Features:
- Duplicate action for Fragments (Version 9.2.0)

Bugs Fixed:
- None

Compatibility Issues and Breaking Changes:
- Deprecated REST endpoint removed (Version 10.1.0)

Other Noteworthy Changes:
- Security update for the admin console (Version 9.6.0)
";

    async fn mock_config(reply: &str, style: PromptStyle, events: Arc<Events>) -> AnalysisConfig {
        let mock = MockProvider::new();
        mock.add_response(reply).await;
        AnalysisConfig::builder()
            .provider(Arc::new(mock))
            .model("mock-model")
            .prompt_style(style)
            .progress_callback(events)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn injected_provider_sectioned_reply() {
        let events = Arc::new(Events::default());
        let config = mock_config(SECTIONED_REPLY, PromptStyle::Sectioned, events.clone()).await;
        let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0");

        let report = analyze_text("Version 9.2.0\nDuplicate action.", &request, &config)
            .await
            .unwrap();

        assert_eq!(
            report.engine,
            AnalysisEngine::Llm {
                provider: "custom".into(),
                model: "mock-model".into()
            }
        );
        assert_eq!(report.raw_response.as_deref(), Some(SECTIONED_REPLY));
        let a = &report.analysis;
        assert_eq!(a.admin.len(), 1);
        assert_eq!(a.admin[0].category, "Security Improvements");
        assert_eq!(a.admin[0].version, "9.6.0");
        assert_eq!(a.admin[0].importance, Importance::Major);
        assert_eq!(a.user.len(), 1);
        assert_eq!(a.user[0].version, "9.2.0");
        assert_eq!(a.compatibility.len(), 1);

        let seen = events.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "llm:custom/mock-model".to_string(),
                format!("reply:{}", SECTIONED_REPLY.chars().count()),
                "done:1/1/1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn injected_provider_flat_reply() {
        let config = mock_config(FLAT_REPLY, PromptStyle::Flat, Arc::new(Events::default())).await;
        let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0");

        let report = analyze_text("Version 9.2.0\nDuplicate action.", &request, &config)
            .await
            .unwrap();

        let a = &report.analysis;
        assert_eq!(a.user.len(), 1);
        assert_eq!(a.user[0].category, "New Features");
        assert_eq!(a.user[0].version, "9.2.0");
        assert_eq!(a.admin.len(), 2);
        assert_eq!(a.admin[0].category, "Breaking Changes");
        assert_eq!(a.admin[0].importance, Importance::Major);
        assert_eq!(a.admin[1].category, "Other Changes");
        assert_eq!(a.admin[1].version, "9.6.0");
        assert!(a.compatibility.is_empty());
    }

    #[tokio::test]
    async fn truncation_keeps_char_boundaries() {
        let config = AnalysisConfig::builder()
            .backend(Backend::Keywords)
            .max_input_chars(4)
            .build()
            .unwrap();
        let report = analyze_text("Überblick 9.1.0", &AnalysisRequest::default(), &config)
            .await
            .unwrap();
        assert_eq!(report.stats.input_chars, 4);
    }
}
