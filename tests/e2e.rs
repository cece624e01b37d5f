//! End-to-end integration tests for relnotes-analyzer.
//!
//! The first group serves release notes from a local wiremock server and uses
//! the keyword engine, so it always runs. The live group calls a real LLM
//! provider and is gated behind the `E2E_ENABLED` environment variable.
//!
//! Run the live tests with:
//!   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_live_openai -- --nocapture

use relnotes_analyzer::export::{render_html, render_markdown};
use relnotes_analyzer::{
    analyze, analyze_to_file, extract, AnalysisConfig, AnalysisEngine, AnalysisProgressCallback,
    AnalysisRequest, Backend, ExportFormat, RelnotesError, SourceError, SourceKind,
};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const NOTES_HTML: &str = r#"<!DOCTYPE html>
<html><head><title>Release notes</title>
<script>var tracking = "Version 0.0.1";</script>
<style>h2 { color: red; }</style></head>
<body>
<nav>Docs &gt; ScriptRunner</nav>
<h2>Version 9.2.0</h2>
<p>New Duplicate feature for Fragments in the editor.</p>
<h2>Version 9.6.0</h2>
<p>Security fix for the admin console. Requires Jira 11.0.0.</p>
<h2>Version 10.1.0</h2>
<p>Removed the deprecated REST endpoint; this is a breaking change.</p>
</body></html>"#;

fn keyword_config() -> AnalysisConfig {
    AnalysisConfig::builder()
        .backend(Backend::Keywords)
        .download_timeout_secs(5)
        .build()
        .expect("builder must succeed")
}

async fn notes_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/release-notes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(NOTES_HTML, "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("Version 9.8.0\nNew dark theme for the issue view."),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

/// Skip this test unless E2E_ENABLED and the named env var are both set.
macro_rules! e2e_skip_unless_ready {
    ($var:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match std::env::var($var) {
            Ok(v) => v,
            Err(_) => {
                println!("SKIP — {} is not set", $var);
                return;
            }
        }
    }};
}

// ── Keyword engine over HTTP (always run) ────────────────────────────────────

#[tokio::test]
async fn test_keyword_analysis_of_html_page() {
    let server = notes_server().await;
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));

    let report = analyze(&request, &keyword_config())
        .await
        .expect("analysis must succeed");

    assert_eq!(report.engine, AnalysisEngine::Keywords);
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].kind, SourceKind::Html);
    assert!(!report.sources[0].text.contains("tracking"));
    assert!(!report.sources[0].text.contains("color: red"));

    let a = &report.analysis;
    assert!(a
        .user
        .iter()
        .any(|c| c.version == "9.2.0" && c.text.contains("Duplicate feature")));
    assert!(a.admin.iter().any(|c| c.version == "9.6.0"));
    let warnings: Vec<&str> = a.compatibility.iter().map(|w| w.text.as_str()).collect();
    assert!(warnings.contains(&"This version requires Jira 11.0.0 or higher"));
    assert!(warnings.contains(&"Contains breaking changes"));
    assert!(warnings.contains(&"Contains deprecated features"));
    assert_eq!(report.stats.sources_ok, 1);
    assert_eq!(report.stats.sources_failed, 0);
}

#[tokio::test]
async fn test_failed_source_is_reported_not_fatal() {
    let server = notes_server().await;
    let missing = format!("{}/missing", server.uri());
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(missing.clone())
        .with_url(format!("{}/plain.txt", server.uri()));

    let report = analyze(&request, &keyword_config())
        .await
        .expect("one readable source is enough");

    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].kind, SourceKind::Text);
    assert_eq!(report.source_errors.len(), 1);
    assert_eq!(report.source_errors[0].origin(), missing);
    assert!(matches!(
        report.source_errors[0],
        SourceError::FetchFailed { .. }
    ));
    assert_eq!(report.stats.sources_failed, 1);
}

#[tokio::test]
async fn test_all_sources_failing_is_no_content() {
    let server = notes_server().await;
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/missing", server.uri()));

    let err = analyze(&request, &keyword_config())
        .await
        .expect_err("nothing readable");
    match err {
        RelnotesError::NoContent { detail } => assert!(detail.contains("/missing")),
        other => panic!("expected NoContent, got {other:?}"),
    }
}

#[tokio::test]
async fn test_extract_keeps_source_order() {
    let server = notes_server().await;
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/plain.txt", server.uri()))
        .with_url(format!("{}/release-notes", server.uri()));

    let gathered = extract(&request, &keyword_config()).await.unwrap();
    assert_eq!(gathered.sources.len(), 2);
    assert!(gathered.sources[0].origin.ends_with("/plain.txt"));
    assert!(gathered.sources[1].origin.ends_with("/release-notes"));

    let notes = gathered.notes(None);
    let dark = notes.find("dark theme").unwrap();
    let duplicate = notes.find("Duplicate feature").unwrap();
    assert!(dark < duplicate);
}

#[tokio::test]
async fn test_reports_render_from_live_analysis() {
    let server = notes_server().await;
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));
    let report = analyze(&request, &keyword_config()).await.unwrap();
    let now = chrono::Local::now();

    let md = render_markdown(&report, &now);
    assert!(md.starts_with("# ScriptRunner Release Notes Analysis\n"));
    assert!(md.contains("## 👤 User Changes"));
    assert!(md.contains("## ⚙️ Admin Changes"));
    assert!(md.contains("⚠️ This version requires Jira 11.0.0 or higher"));

    let html = render_html(&report, &now);
    assert!(html.contains("<h1>ScriptRunner Release Notes Analysis</h1>"));
    assert!(html.contains("Contains breaking changes"));
}

#[tokio::test]
async fn test_analyze_to_file_writes_markdown() {
    let server = notes_server().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("reports/ScriptRunner_analysis.md");
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));

    let report = analyze_to_file(&request, &keyword_config(), &out, ExportFormat::Markdown)
        .await
        .unwrap();

    assert!(!report.analysis.is_empty());
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("## ⚠️ Compatibility Warnings"));
}

#[tokio::test]
async fn test_empty_analysis_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty-ish"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("Thanks for using our plugin."),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.json");
    let request = AnalysisRequest::new("Tempo", "9.4.0", "10.3.0")
        .with_url(format!("{}/empty-ish", server.uri()));

    let report = analyze_to_file(&request, &keyword_config(), &out, ExportFormat::Json)
        .await
        .unwrap();
    assert!(report.analysis.is_empty());
    assert!(!out.exists());
}

// ── Input validation (always run) ────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_url_does_not_stop_valid_one() {
    let server = notes_server().await;
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()))
        .with_url("docs.example.com/notes");

    let report = analyze(&request, &keyword_config())
        .await
        .expect("the valid URL is analysed");

    assert_eq!(report.sources.len(), 1);
    assert!(!report.analysis.is_empty());
    assert_eq!(report.source_errors.len(), 1);
    assert!(matches!(
        report.source_errors[0],
        SourceError::InvalidUrl { .. }
    ));
}

#[tokio::test]
async fn test_missing_pdf_does_not_stop_url() {
    let server = notes_server().await;
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/plain.txt", server.uri()))
        .with_pdf("/nonexistent/notes.pdf");

    let report = analyze(&request, &keyword_config())
        .await
        .expect("the URL is analysed");

    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.source_errors.len(), 1);
    assert_eq!(report.source_errors[0].origin(), "/nonexistent/notes.pdf");
    assert_eq!(report.stats.sources_failed, 1);
}

#[tokio::test]
async fn test_missing_pdf_alone_is_no_content() {
    let request =
        AnalysisRequest::new("Tempo", "9.4.0", "10.3.0").with_pdf("/nonexistent/notes.pdf");
    let err = analyze(&request, &keyword_config()).await.unwrap_err();
    match err {
        RelnotesError::NoContent { detail } => assert!(detail.contains("/nonexistent/notes.pdf")),
        other => panic!("expected NoContent, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_without_sources_is_no_content() {
    let request = AnalysisRequest::new("Tempo", "9.4.0", "10.3.0").with_url("   ");
    let err = analyze(&request, &keyword_config()).await.unwrap_err();
    assert!(matches!(err, RelnotesError::NoContent { .. }));
}

// ── Callback API (always run) ────────────────────────────────────────────────

#[tokio::test]
async fn test_callback_sees_every_source() {
    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    impl AnalysisProgressCallback for Recorder {
        fn on_analysis_start(&self, total_sources: usize) {
            self.log.lock().unwrap().push(format!("start:{total_sources}"));
        }
        fn on_source_complete(&self, _origin: &str, _chars: usize) {
            self.log.lock().unwrap().push("ok".to_string());
        }
        fn on_source_error(&self, _origin: &str, _error: &str) {
            self.log.lock().unwrap().push("err".to_string());
        }
    }

    let server = notes_server().await;
    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::builder()
        .backend(Backend::Keywords)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()))
        .with_url(format!("{}/missing", server.uri()));

    analyze(&request, &config).await.unwrap();

    let mut log = recorder.log.lock().unwrap().clone();
    assert_eq!(log.remove(0), "start:2");
    log.sort();
    assert_eq!(log, vec!["err", "ok"]);
}

// ── Ollama backend over HTTP (always run) ────────────────────────────────────

const OLLAMA_FLAT_REPLY: &str = "New Features:
- Duplicate action for Fragments (Version 9.2.0)

Bugs Fixed:
- None

Compatibility Issues:
- Requires Jira 11.0.0 (Version 9.6.0)
";

#[tokio::test]
async fn test_ollama_backend_uses_configured_host() {
    let server = notes_server().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{ "name": "mistral:latest" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "mistral",
            "message": { "role": "assistant", "content": OLLAMA_FLAT_REPLY },
            "done": true,
            "prompt_eval_count": 812,
            "eval_count": 64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = AnalysisConfig::builder()
        .backend(Backend::Ollama)
        .model("mistral")
        .ollama_host(format!("{}/", server.uri()))
        .download_timeout_secs(5)
        .build()
        .unwrap();
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));

    let report = analyze(&request, &config).await.expect("ollama analysis");

    assert_eq!(
        report.engine,
        AnalysisEngine::Llm {
            provider: "ollama".into(),
            model: "mistral".into()
        }
    );
    assert_eq!(report.stats.input_tokens, 812);
    assert_eq!(report.stats.output_tokens, 64);
    assert_eq!(report.analysis.user.len(), 1);
    assert_eq!(report.analysis.compatibility.len(), 1);

    let chat = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .find(|r| r.url.path() == "/api/chat")
        .expect("chat request reached the configured host");
    let body: serde_json::Value = chat.body_json().unwrap();
    assert_eq!(body["model"], "mistral");
    assert!(body["messages"][1]["content"]
        .as_str()
        .unwrap_or_default()
        .contains("Duplicate feature for Fragments"));
}

// ── Live LLM tests (gated) ───────────────────────────────────────────────────

/// Gated e2e: analyse a local release-notes page with OpenAI.
///
/// Run:
///   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test e2e test_live_openai -- --nocapture
#[tokio::test]
async fn test_live_openai_sectioned_analysis() {
    let _key = e2e_skip_unless_ready!("OPENAI_API_KEY");
    let server = notes_server().await;
    let config = AnalysisConfig::builder()
        .backend(Backend::OpenAi)
        .model(std::env::var("EDGEQUAKE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()))
        .build()
        .unwrap();
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));

    let report = analyze(&request, &config).await.expect("live analysis");
    println!(
        "--- BEGIN REPLY ---\n{}\n--- END REPLY ---",
        report.raw_response.as_deref().unwrap_or("")
    );
    assert!(matches!(report.engine, AnalysisEngine::Llm { .. }));
    assert!(!report.analysis.is_empty());
    assert!(report.stats.output_tokens > 0);
}

/// Gated e2e: analyse with a local Ollama model using the flat layout.
///
/// Run:
///   E2E_ENABLED=1 OLLAMA_MODEL=mistral cargo test --test e2e test_live_ollama -- --nocapture
#[tokio::test]
async fn test_live_ollama_flat_analysis() {
    let model = e2e_skip_unless_ready!("OLLAMA_MODEL");
    let server = notes_server().await;
    let config = AnalysisConfig::builder()
        .backend(Backend::Ollama)
        .model(model)
        .build()
        .unwrap();
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));

    match analyze(&request, &config).await {
        Ok(report) => {
            println!("{:#?}", report.analysis);
            assert!(matches!(report.engine, AnalysisEngine::Llm { .. }));
        }
        Err(RelnotesError::OllamaUnavailable { host, reason }) => {
            println!("SKIP — Ollama not reachable at {host}: {reason}");
        }
        Err(e) => panic!("unexpected error: {e}"),
    }
}

/// Gated e2e: export a PDF report through pdfium.
#[tokio::test(flavor = "multi_thread")]
async fn test_live_pdf_export() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let server = notes_server().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("ScriptRunner_analysis.pdf");
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));

    analyze_to_file(&request, &keyword_config(), &out, ExportFormat::Pdf)
        .await
        .expect("pdf export");
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

/// Gated e2e: read a PDF back as release-note input, both through
/// `extract_text` and through a full keyword analysis.
#[tokio::test(flavor = "multi_thread")]
async fn test_live_pdf_input() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let server = notes_server().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("notes.pdf");
    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
        .with_url(format!("{}/release-notes", server.uri()));
    analyze_to_file(&request, &keyword_config(), &pdf_path, ExportFormat::Pdf)
        .await
        .expect("pdf export");

    let bytes = std::fs::read(&pdf_path).unwrap();
    let extracted =
        relnotes_analyzer::pipeline::pdf::extract_text(bytes, "notes.pdf", None, false, 2000)
            .await
            .expect("pdf text extraction");
    assert!(extracted.page_count >= 1);
    let text = extracted.joined_text();
    assert!(text.contains("ScriptRunner"), "got: {text}");

    let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0").with_pdf(&pdf_path);
    let gathered = extract(&request, &keyword_config()).await.expect("pdf source");
    assert_eq!(gathered.sources.len(), 1);
    assert_eq!(gathered.sources[0].kind, SourceKind::Pdf);
    assert_eq!(gathered.sources[0].pages, Some(extracted.page_count));
    assert!(gathered.errors.is_empty());
}
