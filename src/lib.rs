//! # relnotes-analyzer
//!
//! Summarise Jira plugin release notes before an upgrade: what changes for
//! users, what changes for administrators, and what might break.
//!
//! ## Why this crate?
//!
//! Upgrading a Jira Data Center instance means reading the release notes of
//! every installed plugin across many versions. This crate fetches those
//! notes (web pages or PDFs), asks an LLM to sort the relevant changes into
//! three buckets, and renders the result as a terminal summary or a Markdown,
//! HTML, PDF or JSON report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URLs / PDF
//!  │
//!  ├─ 1. Input    fetch pages, read the PDF (per-source errors are non-fatal)
//!  ├─ 2. Text     strip HTML, extract the PDF text layer, transcribe scans
//!  ├─ 3. Prompt   system prompt per style + filled user prompt
//!  ├─ 4. LLM      one chat completion (OpenAI, Ollama, …) with retry
//!  ├─ 5. Parse    reply → user / admin / compatibility buckets
//!  └─ 6. Export   Markdown, HTML, PDF, JSON
//! ```
//!
//! Without a model, `Backend::Keywords` replaces steps 3–5 with keyword
//! heuristics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relnotes_analyzer::{analyze, AnalysisConfig, AnalysisRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER
//!     let config = AnalysisConfig::default();
//!     let request = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0")
//!         .with_url("https://docs.adaptavist.com/sr4js/latest/release-notes");
//!     let report = analyze(&request, &config).await?;
//!     for warning in &report.analysis.compatibility {
//!         println!("⚠️ {}", warning.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `relnotes` binary (clap + anyhow + tracing-subscriber + indicatif + dotenv) |
//! | `bundled` | off     | Embeds the pdfium library in the binary instead of downloading it on first use |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_sync, analyze_text, analyze_to_file, extract};
pub use backend::{list_ollama_models, resolve_provider, ResolvedProvider};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, Backend, PromptStyle};
pub use error::{RelnotesError, SourceError};
pub use export::{default_file_name, output_path, write_report, ExportFormat};
pub use output::{
    Analysis, AnalysisEngine, AnalysisReport, AnalysisRequest, AnalysisStats, Bucket, Change,
    Importance, SourceKind, SourceText, Warning,
};
pub use pipeline::input::Gathered;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
