//! CLI binary for relnotes-analyzer.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints or exports the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use relnotes_analyzer::export::{self, ExportFormat};
use relnotes_analyzer::{
    analyze, extract, list_ollama_models, AnalysisConfig, AnalysisProgressCallback,
    AnalysisReport, AnalysisRequest, Backend, Bucket, Importance, ProgressCallback, PromptStyle,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn badge(importance: Importance) -> String {
    match importance {
        Importance::Major => "\x1b[30;43m major \x1b[0m".to_string(),
        Importance::Minor => "\x1b[30;44m minor \x1b[0m".to_string(),
    }
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner line plus a log line per source.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Checking backend…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_sources: usize) {
        self.bar.set_prefix("Reading");
        self.bar.set_message(format!("{total_sources} source(s)…"));
    }

    fn on_source_start(&self, origin: &str) {
        self.bar.set_message(origin.to_string());
    }

    fn on_source_complete(&self, origin: &str, chars: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            origin,
            dim(&format!("{chars} chars"))
        ));
    }

    fn on_source_error(&self, origin: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), origin, red(&msg)));
    }

    fn on_llm_start(&self, engine: &str, input_chars: usize) {
        self.bar.set_prefix("Analysing");
        self.bar
            .set_message(format!("{engine}  {}", dim(&format!("{input_chars} chars in"))));
    }

    fn on_llm_complete(&self, response_chars: usize) {
        self.bar.println(format!(
            "  {} model replied  {}",
            green("✓"),
            dim(&format!("{response_chars} chars"))
        ));
    }

    fn on_analysis_complete(&self, user: usize, admin: usize, compatibility: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        eprintln!(
            "{} {} user, {} admin, {} compatibility{}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&user.to_string()),
            bold(&admin.to_string()),
            bold(&compatibility.to_string()),
            if failed == 0 {
                String::new()
            } else {
                red(&format!("  ({failed} source(s) failed)"))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse one release-notes page with OpenAI (terminal output)
  relnotes --plugin ScriptRunner --url https://docs.adaptavist.com/sr4js/latest/release-notes

  # Several pages, custom Jira versions, Markdown report
  relnotes --plugin "Power Scripts" --from 9.12.0 --to 10.3.0 \
      --url https://example.com/notes-9 --url https://example.com/notes-10 \
      --format markdown -o reports/

  # Local PDF with a local Ollama model, PDF report
  relnotes --plugin Tempo --pdf tempo-notes.pdf --backend ollama --model llama3.2 --format pdf

  # No model at all: keyword heuristics
  relnotes --plugin Tempo --pdf tempo-notes.pdf --backend keywords

  # Just show the text that would be analysed
  relnotes --url https://example.com/notes --extract-only

  # Which models does the local Ollama server have?
  relnotes --list-models

BACKENDS:
  auto       OpenAI when OPENAI_API_KEY is set, else EDGEQUAKE_LLM_PROVIDER /
             EDGEQUAKE_MODEL, else whatever edgequake-llm detects
  openai     OpenAI chat completions (default model gpt-4-turbo-preview)
  ollama     Local Ollama server at OLLAMA_HOST (default model mistral)
  keywords   Offline keyword matching, no model

ENVIRONMENT VARIABLES (also read from a .env file):
  OPENAI_API_KEY          OpenAI API key
  OLLAMA_HOST             Ollama address (default http://localhost:11434)
  EDGEQUAKE_LLM_PROVIDER  Provider for the auto backend (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
"#;

/// Summarise Jira plugin release notes into user, admin and compatibility changes.
#[derive(Parser, Debug)]
#[command(
    name = "relnotes",
    version,
    about = "Summarise Jira plugin release notes into user, admin and compatibility changes",
    long_about = "Fetch plugin release notes (web pages or a PDF), have an LLM pick out the changes \
that matter for a Jira Data Center upgrade, and print them or export a Markdown, HTML, PDF or \
JSON report. Works with OpenAI, a local Ollama server, or offline keyword matching.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Plugin name shown in reports.
    #[arg(long, env = "RELNOTES_PLUGIN", default_value = "")]
    plugin: String,

    /// Installed plugin version (recorded in the report).
    #[arg(long, env = "RELNOTES_PLUGIN_VERSION_FROM")]
    plugin_version_from: Option<String>,

    /// Plugin version being upgraded to (recorded in the report).
    #[arg(long, env = "RELNOTES_PLUGIN_VERSION_TO")]
    plugin_version_to: Option<String>,

    /// Current Jira Data Center version.
    #[arg(long = "from", env = "RELNOTES_JIRA_FROM", default_value = "9.4.0")]
    jira_from: String,

    /// Target Jira Data Center version.
    #[arg(long = "to", env = "RELNOTES_JIRA_TO", default_value = "10.3.0")]
    jira_to: String,

    /// Release-notes URL; repeat for several pages.
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Local release-notes PDF.
    #[arg(long, env = "RELNOTES_PDF")]
    pdf: Option<PathBuf>,

    /// Password for an encrypted PDF.
    #[arg(long, env = "RELNOTES_PDF_PASSWORD")]
    pdf_password: Option<String>,

    /// Analysis backend.
    #[arg(long, env = "RELNOTES_BACKEND", value_enum, default_value = "auto")]
    backend: BackendArg,

    /// LLM model ID (e.g. gpt-4o-mini, mistral, llama3.2).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Prompt layout; defaults to flat for ollama, sectioned otherwise.
    #[arg(long, env = "RELNOTES_STYLE", value_enum)]
    style: Option<StyleArg>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "RELNOTES_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Ollama server address.
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    ollama_host: String,

    /// Output format.
    #[arg(long, env = "RELNOTES_FORMAT", value_enum, default_value = "terminal")]
    format: FormatArg,

    /// Output file or directory. A directory gets `{plugin}_analysis.{ext}`.
    #[arg(short, long, env = "RELNOTES_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the extracted release-note text and stop.
    #[arg(long)]
    extract_only: bool,

    /// List the models of the Ollama server and stop.
    #[arg(long)]
    list_models: bool,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "RELNOTES_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "RELNOTES_MAX_TOKENS", default_value_t = 2000)]
    max_tokens: usize,

    /// Retries on LLM failure.
    #[arg(long, env = "RELNOTES_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Cut the release notes to this many characters before analysis.
    #[arg(long, env = "RELNOTES_MAX_INPUT_CHARS")]
    max_input_chars: Option<usize>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RELNOTES_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "RELNOTES_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Do not transcribe image-only PDF pages with the model.
    #[arg(long, env = "RELNOTES_NO_VISION")]
    no_vision: bool,

    /// Disable progress output.
    #[arg(long, env = "RELNOTES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RELNOTES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the report.
    #[arg(short, long, env = "RELNOTES_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Auto,
    Openai,
    Ollama,
    Keywords,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Auto => Backend::Auto,
            BackendArg::Openai => Backend::OpenAi,
            BackendArg::Ollama => Backend::Ollama,
            BackendArg::Keywords => Backend::Keywords,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StyleArg {
    Sectioned,
    Flat,
}

impl From<StyleArg> for PromptStyle {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Sectioned => PromptStyle::Sectioned,
            StyleArg::Flat => PromptStyle::Flat,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Terminal,
    Markdown,
    Pdf,
    Html,
    Json,
}

impl FormatArg {
    fn export_format(self) -> Option<ExportFormat> {
        match self {
            FormatArg::Terminal => None,
            FormatArg::Markdown => Some(ExportFormat::Markdown),
            FormatArg::Pdf => Some(ExportFormat::Pdf),
            FormatArg::Html => Some(ExportFormat::Html),
            FormatArg::Json => Some(ExportFormat::Json),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.list_models && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Model listing ────────────────────────────────────────────────────
    if cli.list_models {
        let models = list_ollama_models(&cli.ollama_host, cli.download_timeout)
            .await
            .context("Failed to list Ollama models")?;
        if models.is_empty() {
            eprintln!("No models pulled on {}. Try: ollama pull mistral", cli.ollama_host);
        }
        for m in models {
            println!("{m}");
        }
        return Ok(());
    }

    let export_format = resolve_format(cli.format, cli.output.as_deref());

    // ── Ensure PDFium engine is available ───────────────────────────────────
    // Only PDF input and PDF export need it; a PDF behind a URL binds lazily.
    let needs_pdfium = cli.pdf.is_some() || export_format == Some(ExportFormat::Pdf);
    if needs_pdfium {
        ensure_pdfium(cli.quiet)?;
    }

    let request = build_request(&cli);

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let gathered = extract(&request, &config)
            .await
            .context("Failed to read release notes")?;
        if cli.format == FormatArg::Json {
            let json = serde_json::to_string_pretty(&gathered.sources)
                .context("Failed to serialise sources")?;
            println!("{json}");
        } else {
            println!("{}", gathered.notes(config.max_input_chars));
        }
        for e in &gathered.errors {
            eprintln!("{} {}", red("✗"), e);
        }
        return Ok(());
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let report = analyze(&request, &config)
        .await
        .context("Analysis failed")?;

    match export_format {
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(render_terminal(&report).as_bytes())
                .context("Failed to write to stdout")?;
        }
        Some(_) if report.analysis.is_empty() => {
            eprintln!(
                "{} No changes found in the release notes; nothing to export.",
                cyan("⚠")
            );
        }
        Some(format) => export_report(&cli, &report, format).await?,
    }

    if !cli.quiet {
        let s = &report.stats;
        eprintln!(
            "   {}  {} tokens in  /  {} tokens out  ·  {}ms total",
            dim(&report.engine.to_string()),
            dim(&s.input_tokens.to_string()),
            dim(&s.output_tokens.to_string()),
            s.total_duration_ms,
        );
    }

    Ok(())
}

/// `--format terminal` with `-o file.ext` means "export as ext".
fn resolve_format(format: FormatArg, output: Option<&Path>) -> Option<ExportFormat> {
    if format != FormatArg::Terminal {
        return format.export_format();
    }
    let output = output?;
    let by_extension = output
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse::<ExportFormat>().ok());
    Some(by_extension.unwrap_or(ExportFormat::Markdown))
}

#[cfg(feature = "bundled")]
fn ensure_pdfium(_quiet: bool) -> Result<()> {
    tokio::task::block_in_place(pdfium_auto::ensure_pdfium_bundled)
        .context("Failed to extract bundled PDFium engine")?;
    Ok(())
}

#[cfg(not(feature = "bundled"))]
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

fn build_request(cli: &Cli) -> AnalysisRequest {
    let mut request = AnalysisRequest::new(&cli.plugin, &cli.jira_from, &cli.jira_to);
    request.plugin_from = cli.plugin_version_from.clone();
    request.plugin_to = cli.plugin_version_to.clone();
    request.urls = cli.urls.clone();
    request.pdf = cli.pdf.clone();
    request
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .backend(cli.backend.into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .vision_fallback(!cli.no_vision)
        .ollama_host(cli.ollama_host.clone());

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(style) = cli.style {
        builder = builder.prompt_style(style.into());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref pwd) = cli.pdf_password {
        builder = builder.pdf_password(pwd.clone());
    }
    if let Some(max) = cli.max_input_chars {
        builder = builder.max_input_chars(max);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write the report to `-o`, or to stdout for text formats without `-o`.
async fn export_report(cli: &Cli, report: &AnalysisReport, format: ExportFormat) -> Result<()> {
    let generated_at = chrono::Local::now();
    let bytes = if format == ExportFormat::Pdf {
        let owned = report.clone();
        tokio::task::spawn_blocking(move || export::render(&owned, format, &generated_at))
            .await
            .context("PDF export task failed")??
    } else {
        export::render(report, format, &generated_at)?
    };

    let file_name = export::default_file_name(report.request.display_name(), format.extension());
    let path = match cli.output {
        Some(ref out) => export::output_path(out, &file_name),
        None if format == ExportFormat::Pdf => PathBuf::from(&file_name),
        None => {
            io::stdout()
                .lock()
                .write_all(&bytes)
                .context("Failed to write to stdout")?;
            return Ok(());
        }
    };

    export::write_report(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    if !cli.quiet {
        eprintln!(
            "{} {} report  →  {}",
            green("✔"),
            format.extension(),
            bold(&path.display().to_string())
        );
    }
    Ok(())
}

/// Coloured three-bucket summary for the terminal.
fn render_terminal(report: &AnalysisReport) -> String {
    let req = &report.request;
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n{}\n",
        bold(&format!("{} Release Notes Analysis", req.display_name())),
        dim(&format!(
            "Jira {} → {}",
            req.current_version, req.target_version
        ))
    ));

    for (bucket, icon) in [(Bucket::User, "👤"), (Bucket::Admin, "⚙️")] {
        out.push_str(&format!("\n{}\n", bold(&format!("{icon} {}", bucket.title()))));
        let groups = report.analysis.grouped(bucket);
        if groups.is_empty() {
            out.push_str(&format!("  {}\n", dim("none")));
        }
        for (category, changes) in groups {
            if category != relnotes_analyzer::output::GENERAL_CATEGORY {
                out.push_str(&format!("  {}\n", cyan(category)));
            }
            for change in changes {
                out.push_str(&format!("    {} {}\n", badge(change.importance), change.text));
            }
        }
    }

    out.push_str(&format!(
        "\n{}\n",
        bold(&format!("⚠️ {}", Bucket::Compatibility.title()))
    ));
    if report.analysis.compatibility.is_empty() {
        out.push_str(&format!("  {}\n", dim("none")));
    }
    for warning in &report.analysis.compatibility {
        out.push_str(&format!("  {}\n", red(&warning.text)));
    }

    if !report.source_errors.is_empty() {
        out.push('\n');
        for e in &report.source_errors {
            out.push_str(&format!("{}\n", dim(&e.to_string())));
        }
    }
    out
}
