//! Result types: the request, the three-bucket analysis and the final report.

use crate::error::SourceError;
use serde::{Deserialize, Serialize};

/// Jira version assumed when the caller does not supply one.
pub const DEFAULT_CURRENT_VERSION: &str = "9.4.0";
/// Jira version targeted when the caller does not supply one.
pub const DEFAULT_TARGET_VERSION: &str = "10.3.0";
/// Display name used when the plugin name is left blank.
pub const UNKNOWN_PLUGIN: &str = "Unknown Plugin";
/// Category for items the model did not put under a sub-heading.
pub const GENERAL_CATEGORY: &str = "General";
/// Version recorded when no version number could be found in an item.
pub const UNKNOWN_VERSION: &str = "N/A";

/// What to analyse: plugin metadata plus the release-note sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Plugin display name.
    pub plugin_name: String,
    /// Jira version currently installed.
    pub current_version: String,
    /// Jira version being upgraded to.
    pub target_version: String,
    /// Installed plugin version, if known. Shown in reports only.
    pub plugin_from: Option<String>,
    /// Plugin version being upgraded to, if known. Shown in reports only.
    pub plugin_to: Option<String>,
    /// Release-note pages, fetched in order.
    pub urls: Vec<String>,
    /// Local release-note PDF.
    pub pdf: Option<std::path::PathBuf>,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            plugin_name: String::new(),
            current_version: DEFAULT_CURRENT_VERSION.to_string(),
            target_version: DEFAULT_TARGET_VERSION.to_string(),
            plugin_from: None,
            plugin_to: None,
            urls: Vec::new(),
            pdf: None,
        }
    }
}

impl AnalysisRequest {
    /// Create a request for `plugin_name` between two Jira versions.
    pub fn new(
        plugin_name: impl Into<String>,
        current_version: impl Into<String>,
        target_version: impl Into<String>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            current_version: current_version.into(),
            target_version: target_version.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    pub fn with_pdf(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.pdf = Some(path.into());
        self
    }

    /// Plugin name, or [`UNKNOWN_PLUGIN`] when blank.
    pub fn display_name(&self) -> &str {
        let name = self.plugin_name.trim();
        if name.is_empty() {
            UNKNOWN_PLUGIN
        } else {
            name
        }
    }

    /// URLs with blank entries removed.
    pub fn non_empty_urls(&self) -> Vec<&str> {
        self.urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .collect()
    }
}

/// Whether a change deserves attention before the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Major,
    Minor,
}

impl Importance {
    /// Major when `text` mentions any of `keywords` (case-insensitive).
    pub fn from_keywords(text: &str, keywords: &[&str]) -> Self {
        let lower = text.to_lowercase();
        if keywords.iter().any(|k| lower.contains(k)) {
            Importance::Major
        } else {
            Importance::Minor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Major => "major",
            Importance::Minor => "minor",
        }
    }
}

/// One user-facing or admin change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub text: String,
    /// Version string mentioned in the item, or [`UNKNOWN_VERSION`].
    pub version: String,
    /// Sub-heading the item appeared under, or [`GENERAL_CATEGORY`].
    pub category: String,
    pub importance: Importance,
}

/// A compatibility warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub text: String,
}

/// The three result buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    User,
    Admin,
    Compatibility,
}

impl Bucket {
    pub fn title(&self) -> &'static str {
        match self {
            Bucket::User => "User Changes",
            Bucket::Admin => "Admin Changes",
            Bucket::Compatibility => "Compatibility Warnings",
        }
    }
}

/// Categorised answer of the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub user: Vec<Change>,
    pub admin: Vec<Change>,
    pub compatibility: Vec<Warning>,
}

impl Analysis {
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.admin.is_empty() && self.compatibility.is_empty()
    }

    /// Changes of a bucket. The compatibility bucket holds warnings, not
    /// changes, so it yields an empty slice here.
    pub fn changes(&self, bucket: Bucket) -> &[Change] {
        match bucket {
            Bucket::User => &self.user,
            Bucket::Admin => &self.admin,
            Bucket::Compatibility => &[],
        }
    }

    /// Group a bucket's changes by category, keeping the order in which each
    /// category first appeared.
    pub fn grouped(&self, bucket: Bucket) -> Vec<(&str, Vec<&Change>)> {
        let mut groups: Vec<(&str, Vec<&Change>)> = Vec::new();
        for change in self.changes(bucket) {
            match groups.iter_mut().find(|(c, _)| *c == change.category) {
                Some((_, items)) => items.push(change),
                None => groups.push((change.category.as_str(), vec![change])),
            }
        }
        groups
    }
}

/// How a source's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Html,
    Pdf,
    Text,
}

/// Plain text read from one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceText {
    /// URL or file path.
    pub origin: String,
    pub kind: SourceKind,
    pub text: String,
    /// Page count for PDFs.
    pub pages: Option<usize>,
    /// PDF pages that had no text layer and were transcribed by the model.
    pub transcribed_pages: usize,
}

/// Which engine produced the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisEngine {
    Llm { provider: String, model: String },
    Keywords,
}

impl std::fmt::Display for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisEngine::Llm { provider, model } => write!(f, "{provider}/{model}"),
            AnalysisEngine::Keywords => f.write_str("keywords"),
        }
    }
}

/// Timing and token counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub sources_ok: usize,
    pub sources_failed: usize,
    /// Characters of release-note text sent for analysis.
    pub input_chars: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub fetch_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything produced by one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub request: AnalysisRequest,
    pub analysis: Analysis,
    pub engine: AnalysisEngine,
    pub sources: Vec<SourceText>,
    pub source_errors: Vec<SourceError>,
    /// Unparsed model reply; `None` for the keyword engine.
    pub raw_response: Option<String>,
    pub stats: AnalysisStats,
}
