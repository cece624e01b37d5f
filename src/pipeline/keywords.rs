//! Offline categorisation by keyword matching.
//!
//! Used by [`crate::config::Backend::Keywords`] when no model is available.
//! The notes are cut into per-version blocks; each block is filed as an
//! admin change, a user change, or both, depending on which keyword list it
//! hits. Compatibility warnings come from `requires Jira X.Y.Z` mentions
//! newer than the target version and from breaking-change or deprecation
//! wording.

use crate::output::{Analysis, Change, Importance, Warning, GENERAL_CATEGORY, UNKNOWN_VERSION};
use crate::pipeline::parse::SECTIONED_MAJOR_KEYWORDS;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

pub const ADMIN_KEYWORDS: &[&str] = &[
    "admin",
    "configuration",
    "security",
    "performance",
    "database",
    "server",
    "installation",
    "upgrade",
    "migration",
    "compatibility",
    "permission",
    "access",
    "authentication",
    "authorization",
];

pub const USER_KEYWORDS: &[&str] = &[
    "feature",
    "improvement",
    "bug fix",
    "ui",
    "interface",
    "workflow",
    "user experience",
    "usability",
    "functionality",
    "new",
    "enhancement",
];

/// Longest line still treated as a version heading.
const MAX_HEADING_CHARS: usize = 80;
/// Item text is cut here so one long block does not swamp the report.
const MAX_ITEM_CHARS: usize = 300;

static RE_VERSION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:#+\s*)?(?:version|release|v)?\s*(\d+\.\d+(?:\.\d+)*)\b").unwrap()
});

static RE_REQUIRES_JIRA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)requires\s+Jira\s+(\d+\.\d+\.\d+)").unwrap());

/// A run of lines belonging to one version.
#[derive(Debug, Clone, PartialEq)]
struct VersionBlock {
    version: String,
    heading: String,
    body: Vec<String>,
}

impl VersionBlock {
    fn content(&self) -> String {
        let mut all = Vec::with_capacity(self.body.len() + 1);
        all.push(self.heading.as_str());
        all.extend(self.body.iter().map(String::as_str));
        all.join("\n")
    }

    fn summary(&self) -> String {
        let text = if self.body.is_empty() {
            self.heading.clone()
        } else {
            self.body.join(" ")
        };
        truncate_chars(&text, MAX_ITEM_CHARS)
    }
}

/// Categorise release notes without a model.
pub fn analyze_keywords(notes: &str, current_version: &str, target_version: &str) -> Analysis {
    let blocks = split_version_blocks(notes);
    debug!(
        "Keyword analysis {} → {}: {} blocks",
        current_version,
        target_version,
        blocks.len()
    );

    let mut analysis = Analysis::default();
    for block in &blocks {
        let content = block.content();
        let lower = content.to_lowercase();

        for warning in compatibility_warnings(&content, target_version) {
            if !analysis.compatibility.iter().any(|w| w.text == warning) {
                analysis.compatibility.push(Warning { text: warning });
            }
        }

        let is_admin = ADMIN_KEYWORDS.iter().any(|k| mentions(&lower, k));
        let is_user = USER_KEYWORDS.iter().any(|k| mentions(&lower, k));
        if !is_admin && !is_user {
            continue;
        }

        let change = Change {
            text: block.summary(),
            version: block.version.clone(),
            category: GENERAL_CATEGORY.to_string(),
            importance: Importance::from_keywords(&content, SECTIONED_MAJOR_KEYWORDS),
        };
        if is_admin {
            analysis.admin.push(change.clone());
        }
        if is_user {
            analysis.user.push(change);
        }
    }
    analysis
}

/// Cut the notes at every line that starts with a version number.
///
/// Text before the first version heading is kept as an unversioned block only
/// when no heading exists at all.
fn split_version_blocks(notes: &str) -> Vec<VersionBlock> {
    let mut blocks: Vec<VersionBlock> = Vec::new();
    let mut preamble: Vec<String> = Vec::new();

    for raw in notes.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(version) = version_heading(line) {
            blocks.push(VersionBlock {
                version,
                heading: line.to_string(),
                body: Vec::new(),
            });
            continue;
        }
        match blocks.last_mut() {
            Some(block) => block.body.push(line.to_string()),
            None => preamble.push(line.to_string()),
        }
    }

    if blocks.is_empty() && !preamble.is_empty() {
        let heading = preamble.remove(0);
        blocks.push(VersionBlock {
            version: UNKNOWN_VERSION.to_string(),
            heading,
            body: preamble,
        });
    }
    blocks
}

/// `keyword` appears at the start of a word: `ui` matches "UI tweaks" but not
/// "requires", `feature` matches "features".
fn mentions(lower: &str, keyword: &str) -> bool {
    lower.match_indices(keyword).any(|(idx, _)| {
        lower[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

fn version_heading(line: &str) -> Option<String> {
    if line.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    RE_VERSION_HEADING
        .captures(line)
        .map(|c| c[1].to_string())
}

/// Warnings for one block, in a fixed order.
fn compatibility_warnings(content: &str, target_version: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    for caps in RE_REQUIRES_JIRA.captures_iter(content) {
        let required = &caps[1];
        if compare_versions(required, target_version) == Ordering::Greater {
            warnings.push(format!("This version requires Jira {required} or higher"));
        }
    }
    let lower = content.to_lowercase();
    if lower.contains("breaking change") {
        warnings.push("Contains breaking changes".to_string());
    }
    if lower.contains("deprecated") {
        warnings.push("Contains deprecated features".to_string());
    }
    warnings
}

/// Compare dot-separated versions numerically.
///
/// Missing parts count as zero (`10.3` == `10.3.0`); so do parts that are
/// not numbers.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .split('.')
            .map(|p| p.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (pa, pb) = (parse(a), parse(b));
    for i in 0..pa.len().max(pb.len()) {
        let x = pa.get(i).copied().unwrap_or(0);
        let y = pb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
