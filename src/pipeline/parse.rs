//! Read the model's reply back into an [`Analysis`].
//!
//! Models drift from the requested layout: headings come back as `**User
//! Changes:**` or `### User Changes`, bullets as `-` instead of `•`. Both
//! parsers strip that decoration before matching, and anything they cannot
//! place is dropped rather than guessed at.

use crate::config::PromptStyle;
use crate::output::{
    Analysis, Change, Importance, Warning, GENERAL_CATEGORY, UNKNOWN_VERSION,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Words that make a sectioned item major.
pub const SECTIONED_MAJOR_KEYWORDS: &[&str] = &[
    "security",
    "vulnerability",
    "breaking",
    "compatibility",
    "critical",
];

const FEATURE_MAJOR_KEYWORDS: &[&str] = &[
    "breaking change",
    "deprecation",
    "security",
    "critical",
    "important",
];
const BUGFIX_MAJOR_KEYWORDS: &[&str] = &["security", "critical", "important", "fix"];
const OTHER_MAJOR_KEYWORDS: &[&str] = &["security", "critical", "important", "update"];

const BREAKING_CATEGORY: &str = "Breaking Changes";

static RE_SECTIONED_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Versions?\s+([\d., ]+(?:through|and)\s+[\d.]+|[\d.]+)").unwrap()
});

static RE_FLAT_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(\s*versions?\s+(\d[\d.]*)\s*\)").unwrap());

/// Parse a reply written in `style`.
pub fn parse_response(text: &str, style: PromptStyle) -> Analysis {
    let analysis = match style {
        PromptStyle::Sectioned => parse_sectioned(text),
        PromptStyle::Flat => parse_flat(text),
    };
    debug!(
        "Parsed {:?} reply: {} user, {} admin, {} compatibility",
        style,
        analysis.user.len(),
        analysis.admin.len(),
        analysis.compatibility.len()
    );
    analysis
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainSection {
    User,
    Admin,
    Compatibility,
}

fn parse_sectioned(text: &str) -> Analysis {
    let mut analysis = Analysis::default();
    let mut section: Option<MainSection> = None;
    let mut category: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(main) = sectioned_heading(line) {
            section = Some(main);
            category = None;
            continue;
        }

        if let Some(content) = bullet_content(line) {
            let Some(section) = section else {
                continue;
            };
            if content.is_empty() {
                continue;
            }
            match section {
                MainSection::Compatibility => analysis.compatibility.push(Warning {
                    text: content.to_string(),
                }),
                MainSection::User | MainSection::Admin => {
                    let change = Change {
                        text: content.to_string(),
                        version: sectioned_version(content),
                        category: category
                            .clone()
                            .unwrap_or_else(|| GENERAL_CATEGORY.to_string()),
                        importance: Importance::from_keywords(content, SECTIONED_MAJOR_KEYWORDS),
                    };
                    if section == MainSection::User {
                        analysis.user.push(change);
                    } else {
                        analysis.admin.push(change);
                    }
                }
            }
            continue;
        }

        let heading = strip_decoration(line);
        if let Some(name) = heading.strip_suffix(':') {
            let name = name.trim();
            if !name.is_empty() {
                category = Some(name.to_string());
            }
        }
    }

    analysis
}

fn sectioned_heading(line: &str) -> Option<MainSection> {
    let heading = strip_decoration(line);
    let heading = heading.strip_suffix(':').unwrap_or(heading).trim();
    if heading.eq_ignore_ascii_case("Admin Changes") {
        Some(MainSection::Admin)
    } else if heading.eq_ignore_ascii_case("User Changes") {
        Some(MainSection::User)
    } else if heading.eq_ignore_ascii_case("Compatibility Warnings") {
        Some(MainSection::Compatibility)
    } else {
        None
    }
}

fn sectioned_version(content: &str) -> String {
    RE_SECTIONED_VERSION
        .captures(content)
        .map(|c| c[1].trim().trim_end_matches([',', '.']).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}

/// A section of the flat layout: bucket plus the category and importance
/// keywords its items get.
#[derive(Debug, Clone, Copy)]
enum FlatSection {
    Changes {
        admin: bool,
        category: &'static str,
        keywords: &'static [&'static str],
    },
    /// Admin items under "Breaking Changes", always major.
    Breaking,
    Compatibility,
}

fn flat_heading(line: &str) -> Option<FlatSection> {
    if bullet_content(line).is_some() {
        return None;
    }
    let heading = strip_decoration(line).to_lowercase();
    if !heading.ends_with(':') && !line.trim_start().starts_with('#') {
        return None;
    }
    // First match wins, so the combined "Compatibility Issues and Breaking
    // Changes" heading files its items as breaking admin changes.
    //
    //   breaking changes          -> admin / Breaking Changes (major)
    //   compatibility issues      -> compatibility warnings
    //   new features              -> user / New Features
    //   bugs fixed, bug fixes     -> user / Bug Fixes
    //   other noteworthy changes  -> admin / Other Changes
    if heading.contains("breaking changes") {
        Some(FlatSection::Breaking)
    } else if heading.contains("compatibility issues") {
        Some(FlatSection::Compatibility)
    } else if heading.contains("new features") {
        Some(FlatSection::Changes {
            admin: false,
            category: "New Features",
            keywords: FEATURE_MAJOR_KEYWORDS,
        })
    } else if heading.contains("bugs fixed") || heading.contains("bug fixes") {
        Some(FlatSection::Changes {
            admin: false,
            category: "Bug Fixes",
            keywords: BUGFIX_MAJOR_KEYWORDS,
        })
    } else if heading.contains("other noteworthy changes") {
        Some(FlatSection::Changes {
            admin: true,
            category: "Other Changes",
            keywords: OTHER_MAJOR_KEYWORDS,
        })
    } else {
        None
    }
}

fn parse_flat(text: &str) -> Analysis {
    let mut analysis = Analysis::default();
    let mut section: Option<FlatSection> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(next) = flat_heading(line) {
            section = Some(next);
            continue;
        }

        let (Some(section), Some(content)) = (section, flat_item(line)) else {
            continue;
        };
        if is_placeholder(content) {
            continue;
        }

        match section {
            FlatSection::Compatibility => analysis.compatibility.push(Warning {
                text: content.to_string(),
            }),
            FlatSection::Breaking => analysis.admin.push(Change {
                text: content.to_string(),
                version: flat_version(content),
                category: BREAKING_CATEGORY.to_string(),
                importance: Importance::Major,
            }),
            FlatSection::Changes {
                admin,
                category,
                keywords,
            } => {
                let change = Change {
                    text: content.to_string(),
                    version: flat_version(content),
                    category: category.to_string(),
                    importance: Importance::from_keywords(content, keywords),
                };
                if admin {
                    analysis.admin.push(change);
                } else {
                    analysis.user.push(change);
                }
            }
        }
    }

    analysis
}

fn flat_item(line: &str) -> Option<&str> {
    if !line.starts_with(['-', '*', '•']) || line.starts_with("**") {
        return None;
    }
    let content = line.trim_start_matches(['-', '*', '•', ' ', '\t']).trim();
    let content = content.trim_end_matches("**").trim();
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

fn flat_version(content: &str) -> String {
    RE_FLAT_VERSION
        .captures(content)
        .map(|c| c[1].trim_end_matches('.').to_string())
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}

/// "None", "N/A" and "None specified in the provided release notes." are
/// what models write under an empty section.
fn is_placeholder(content: &str) -> bool {
    let lower = content.trim_end_matches('.').trim().to_lowercase();
    lower == "none"
        || lower == "n/a"
        || lower == "none found"
        || lower.starts_with("none specified")
        || lower.starts_with("no changes")
}

/// Bullet text for `•`, `- ` and `* ` lines.
fn bullet_content(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('•') {
        return Some(rest.trim());
    }
    for marker in ["- ", "* "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    None
}

/// Remove markdown heading and emphasis markers around a line.
fn strip_decoration(line: &str) -> &str {
    line.trim()
        .trim_start_matches('#')
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
}
