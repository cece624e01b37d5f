//! Prompt templates for release-note analysis.
//!
//! Each [`PromptStyle`] has a system prompt describing the exact reply layout
//! and a parser in [`crate::pipeline::parse`] that reads that layout back.
//! Changing a heading here means changing the parser too.
//!
//! Callers can override the system prompt via
//! [`crate::config::AnalysisConfig::system_prompt`]; the user prompt is always
//! built from [`USER_PROMPT_TEMPLATE`].

use crate::config::PromptStyle;
use crate::output::AnalysisRequest;

/// System prompt for [`PromptStyle::Sectioned`]: three main headings, free
/// sub-headings and `•` bullets.
pub const SECTIONED_SYSTEM_PROMPT: &str = r#"You are a Jira plugin release notes analyzer. Your task is to analyze release notes and provide a concise, structured summary of the most important changes.

Focus on these key areas:
1. Major user-facing changes (new features, significant UI changes, important bug fixes)
2. Critical admin/technical changes (security updates, performance improvements, configuration changes)
3. Compatibility information (Jira version compatibility, breaking changes, deprecations)

For each change:
- Extract the version number
- Determine if it's a major or minor change
- Provide a clear, concise description
- Remove any redundant information
- Skip minor bug fixes unless they're significant
- Combine similar changes into single items
- Keep only the most important changes (max 5-7 per category)

Here's an example of the expected output format:

Admin Changes:
Jira Compatibility:
• Versions 8.22.0 through 8.32.0 introduce compatibility with Jira versions 9.13.x to 9.17.x
• Version 9.1.1 introduces compatibility with Jira 10.0

Security Improvements:
• Version 9.4.0 includes a resources update to remove password visibility
• Version 9.6.0 addresses a known Common Vulnerabilities and Exposures (CVE)

Configuration Changes:
• Version 9.5.0 introduces compatibility with Configuration Manager for Jira

User Changes:
New Features:
• Version 8.20.0 introduces a new Duplicate feature for Fragments
• Version 9.3.0 adds method to recalculate Scripted Field values

Important Bug Fixes:
• Version 8.34.0 fixes Behaviors breaking in Chrome v127 and Edge v127

Compatibility Warnings:
• Jira 10 Compatibility: version 9.1.1 or later required
• Breaking Changes: Jira 10 upgrade requires script updates

Follow this example format but adapt it to the specific content of the release notes being analyzed."#;

/// System prompt for [`PromptStyle::Flat`]: four fixed sections with `-`
/// bullets. Smaller local models follow this layout more reliably.
pub const FLAT_SYSTEM_PROMPT: &str = r#"You are a Jira plugin release notes analyzer. Your task is to analyze release notes and provide a concise, structured summary of the most important changes between the specified version range.

IMPORTANT: Analyze the actual content of the release notes provided. Do not return a template or placeholder text. Extract real changes from the provided release notes.

VERSION RANGE ANALYSIS:
- Only include changes that are relevant to the specified version range (from current_version to target_version)
- For compatibility information, include ALL relevant compatibility details that affect the version range
- Include breaking changes that affect the version range, even if they were introduced in earlier versions
- Pay special attention to version-specific requirements and dependencies

Focus on these key areas:
1. Major user-facing changes (new features, significant UI changes, important bug fixes)
2. Critical admin/technical changes (security updates, performance improvements, configuration changes)
3. Compatibility information (Jira version compatibility, breaking changes, deprecations)

Format your response as follows:

New Features:
- Description of new feature 1 (Version X.Y.Z)
- Description of new feature 2 (Version A.B.C)

Bugs Fixed:
- Description of bug fix 1 (Version X.Y.Z)

Compatibility Issues and Breaking Changes:
- Explanation of breaking change 1 (Version X.Y.Z)
- Explanation of compatibility issue 1 (Version X.Y.Z)

Other Noteworthy Changes:
- Description of noteworthy change 1 (Version X.Y.Z)

Separate sections with a blank line. Write "- None" under a section with nothing to report.

Remember to:
- Only include changes relevant to the specified version range
- Prioritize breaking changes and compatibility issues
- Include specific version numbers when mentioned in the notes
- Highlight any security-related changes
- Note any deprecations or removals"#;

/// User prompt; `{current_version}`, `{target_version}`, `{plugin_name}` and
/// `{release_notes}` are substituted by [`build_user_prompt`].
pub const USER_PROMPT_TEMPLATE: &str = r#"Analyze these release notes and provide a structured summary:

Current Jira Version: {current_version}
Target Jira Version: {target_version}
Plugin: {plugin_name}

Release Notes:
{release_notes}

Analyze the release notes and provide a summary following exactly the same format as shown in the system prompt example. Focus on the most important changes between the current and target versions, with special attention to compatibility issues and breaking changes."#;

/// System prompt used to transcribe a PDF page that has no text layer.
pub const TRANSCRIBE_PAGE_PROMPT: &str = r#"You transcribe scanned release-note pages. Output the plain text of the page in reading order, keeping version headings and bullet points on their own lines. Do not summarise, do not add commentary, do not wrap the output in code fences."#;

/// Built-in system prompt for a style.
pub fn system_prompt(style: PromptStyle) -> &'static str {
    match style {
        PromptStyle::Sectioned => SECTIONED_SYSTEM_PROMPT,
        PromptStyle::Flat => FLAT_SYSTEM_PROMPT,
    }
}

/// Fill [`USER_PROMPT_TEMPLATE`] for a request.
///
/// The release notes are substituted last so that braces inside them are
/// never mistaken for placeholders.
pub fn build_user_prompt(request: &AnalysisRequest, release_notes: &str) -> String {
    let head = USER_PROMPT_TEMPLATE
        .replace("{current_version}", request.current_version.trim())
        .replace("{target_version}", request.target_version.trim())
        .replace("{plugin_name}", request.display_name());

    match head.split_once("{release_notes}") {
        Some((before, after)) => format!("{before}{release_notes}{after}"),
        None => head,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_substitutes_all_placeholders() {
        let req = AnalysisRequest::new("ScriptRunner", "9.4.0", "10.3.0");
        let prompt = build_user_prompt(&req, "8.20.0: new Duplicate feature");
        assert!(prompt.contains("Current Jira Version: 9.4.0"));
        assert!(prompt.contains("Target Jira Version: 10.3.0"));
        assert!(prompt.contains("Plugin: ScriptRunner"));
        assert!(prompt.contains("Release Notes:\n8.20.0: new Duplicate feature\n"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn user_prompt_keeps_braces_in_notes() {
        let req = AnalysisRequest::new("", "9.4.0", "10.3.0");
        let prompt = build_user_prompt(&req, "use {plugin_name} in scripts");
        assert!(prompt.contains("Plugin: Unknown Plugin"));
        assert!(prompt.contains("use {plugin_name} in scripts"));
    }

    #[test]
    fn system_prompts_name_their_headings() {
        let s = system_prompt(PromptStyle::Sectioned);
        for heading in ["Admin Changes:", "User Changes:", "Compatibility Warnings:"] {
            assert!(s.contains(heading), "missing {heading}");
        }
        let f = system_prompt(PromptStyle::Flat);
        for heading in [
            "New Features:",
            "Bugs Fixed:",
            "Compatibility Issues and Breaking Changes:",
            "Other Noteworthy Changes:",
        ] {
            assert!(f.contains(heading), "missing {heading}");
        }
    }
}
