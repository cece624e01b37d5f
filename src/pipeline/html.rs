//! HTML → plain text for fetched release-note pages.
//!
//! Release-note pages are mostly navigation chrome, scripts and styles around
//! a list of versions. The model only needs the visible text, with block
//! boundaries kept as line breaks so version headings stay on their own line.

use once_cell::sync::Lazy;
use regex::Regex;

/// Convert an HTML document to readable plain text.
///
/// Steps (in order):
/// 1. Drop comments and `script`/`style`/`noscript`/`head`/`svg`/`template`
///    elements with their content
/// 2. Turn block-level tags and `<br>` into line breaks
/// 3. Strip all remaining tags
/// 4. Decode character entities
/// 5. Collapse runs of spaces and drop blank lines
pub fn html_to_text(html: &str) -> String {
    let s = RE_COMMENTS.replace_all(html, "");
    let s = RE_INVISIBLE.replace_all(&s, "");
    let s = RE_BLOCK_TAGS.replace_all(&s, "\n");
    let s = RE_ANY_TAG.replace_all(&s, "");
    let s = decode_entities(&s);
    normalise_whitespace(&s)
}

static RE_COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

// The regex crate has no backreferences, so each element is listed.
static RE_INVISIBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<head\b.*?</head\s*>|<svg\b.*?</svg\s*>|<template\b.*?</template\s*>",
    )
    .unwrap()
});

static RE_BLOCK_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<br\s*/?>|</?(?:p|div|li|ul|ol|h[1-6]|tr|table|section|article|header|footer|blockquote|pre|dt|dd|hr)\b[^>]*>",
    )
    .unwrap()
});

static RE_ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());

fn decode_entities(input: &str) -> String {
    RE_ENTITY
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            decode_entity(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "–",
        "mdash" => "—",
        "hellip" => "…",
        "rsquo" | "lsquo" => "'",
        "rdquo" | "ldquo" => "\"",
        "bull" => "•",
        "rarr" => "→",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        _ => return None,
    };
    Some(decoded.to_string())
}

fn normalise_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
