//! PDF report, drawn with pdfium's document-creation API.
//!
//! Layout is computed first as plain data ([`layout`]) and only then drawn,
//! so page breaks and wrapping are testable without a pdfium library.
//!
//! The report uses the built-in Helvetica font, which only covers Latin-1;
//! other characters are transliterated or replaced with `?`.

use super::TIMESTAMP_FORMAT;
use crate::error::RelnotesError;
use crate::output::{AnalysisReport, Bucket, Importance, GENERAL_CATEGORY};
use crate::pipeline::pdf::bind_pdfium;
use chrono::{DateTime, Local};
use pdfium_render::prelude::*;
use tracing::debug;

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 42.5;
/// Rough Helvetica advance width as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;

const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 14.0;
const CATEGORY_SIZE: f32 = 12.0;
const ITEM_SIZE: f32 = 10.0;

const CELL_HEIGHT: f32 = 28.0;
const ITEM_LINE_HEIGHT: f32 = 20.0;

/// One line of text placed on a page; `top` is measured from the top edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub top: f32,
    pub size: f32,
    pub text: String,
}

/// Lines per page.
pub type PageLayout = Vec<PlacedLine>;

struct Cursor {
    pages: Vec<PageLayout>,
    top: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            top: MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.top = MARGIN;
    }

    fn skip(&mut self, height: f32) {
        self.top += height;
    }

    fn line(&mut self, text: String, size: f32, height: f32) {
        if self.top + height > PAGE_HEIGHT - MARGIN {
            self.new_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(PlacedLine {
                top: self.top,
                size,
                text,
            });
        }
        self.top += height;
    }

    fn wrapped(&mut self, text: &str, size: f32, height: f32) {
        let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / (size * AVG_CHAR_WIDTH)) as usize;
        for line in wrap(&to_latin1(text), max_chars) {
            self.line(line, size, height);
        }
    }
}

/// Compute the report layout.
///
/// Admin changes always start a new page; compatibility warnings get their
/// own page only when there are any.
pub fn layout(report: &AnalysisReport, generated_at: &DateTime<Local>) -> Vec<PageLayout> {
    let req = &report.request;
    let mut cur = Cursor::new();

    cur.wrapped(
        &format!("{} Release Notes Analysis", req.display_name()),
        TITLE_SIZE,
        CELL_HEIGHT,
    );
    cur.wrapped(
        &format!(
            "Analysis from version {} to {}",
            req.current_version, req.target_version
        ),
        SUBTITLE_SIZE,
        CELL_HEIGHT,
    );
    cur.line(
        format!("Generated on: {}", generated_at.format(TIMESTAMP_FORMAT)),
        SUBTITLE_SIZE,
        CELL_HEIGHT,
    );
    cur.skip(CELL_HEIGHT);

    for bucket in [Bucket::User, Bucket::Admin] {
        if bucket == Bucket::Admin {
            cur.new_page();
        }
        cur.line(bucket.title().to_string(), HEADING_SIZE, CELL_HEIGHT);
        cur.skip(14.0);
        for (category, changes) in report.analysis.grouped(bucket) {
            if category != GENERAL_CATEGORY {
                cur.wrapped(category, CATEGORY_SIZE, CELL_HEIGHT);
            }
            for change in changes {
                let indicator = match change.importance {
                    Importance::Major => "[MAJOR]",
                    Importance::Minor => "[MINOR]",
                };
                cur.wrapped(
                    &format!("{indicator} {}", change.text),
                    ITEM_SIZE,
                    ITEM_LINE_HEIGHT,
                );
                cur.skip(8.5);
            }
            cur.skip(14.0);
        }
    }

    if !report.analysis.compatibility.is_empty() {
        cur.new_page();
        cur.line(
            Bucket::Compatibility.title().to_string(),
            HEADING_SIZE,
            CELL_HEIGHT,
        );
        cur.skip(14.0);
        for warning in &report.analysis.compatibility {
            cur.wrapped(&format!("[!] {}", warning.text), ITEM_SIZE, ITEM_LINE_HEIGHT);
            cur.skip(17.0);
        }
    }

    cur.pages
}

/// Render the report as PDF bytes.
///
/// Blocking: binds pdfium on the calling thread. From async code call it via
/// `tokio::task::spawn_blocking`.
pub fn render_pdf(
    report: &AnalysisReport,
    generated_at: &DateTime<Local>,
) -> Result<Vec<u8>, RelnotesError> {
    let pages = layout(report, generated_at);
    let pdfium = bind_pdfium()?;
    let failed = |e: PdfiumError| RelnotesError::PdfExportFailed(format!("{e:?}"));

    let mut document = pdfium.create_new_pdf().map_err(failed)?;
    let font = document.fonts_mut().helvetica();

    for lines in &pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(failed)?;
        for line in lines {
            let baseline = PAGE_HEIGHT - line.top - line.size;
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(MARGIN),
                    PdfPoints::new(baseline),
                    &line.text,
                    font,
                    PdfPoints::new(line.size),
                )
                .map_err(failed)?;
        }
    }

    let bytes = document.save_to_bytes().map_err(failed)?;
    debug!("PDF report: {} pages, {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}

/// Greedy word wrap; words longer than a line are split.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(max_chars);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }
        let word_len = chars.len();
        if word_len == 0 {
            continue;
        }
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(chars);
        current_len += word_len;
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Map text onto what the built-in fonts can show.
fn to_latin1(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '→' => out.push_str("->"),
            '←' => out.push_str("<-"),
            '–' | '—' | '‐' | '−' => out.push('-'),
            '‘' | '’' => out.push('\''),
            '“' | '”' => out.push('"'),
            '…' => out.push_str("..."),
            '•' => out.push('*'),
            '\u{FE0F}' | '\u{200B}' | '\u{200D}' => {}
            c if c.is_control() => out.push(' '),
            c if (c as u32) <= 0xFF => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
