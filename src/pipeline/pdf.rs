//! PDF text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async tasks. All document work runs on
//! the blocking pool.
//!
//! ## Image-only pages
//!
//! Vendor release notes are sometimes "printed to PDF" from a scanner or a
//! screenshot tool and carry no text layer. Such pages are rasterised here and
//! handed back as images so the caller can have the model transcribe them
//! (see [`crate::pipeline::llm::transcribe_page`]).

use crate::error::RelnotesError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Pages with fewer non-whitespace characters than this count as image-only.
const MIN_PAGE_TEXT_CHARS: usize = 16;

/// Text pulled out of a PDF.
#[derive(Debug)]
pub struct ExtractedPdf {
    pub page_count: usize,
    /// Text per page, 1-indexed by position + 1. Empty for image-only pages.
    pub pages: Vec<String>,
    /// Image-only pages as `(page_num, image)`; filled only when rendering
    /// was requested.
    pub image_pages: Vec<(usize, DynamicImage)>,
}

impl ExtractedPdf {
    /// All non-empty page texts joined with blank lines.
    pub fn joined_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Verify the `%PDF` magic bytes.
pub fn check_pdf_magic(bytes: &[u8], origin: &str) -> Result<(), RelnotesError> {
    if bytes.len() < 4 {
        let mut magic = [0u8; 4];
        magic[..bytes.len()].copy_from_slice(bytes);
        return Err(RelnotesError::NotAPdf {
            origin: origin.to_string(),
            magic,
        });
    }
    if &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(RelnotesError::NotAPdf {
            origin: origin.to_string(),
            magic,
        });
    }
    Ok(())
}

/// Bind to the pdfium library, downloading it on first use.
pub fn bind_pdfium() -> Result<Pdfium, RelnotesError> {
    pdfium_auto::bind_pdfium_silent()
        .map_err(|e| RelnotesError::PdfiumBindingFailed(e.to_string()))
}

/// Extract the text of every page.
///
/// When `render_image_pages` is set, pages without a usable text layer are
/// rendered with their longest edge capped at `max_pixels`.
pub async fn extract_text(
    bytes: Vec<u8>,
    origin: &str,
    password: Option<&str>,
    render_image_pages: bool,
    max_pixels: u32,
) -> Result<ExtractedPdf, RelnotesError> {
    check_pdf_magic(&bytes, origin)?;

    let origin_owned = origin.to_string();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        extract_text_blocking(
            &bytes,
            &origin_owned,
            password.as_deref(),
            render_image_pages,
            max_pixels,
        )
    })
    .await
    .map_err(|e| RelnotesError::Internal(format!("PDF task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
fn extract_text_blocking(
    bytes: &[u8],
    origin: &str,
    password: Option<&str>,
    render_image_pages: bool,
    max_pixels: u32,
) -> Result<ExtractedPdf, RelnotesError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| classify_load_error(&format!("{:?}", e), origin, password.is_some()))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF '{}' loaded: {} pages", origin, page_count);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut texts = Vec::with_capacity(page_count);
    let mut image_pages = Vec::new();

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("Page {}: text layer unreadable: {:?}", page_num, e);
                String::new()
            }
        };

        if is_image_only(&text) {
            debug!("Page {}: no text layer", page_num);
            if render_image_pages {
                match page.render_with_config(&render_config) {
                    Ok(bitmap) => image_pages.push((page_num, bitmap.as_image())),
                    Err(e) => warn!("Page {}: render failed: {:?}", page_num, e),
                }
            }
            texts.push(String::new());
        } else {
            texts.push(text);
        }
    }

    Ok(ExtractedPdf {
        page_count,
        pages: texts,
        image_pages,
    })
}

fn is_image_only(text: &str) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() < MIN_PAGE_TEXT_CHARS
}

fn classify_load_error(detail: &str, origin: &str, had_password: bool) -> RelnotesError {
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            RelnotesError::WrongPassword {
                origin: origin.to_string(),
            }
        } else {
            RelnotesError::PasswordRequired {
                origin: origin.to_string(),
            }
        }
    } else {
        RelnotesError::CorruptPdf {
            origin: origin.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Encode a rendered page as a base64 PNG for a vision request.
///
/// PNG keeps small print crisp; `detail: "high"` asks OpenAI-style models to
/// look at the full-resolution tiles.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn magic_bytes() {
        assert!(check_pdf_magic(b"%PDF-1.7\n", "a.pdf").is_ok());
        match check_pdf_magic(b"<html>", "a.pdf") {
            Err(RelnotesError::NotAPdf { magic, .. }) => assert_eq!(&magic, b"<htm"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(matches!(
            check_pdf_magic(b"%P", "short.pdf"),
            Err(RelnotesError::NotAPdf { .. })
        ));
    }

    #[test]
    fn image_only_threshold() {
        assert!(is_image_only(""));
        assert!(is_image_only("  12 \n "));
        assert!(!is_image_only("Version 9.1.1 adds Jira 10 support"));
    }

    #[test]
    fn load_errors_are_classified() {
        assert!(matches!(
            classify_load_error("PdfiumLibraryInternalError(PasswordError)", "x", false),
            RelnotesError::PasswordRequired { .. }
        ));
        assert!(matches!(
            classify_load_error("PasswordError", "x", true),
            RelnotesError::WrongPassword { .. }
        ));
        assert!(matches!(
            classify_load_error("FormatError", "x", false),
            RelnotesError::CorruptPdf { .. }
        ));
    }

    #[test]
    fn joined_text_skips_empty_pages() {
        let pdf = ExtractedPdf {
            page_count: 3,
            pages: vec!["Version 1.0\n".into(), String::new(), " Version 1.1".into()],
            image_pages: Vec::new(),
        };
        assert_eq!(pdf.joined_text(), "Version 1.0\n\nVersion 1.1");
    }

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
