//! Pipeline stages for release-note analysis.
//!
//! Each submodule implements one transformation step and is tested on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ html / pdf ──▶ llm ──▶ parse
//! (fetch)   (to text)      (chat)  (three buckets)
//!                 └──────▶ keywords (offline alternative to llm + parse)
//! ```
//!
//! 1. [`input`]   : fetch URLs, read the local PDF, collect source errors
//! 2. [`html`]    : strip markup from fetched pages
//! 3. [`pdf`]     : extract the text layer; render image-only pages
//! 4. [`llm`]     : one chat completion with timeout and retry/backoff
//! 5. [`parse`]   : read the model's reply back into [`crate::output::Analysis`]
//! 6. [`keywords`]: heuristic categorisation without a model

pub mod html;
pub mod input;
pub mod keywords;
pub mod llm;
pub mod parse;
pub mod pdf;
