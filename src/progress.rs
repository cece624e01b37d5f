//! Progress-callback trait for analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events while sources are fetched and the model is queried. The trait is
//! `Send + Sync` because sources are fetched concurrently.
//!
//! # Example
//!
//! ```rust
//! use relnotes_analyzer::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FetchCounter {
//!     fetched: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for FetchCounter {
//!     fn on_source_complete(&self, origin: &str, chars: usize) {
//!         self.fetched.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{origin}: {chars} chars");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(FetchCounter { fetched: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through a request.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_source_*` may be called concurrently.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before any source is read.
    ///
    /// # Arguments
    /// * `total_sources`: URLs plus the PDF, if any
    fn on_analysis_start(&self, total_sources: usize) {
        let _ = total_sources;
    }

    /// Called before a URL is fetched or a PDF is opened.
    fn on_source_start(&self, origin: &str) {
        let _ = origin;
    }

    /// Called when a source produced text.
    ///
    /// # Arguments
    /// * `origin`: URL or path
    /// * `chars` : characters of extracted text
    fn on_source_complete(&self, origin: &str, chars: usize) {
        let _ = (origin, chars);
    }

    /// Called when a source failed; the analysis continues without it.
    fn on_source_error(&self, origin: &str, error: &str) {
        let _ = (origin, error);
    }

    /// Called just before the model is queried.
    ///
    /// # Arguments
    /// * `engine`     : provider/model label
    /// * `input_chars`: size of the release-note text in the prompt
    fn on_llm_start(&self, engine: &str, input_chars: usize) {
        let _ = (engine, input_chars);
    }

    /// Called when the model answered.
    fn on_llm_complete(&self, response_chars: usize) {
        let _ = response_chars;
    }

    /// Called once at the end with the number of items found per bucket.
    fn on_analysis_complete(&self, user: usize, admin: usize, compatibility: usize) {
        let _ = (user, admin, compatibility);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        sources: AtomicUsize,
        errors: Mutex<Vec<String>>,
        buckets: Mutex<Option<(usize, usize, usize)>>,
    }

    impl AnalysisProgressCallback for TrackingCallback {
        fn on_source_complete(&self, _origin: &str, _chars: usize) {
            self.sources.fetch_add(1, Ordering::SeqCst);
        }

        fn on_source_error(&self, origin: &str, _error: &str) {
            self.errors.lock().unwrap().push(origin.to_string());
        }

        fn on_analysis_complete(&self, user: usize, admin: usize, compatibility: usize) {
            *self.buckets.lock().unwrap() = Some((user, admin, compatibility));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_analysis_start(2);
        cb.on_source_start("https://example.com");
        cb.on_source_complete("https://example.com", 10);
        cb.on_source_error("notes.pdf", "corrupt");
        cb.on_llm_start("openai/gpt-4-turbo-preview", 10);
        cb.on_llm_complete(100);
        cb.on_analysis_complete(1, 2, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb: Arc<TrackingCallback> = Arc::new(TrackingCallback::default());
        let dyn_cb: ProgressCallback = cb.clone();

        dyn_cb.on_source_complete("a", 1);
        dyn_cb.on_source_complete("b", 2);
        dyn_cb.on_source_error("c", "HTTP 404");
        dyn_cb.on_analysis_complete(4, 1, 0);

        assert_eq!(cb.sources.load(Ordering::SeqCst), 2);
        assert_eq!(*cb.errors.lock().unwrap(), vec!["c".to_string()]);
        assert_eq!(*cb.buckets.lock().unwrap(), Some((4, 1, 0)));
    }
}
