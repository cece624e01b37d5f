//! LLM interaction: build chat messages and call the provider.
//!
//! Prompt wording lives in [`crate::prompts`]; this module only assembles
//! messages and drives the call with a timeout and retry/backoff.
//!
//! ## Retry Strategy
//!
//! Rate limits and overloaded local servers are transient. Each failed or
//! timed-out attempt waits `retry_backoff_ms * 2^(attempt-1)` before trying
//! again: 500 ms → 1 s with the defaults.

use crate::config::AnalysisConfig;
use crate::error::RelnotesError;
use crate::prompts::TRANSCRIBE_PAGE_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A completed chat call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub retries: u32,
}

/// Ask the model to categorise release notes.
///
/// The request is exactly two messages: the style's system prompt (or the
/// configured override) and the filled user prompt.
pub async fn complete(
    provider: &Arc<dyn LLMProvider>,
    provider_label: &str,
    system_prompt: &str,
    user_prompt: &str,
    config: &AnalysisConfig,
) -> Result<Completion, RelnotesError> {
    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_prompt),
    ];
    debug!(
        "Prompt: {} system chars, {} user chars",
        system_prompt.len(),
        user_prompt.len()
    );
    chat_with_retry(provider, provider_label, &messages, config).await
}

/// Transcribe one image-only PDF page.
pub async fn transcribe_page(
    provider: &Arc<dyn LLMProvider>,
    provider_label: &str,
    page_num: usize,
    image: ImageData,
    config: &AnalysisConfig,
) -> Result<Completion, RelnotesError> {
    debug!("Transcribing image-only page {}", page_num);
    let messages = vec![
        ChatMessage::system(TRANSCRIBE_PAGE_PROMPT),
        ChatMessage::user_with_images("", vec![image]),
    ];
    chat_with_retry(provider, provider_label, &messages, config).await
}

async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    provider_label: &str,
    messages: &[ChatMessage],
    config: &AnalysisConfig,
) -> Result<Completion, RelnotesError> {
    let start = Instant::now();
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<String> = None;
    let mut timeouts = 0u32;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "LLM retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "LLM answered: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens, response.completion_tokens, duration
                );
                return Ok(Completion {
                    content: response.content,
                    input_tokens: response.prompt_tokens as u64,
                    output_tokens: response.completion_tokens as u64,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt,
                });
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("LLM attempt {} failed: {}", attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                warn!(
                    "LLM attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                timeouts += 1;
            }
        }
    }

    // Only report a timeout when no attempt produced a real error.
    match last_err {
        Some(message) => Err(RelnotesError::LlmApiError {
            provider: provider_label.to_string(),
            message,
        }),
        None => Err(RelnotesError::ApiTimeout {
            secs: config.api_timeout_secs,
            attempts: timeouts,
        }),
    }
}

fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
