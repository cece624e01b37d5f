//! LLM backend selection and local-server discovery.

use crate::config::{AnalysisConfig, Backend, DEFAULT_OPENAI_MODEL};
use crate::error::RelnotesError;
use edgequake_llm::{LLMProvider, OllamaProvider, ProviderFactory};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A provider ready for chat calls, with the names used in reports.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: Arc<dyn LLMProvider>,
    /// Provider name, e.g. `openai`.
    pub name: String,
    pub model: String,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("name", &self.name)
            .field("model", &self.model)
            .finish()
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(name: &str, model: &str) -> Result<ResolvedProvider, RelnotesError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        RelnotesError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: provider_hint(name, &e.to_string()),
        }
    })?;
    info!("Using LLM backend {}/{}", name, model);
    Ok(ResolvedProvider {
        provider,
        name: name.to_string(),
        model: model.to_string(),
    })
}

/// Instantiate an Ollama provider talking to `host`.
fn create_ollama_provider(host: &str, model: &str) -> Result<ResolvedProvider, RelnotesError> {
    let host = host.trim_end_matches('/');
    let provider = OllamaProvider::builder()
        .host(host)
        .model(model)
        .build()
        .map_err(|e| RelnotesError::ProviderNotConfigured {
            provider: "ollama".to_string(),
            hint: provider_hint("ollama", &e.to_string()),
        })?;
    info!("Using LLM backend ollama/{} at {}", model, host);
    Ok(ResolvedProvider {
        provider: Arc::new(provider),
        name: "ollama".to_string(),
        model: model.to_string(),
    })
}

fn provider_hint(name: &str, error: &str) -> String {
    match name {
        "openai" => format!("Set OPENAI_API_KEY (e.g. in a .env file).\nError: {error}"),
        "ollama" => format!(
            "Start a local server with `ollama serve` and set OLLAMA_HOST if it is not on localhost.\nError: {error}"
        ),
        _ => format!("Error: {error}"),
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named backend** (`openai`, `ollama`) with `config.model` or the
///    backend's default model. Ollama is reached at `config.ollama_host`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI key** present in `OPENAI_API_KEY`.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
///
/// Returns `Ok(None)` for [`Backend::Keywords`], which needs no model.
pub fn resolve_provider(config: &AnalysisConfig) -> Result<Option<ResolvedProvider>, RelnotesError> {
    if let Some(ref provider) = config.provider {
        return Ok(Some(ResolvedProvider {
            provider: Arc::clone(provider),
            name: "custom".to_string(),
            model: config.model.clone().unwrap_or_else(|| "custom".to_string()),
        }));
    }

    if config.backend == Backend::Keywords {
        return Ok(None);
    }

    if config.backend == Backend::Ollama {
        let model = config.effective_model(Backend::Ollama);
        return create_ollama_provider(&config.ollama_host, &model).map(Some);
    }

    if let Some(name) = config.backend.provider_name() {
        let model = config.effective_model(config.backend);
        return create_provider(name, &model).map(Some);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model).map(Some);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
            return create_provider("openai", model).map(Some);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RelnotesError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, run Ollama with --backend ollama, or use --backend keywords.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Some(ResolvedProvider {
        provider,
        name: "auto".to_string(),
        model: config.model.clone().unwrap_or_else(|| "default".to_string()),
    }))
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    name: String,
}

/// Names of the models a local Ollama server has pulled.
///
/// Calls `GET {host}/api/tags`. Any connection problem or non-success status
/// is reported as [`RelnotesError::OllamaUnavailable`].
pub async fn list_ollama_models(host: &str, timeout_secs: u64) -> Result<Vec<String>, RelnotesError> {
    let host = host.trim_end_matches('/');
    let url = format!("{host}/api/tags");
    debug!("Listing Ollama models: {}", url);

    let unavailable = |reason: String| RelnotesError::OllamaUnavailable {
        host: host.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| unavailable(e.to_string()))?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(unavailable(format!("HTTP {}", response.status())));
    }

    let tags: TagsResponse = response
        .json()
        .await
        .map_err(|e| unavailable(format!("unexpected /api/tags response: {e}")))?;

    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

/// Check the Ollama server is up before a long analysis call.
///
/// A model that is not pulled yet only produces a warning: Ollama may pull it
/// on demand.
pub async fn check_ollama(host: &str, model: &str, timeout_secs: u64) -> Result<(), RelnotesError> {
    let models = list_ollama_models(host, timeout_secs).await?;
    let pulled = models
        .iter()
        .any(|m| m == model || m.split(':').next() == Some(model));
    if !pulled {
        warn!(
            "Model '{}' not found on {} (available: {})",
            model,
            host,
            if models.is_empty() {
                "none".to_string()
            } else {
                models.join(", ")
            }
        );
    }
    Ok(())
}
