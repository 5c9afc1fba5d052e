use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::http_client::HttpClient;
use super::openai::{
    OpenAiChatOptions, OpenAiChatProvider, OpenAiEmbeddingProvider, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OPENAI_BASE_URL,
};
use super::EchoProvider;
use crate::domain::{ApiProvider, DomainError, EmbeddingProvider};

/// A provider as written in a suite file: a bare id or `{id, label, config}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProviderSpec {
    Id(String),
    Detailed {
        id: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        config: Option<Value>,
    },
}

impl ProviderSpec {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Detailed { id, .. } => id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Detailed { label, .. } => label.as_deref(),
        }
    }

    pub fn config(&self) -> Option<&Value> {
        match self {
            Self::Id(_) => None,
            Self::Detailed { config, .. } => config.as_ref(),
        }
    }
}

/// Factory for the providers the CLI knows how to build
#[derive(Debug, Clone)]
pub struct ProviderFactory {
    openai_base_url: String,
    openai_api_key: Option<String>,
    embedding_model: String,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    // Builder methods
    pub fn with_openai(mut self, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        self.openai_base_url = base_url.into();
        self.openai_api_key = api_key;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Create a provider from its suite-file description.
    ///
    /// Supported ids are `echo` and `openai:<model>` (`openai:chat:<model>`
    /// is accepted as an alias).
    pub fn create(&self, spec: &ProviderSpec) -> Result<Arc<dyn ApiProvider>, DomainError> {
        let id = spec.id();

        if id == "echo" {
            let mut provider = EchoProvider::new();
            if let Some(label) = spec.label() {
                provider = provider.with_label(label);
            }
            return Ok(Arc::new(provider));
        }

        if let Some(model) = id.strip_prefix("openai:") {
            let model = model.strip_prefix("chat:").unwrap_or(model);
            if model.is_empty() {
                return Err(DomainError::configuration(format!(
                    "Provider '{}' does not name a model",
                    id
                )));
            }

            let options: OpenAiChatOptions = match spec.config() {
                Some(config) => serde_json::from_value(config.clone()).map_err(|e| {
                    DomainError::configuration(format!(
                        "Invalid config for provider '{}': {}",
                        id, e
                    ))
                })?,
                None => OpenAiChatOptions::default(),
            };

            let mut provider = OpenAiChatProvider::with_base_url(
                HttpClient::new(),
                model,
                self.require_api_key()?,
                &self.openai_base_url,
            )
            .with_options(options);
            if let Some(label) = spec.label() {
                provider = provider.with_label(label);
            }

            return Ok(Arc::new(provider));
        }

        Err(DomainError::configuration(format!(
            "Unknown provider '{}'; expected 'echo' or 'openai:<model>'",
            id
        )))
    }

    /// Embedding capability for `similar` assertions, when credentials exist
    pub fn create_embedding(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        self.openai_api_key.as_ref().map(|api_key| {
            Arc::new(OpenAiEmbeddingProvider::with_base_url(
                HttpClient::new(),
                &self.embedding_model,
                api_key,
                &self.openai_base_url,
            )) as Arc<dyn EmbeddingProvider>
        })
    }

    fn require_api_key(&self) -> Result<&str, DomainError> {
        self.openai_api_key.as_deref().ok_or_else(|| {
            DomainError::configuration(
                "OpenAI API key is not configured (set APP__OPENAI__API_KEY or OPENAI_API_KEY)",
            )
        })
    }
}
