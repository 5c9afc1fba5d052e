//! Prompt entity and identity

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::{DomainError, Vars};

/// Prompt identifier: hex sha256 of the raw prompt content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptId(String);

impl PromptId {
    /// Derive the identifier from raw prompt content
    pub fn from_raw(raw: &str) -> Self {
        let digest = Sha256::digest(raw.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PromptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prompt generator invoked with the test variables instead of rendering a template.
///
/// Must return a string or a JSON-serializable object.
pub type PromptFunction = Arc<dyn Fn(&Vars) -> Result<Value, DomainError> + Send + Sync>;

/// A prompt under evaluation
#[derive(Clone)]
pub struct Prompt {
    id: PromptId,
    raw: String,
    label: String,
    function: Option<PromptFunction>,
}

impl Prompt {
    /// Create a prompt from raw template text; the label defaults to the raw text
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            id: PromptId::from_raw(&raw),
            label: raw.clone(),
            raw,
            function: None,
        }
    }

    /// Create a prompt from structured content (e.g. a chat-message array)
    pub fn from_value(raw: &Value) -> Self {
        let raw = match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self::new(raw)
    }

    /// Create a prompt backed by a generator function
    pub fn from_function(label: impl Into<String>, function: PromptFunction) -> Self {
        let label = label.into();
        Self {
            id: PromptId::from_raw(&label),
            raw: label.clone(),
            label,
            function: Some(function),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn id(&self) -> &PromptId {
        &self.id
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn function(&self) -> Option<&PromptFunction> {
        self.function.as_ref()
    }

    /// Whether the raw template references the given variable name
    pub fn references(&self, variable: &str) -> bool {
        self.raw.contains(variable)
    }
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("function", &self.function.is_some())
            .finish()
    }
}
