use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Prompt function error: {message}")]
    PromptFunction { message: String },

    #[error("Script error: {message}")]
    Script { message: String },

    #[error("Assertion error: {message}")]
    Assertion { message: String },

    #[error("Postprocess error: {message}")]
    Postprocess { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    pub fn prompt_function(message: impl Into<String>) -> Self {
        Self::PromptFunction {
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    pub fn postprocess(message: impl Into<String>) -> Self {
        Self::Postprocess {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Errors that abort a whole evaluation run instead of failing one work item
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PromptFunction { .. })
    }
}
