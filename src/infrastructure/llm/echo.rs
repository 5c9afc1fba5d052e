use async_trait::async_trait;

use crate::domain::{ApiProvider, CallContext, DomainError, ProviderResponse};

/// Returns the rendered prompt as its output; useful for testing templates
#[derive(Debug, Clone, Default)]
pub struct EchoProvider {
    label: Option<String>,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl ApiProvider for EchoProvider {
    fn id(&self) -> &str {
        "echo"
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    async fn call_api(
        &self,
        prompt: &str,
        _context: &CallContext,
    ) -> Result<ProviderResponse, DomainError> {
        Ok(ProviderResponse::output(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_prompt() {
        let provider = EchoProvider::new();
        let response = provider
            .call_api("Hello there", &CallContext::default())
            .await
            .unwrap();

        assert_eq!(response.output_text().as_deref(), Some("Hello there"));
        assert!(response.token_usage.is_none());
    }
}
