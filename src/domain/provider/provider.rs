use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::domain::{DomainError, Vars};

/// Token usage statistics, accumulated per response, per prompt and per run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total: u64,
    pub prompt: u64,
    pub completion: u64,
    pub cached: u64,
}

impl TokenUsage {
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self {
            total: prompt + completion,
            prompt,
            completion,
            cached: 0,
        }
    }

    pub fn cached(total: u64) -> Self {
        Self {
            total,
            prompt: 0,
            completion: 0,
            cached: total,
        }
    }

    /// Add another usage record onto this one
    pub fn add(&mut self, other: &TokenUsage) {
        self.total += other.total;
        self.prompt += other.prompt;
        self.completion += other.completion;
        self.cached += other.cached;
    }
}

/// Context passed alongside the rendered prompt
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallContext {
    pub vars: Vars,
}

impl CallContext {
    pub fn new(vars: Vars) -> Self {
        Self { vars }
    }
}

/// Response returned by a provider call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub cached: bool,
}

impl ProviderResponse {
    pub fn output(output: impl Into<Value>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_token_usage(mut self, usage: TokenUsage) -> Self {
        self.token_usage = Some(usage);
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Output as display text; strings are returned verbatim, anything else as JSON
    pub fn output_text(&self) -> Option<String> {
        self.output.as_ref().map(value_to_text)
    }
}

/// Render a JSON value as text the way outputs are displayed and compared
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Capability implemented by every model provider under evaluation
#[async_trait]
pub trait ApiProvider: Send + Sync + Debug {
    /// Stable provider identity, e.g. `openai:gpt-4o-mini`
    fn id(&self) -> &str;

    /// Optional display label
    fn label(&self) -> Option<&str> {
        None
    }

    /// Send a rendered prompt to the provider
    async fn call_api(
        &self,
        prompt: &str,
        context: &CallContext,
    ) -> Result<ProviderResponse, DomainError>;

    /// Function signatures the provider exposes to the model, in OpenAI format
    fn function_definitions(&self) -> &[Value] {
        &[]
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Responder = Arc<dyn Fn(&str, &CallContext) -> ProviderResponse + Send + Sync>;

    /// Provider double that records every prompt it receives
    pub struct MockApiProvider {
        id: String,
        responder: Responder,
        functions: Vec<Value>,
        latency: Option<Duration>,
        fail_with: Option<String>,
        prompts: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl std::fmt::Debug for MockApiProvider {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockApiProvider").field("id", &self.id).finish()
        }
    }

    impl MockApiProvider {
        /// Provider that echoes the rendered prompt back as output
        pub fn echo(id: impl Into<String>) -> Self {
            Self::with_responder(id, |prompt, _| ProviderResponse::output(prompt))
        }

        /// Provider that always answers with the same output
        pub fn fixed(id: impl Into<String>, output: impl Into<Value>) -> Self {
            let output = output.into();
            Self::with_responder(id, move |_, _| {
                ProviderResponse::output(output.clone()).with_token_usage(TokenUsage::new(5, 5))
            })
        }

        pub fn with_responder(
            id: impl Into<String>,
            responder: impl Fn(&str, &CallContext) -> ProviderResponse + Send + Sync + 'static,
        ) -> Self {
            Self {
                id: id.into(),
                responder: Arc::new(responder),
                functions: Vec::new(),
                latency: None,
                fail_with: None,
                prompts: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn with_functions(mut self, functions: Vec<Value>) -> Self {
            self.functions = functions;
            self
        }

        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        pub fn failing(mut self, message: impl Into<String>) -> Self {
            self.fail_with = Some(message.into());
            self
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ApiProvider for MockApiProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn call_api(
            &self,
            prompt: &str,
            context: &CallContext,
        ) -> Result<ProviderResponse, DomainError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(ref message) = self.fail_with {
                return Err(DomainError::provider(&self.id, message));
            }

            Ok((self.responder)(prompt, context))
        }

        fn function_definitions(&self) -> &[Value] {
            &self.functions
        }
    }
}
