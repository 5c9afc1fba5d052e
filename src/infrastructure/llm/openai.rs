use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::http_client::HttpClientTrait;
use crate::domain::{
    parse_chat_messages, ApiProvider, CallContext, ChatMessage, DomainError, Embedding,
    EmbeddingProvider, ProviderResponse, TokenUsage,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Per-provider options accepted under a suite's provider `config`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiChatOptions {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default, alias = "max_tokens")]
    pub max_tokens: Option<u32>,
    /// Function signatures offered to the model as tools
    #[serde(default)]
    pub functions: Vec<Value>,
}

/// OpenAI-compatible chat completions provider
#[derive(Debug)]
pub struct OpenAiChatProvider<C: HttpClientTrait> {
    client: C,
    id: String,
    label: Option<String>,
    model: String,
    auth_header: String,
    base_url: String,
    options: OpenAiChatOptions,
}

impl<C: HttpClientTrait> OpenAiChatProvider<C> {
    pub fn new(client: C, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, model, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            id: format!("openai:{}", model),
            label: None,
            model,
            auth_header,
            base_url,
            options: OpenAiChatOptions::default(),
        }
    }

    // Builder methods
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_options(mut self, options: OpenAiChatOptions) -> Self {
        self.options = options;
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, prompt: &str) -> Value {
        let messages = parse_chat_messages(prompt)
            .unwrap_or_else(|| vec![ChatMessage::new("user", prompt)]);

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(temperature) = self.options.temperature {
            body["temperature"] = json!(temperature);
        }

        if let Some(max_tokens) = self.options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !self.options.functions.is_empty() {
            let tools: Vec<Value> = self
                .options
                .functions
                .iter()
                .map(|function| {
                    if function.get("type").is_some() {
                        function.clone()
                    } else {
                        json!({ "type": "function", "function": function })
                    }
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }

    fn parse_response(&self, json: Value) -> Result<ProviderResponse, DomainError> {
        let response: OpenAiResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(&self.id, format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider(&self.id, "No choices in response"))?;

        let call = choice
            .message
            .tool_calls
            .into_iter()
            .next()
            .map(|tool| tool.function)
            .or(choice.message.function_call);

        let output = match call {
            Some(call) => json!({ "name": call.name, "arguments": call.arguments }),
            None => Value::String(choice.message.content.unwrap_or_default()),
        };

        let mut result = ProviderResponse::output(output);
        if let Some(usage) = response.usage {
            result = result.with_token_usage(TokenUsage::new(
                usage.prompt_tokens,
                usage.completion_tokens,
            ));
        }

        Ok(result)
    }
}

#[async_trait]
impl<C: HttpClientTrait> ApiProvider for OpenAiChatProvider<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    async fn call_api(
        &self,
        prompt: &str,
        _context: &CallContext,
    ) -> Result<ProviderResponse, DomainError> {
        let url = self.chat_completions_url();
        let body = self.build_request(prompt);

        debug!(provider = %self.id, "Calling chat completions");

        match self.client.post_json(&url, self.headers(), &body).await {
            Ok(response) => self.parse_response(response),
            Err(e) => {
                warn!(provider = %self.id, error = %e, "Chat completion failed");
                Ok(ProviderResponse::error(format!("API call error: {}", e)))
            }
        }
    }

    fn function_definitions(&self) -> &[Value] {
        &self.options.functions
    }
}

/// OpenAI embeddings, used by `similar` assertions
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    model: String,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    pub fn with_base_url(
        client: C,
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        let body = json!({ "model": self.model, "input": text });
        let headers = vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ];

        let response = self
            .client
            .post_json(&self.embeddings_url(), headers, &body)
            .await?;

        let response: OpenAiEmbeddingResponse = serde_json::from_value(response).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse embedding response: {}", e))
        })?;

        let data = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider("openai", "No embedding in response"))?;

        let mut embedding = Embedding::new(data.embedding);
        if let Some(usage) = response.usage {
            embedding.token_usage = Some(TokenUsage::new(usage.prompt_tokens, 0));
        }

        Ok(embedding)
    }
}

// OpenAI API types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    function_call: Option<OpenAiFunctionCall>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
    usage: Option<OpenAiEmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingUsage {
    prompt_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use crate::infrastructure::llm::HttpClient;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_URL: &str = "https://api.openai.com/v1/chat/completions";

    fn completion(message: Value) -> Value {
        json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o-mini",
            "choices": [{ "message": message, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18 }
        })
    }

    #[tokio::test]
    async fn test_plain_prompt_becomes_user_message() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            completion(json!({"role": "assistant", "content": "Hello!"})),
        );
        let provider = OpenAiChatProvider::new(client, "gpt-4o-mini", "test-key");

        let response = provider
            .call_api("Say hello", &CallContext::default())
            .await
            .unwrap();

        assert_eq!(provider.id(), "openai:gpt-4o-mini");
        assert_eq!(response.output_text().as_deref(), Some("Hello!"));
        assert_eq!(response.token_usage, Some(TokenUsage::new(10, 8)));

        let sent = &provider.client.requests()[0];
        assert_eq!(sent["messages"], json!([{"role": "user", "content": "Say hello"}]));
    }

    #[tokio::test]
    async fn test_chat_array_prompt_is_sent_as_messages() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            completion(json!({"role": "assistant", "content": "Hi"})),
        );
        let provider = OpenAiChatProvider::new(client, "gpt-4o-mini", "test-key").with_options(
            OpenAiChatOptions {
                temperature: Some(0.0),
                max_tokens: Some(64),
                functions: vec![],
            },
        );

        let prompt = r#"[{"role": "system", "content": "Be brief"}, {"role": "user", "content": "Hi"}]"#;
        provider.call_api(prompt, &CallContext::default()).await.unwrap();

        let sent = &provider.client.requests()[0];
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["messages"][1]["content"], "Hi");
        assert_eq!(sent["temperature"], json!(0.0));
        assert_eq!(sent["max_tokens"], json!(64));
    }

    #[tokio::test]
    async fn test_tool_call_output_is_structured() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            completion(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
                }]
            })),
        );
        let weather = json!({"name": "get_weather", "parameters": {"type": "object"}});
        let provider = OpenAiChatProvider::new(client, "gpt-4o-mini", "test-key").with_options(
            OpenAiChatOptions {
                functions: vec![weather.clone()],
                ..Default::default()
            },
        );

        let response = provider
            .call_api("Weather in Paris?", &CallContext::default())
            .await
            .unwrap();

        assert_eq!(
            response.output,
            Some(json!({"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}))
        );
        assert_eq!(provider.function_definitions(), &[weather.clone()]);
        assert_eq!(
            provider.client.requests()[0]["tools"],
            json!([{"type": "function", "function": weather}])
        );
    }

    #[tokio::test]
    async fn test_transport_error_becomes_response_error() {
        let client = MockHttpClient::new().with_error(TEST_URL, "API key invalid");
        let provider = OpenAiChatProvider::new(client, "gpt-4o-mini", "invalid-key");

        let response = provider
            .call_api("Hello", &CallContext::default())
            .await
            .unwrap();

        assert!(response.output.is_none());
        assert!(response.error.unwrap().contains("API key invalid"));
    }

    #[tokio::test]
    async fn test_http_contract_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer live-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion(json!({"role": "assistant", "content": "pong"}))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiChatProvider::with_base_url(
            HttpClient::new(),
            "gpt-4o-mini",
            "live-key",
            format!("{}/", server.uri()),
        )
        .with_label("local");

        let response = provider
            .call_api("ping", &CallContext::default())
            .await
            .unwrap();

        assert_eq!(response.output_text().as_deref(), Some("pong"));
        assert_eq!(provider.label(), Some("local"));
    }

    #[tokio::test]
    async fn test_embedding_provider() {
        let client = MockHttpClient::new().with_response(
            "http://localhost:8080/v1/embeddings",
            json!({
                "model": DEFAULT_EMBEDDING_MODEL,
                "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            }),
        );
        let provider = OpenAiEmbeddingProvider::with_base_url(
            client,
            DEFAULT_EMBEDDING_MODEL,
            "key",
            "http://localhost:8080",
        );

        let embedding = provider.embed("hello").await.unwrap();

        assert_eq!(embedding.vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(embedding.token_usage.unwrap().prompt, 4);
    }
}
