//! Concrete providers: echo and OpenAI-compatible chat completions

mod echo;
mod factory;
mod http_client;
mod openai;

pub use echo::EchoProvider;
pub use factory::{ProviderFactory, ProviderSpec};
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::{
    OpenAiChatOptions, OpenAiChatProvider, OpenAiEmbeddingProvider, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OPENAI_BASE_URL,
};
