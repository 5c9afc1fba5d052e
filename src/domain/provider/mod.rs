//! Provider capabilities consumed by the evaluation pipeline

mod capabilities;
mod message;
mod provider;

pub use capabilities::{
    cosine_similarity, ClassScore, ClassifierProvider, Embedding, EmbeddingProvider,
};
pub use message::{last_input, parse_chat_messages, ChatMessage};
pub use provider::{value_to_text, ApiProvider, CallContext, ProviderResponse, TokenUsage};

#[cfg(test)]
pub use capabilities::{MockClassifierProvider, MockEmbeddingProvider};
#[cfg(test)]
pub use provider::mock::MockApiProvider;
