//! Domain layer - evaluation entities, capabilities and pure logic

pub mod error;
pub mod eval;
pub mod prompt;
pub mod provider;
pub mod test_case;

/// Template variables bound for one test; key order follows declaration order
pub type Vars = serde_json::Map<String, serde_json::Value>;

pub use error::DomainError;
pub use eval::{
    CompletedPrompt, ConversationTurn, EvaluateOptions, EvaluateResult, EvaluateStats,
    EvaluateSummary, EvaluateTable, EvaluateTableHead, EvaluateTableOutput, EvaluateTableRow,
    ProgressCallback, PromptMetrics, WorkItem, CONVERSATION_VAR, DEFAULT_MAX_CONCURRENCY,
    SUMMARY_VERSION,
};
pub use prompt::{Prompt, PromptFunction, PromptId};
pub use provider::{
    cosine_similarity, last_input, parse_chat_messages, value_to_text, ApiProvider, CallContext,
    ChatMessage, ClassScore, ClassifierProvider, Embedding, EmbeddingProvider, ProviderResponse,
    TokenUsage,
};
pub use test_case::{
    assertion_from_string, Assertion, AssertionKind, GradingResult, Scenario, SchemaSource,
    TestCase, TestCaseOptions, TestSuite,
};

#[cfg(test)]
pub use provider::{MockApiProvider, MockClassifierProvider, MockEmbeddingProvider};
