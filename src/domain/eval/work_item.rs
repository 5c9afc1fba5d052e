use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ApiProvider, Prompt, TestCase};

/// Reserved template variable holding prior turns for a (provider, prompt) pair
pub const CONVERSATION_VAR: &str = "_conversation";

/// One earlier exchange exposed to templates through [`CONVERSATION_VAR`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Full rendered prompt
    pub prompt: String,
    /// What the user said: the last chat turn, or the whole prompt
    pub input: String,
    pub output: String,
}

/// The atomic unit of execution
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub provider: Arc<dyn ApiProvider>,
    pub prompt: Prompt,
    /// Fully merged test with one concrete variable combination
    pub test: TestCase,
    pub row_index: usize,
    pub col_index: usize,
    pub repeat_index: usize,
    pub delay: Duration,
}

impl WorkItem {
    /// Key under which conversation history for this item is kept
    pub fn conversation_key(&self) -> (String, String) {
        (
            self.provider.id().to_string(),
            self.prompt.id().as_str().to_string(),
        )
    }
}
