//! Evaluation run domain - options, work items, results and the results table

mod options;
mod result;
mod table;
mod work_item;

pub use options::{EvaluateOptions, ProgressCallback, DEFAULT_MAX_CONCURRENCY};
pub use result::{EvaluateResult, EvaluateStats, EvaluateSummary, SUMMARY_VERSION};
pub use table::{
    CompletedPrompt, EvaluateTable, EvaluateTableHead, EvaluateTableOutput, EvaluateTableRow,
    PromptMetrics,
};
pub use work_item::{ConversationTurn, WorkItem, CONVERSATION_VAR};
