//! Per-run conversation history keyed by (provider id, prompt id)

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{ConversationTurn, DomainError};

type ConversationKey = (String, String);

/// Append-only turn history for one `evaluate` call.
///
/// Ordering relies on the executor running one item at a time whenever a
/// prompt references the conversation variable.
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: RwLock<HashMap<ConversationKey, Vec<ConversationTurn>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns recorded so far for `key`, oldest first
    pub fn history(&self, key: &ConversationKey) -> Result<Vec<ConversationTurn>, DomainError> {
        let turns = self
            .turns
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        Ok(turns.get(key).cloned().unwrap_or_default())
    }

    pub fn append(&self, key: ConversationKey, turn: ConversationTurn) -> Result<(), DomainError> {
        let mut turns = self
            .turns
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        turns.entry(key).or_default().push(turn);
        Ok(())
    }
}
