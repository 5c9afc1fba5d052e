//! Prompt domain - prompt templates and generator functions

mod entity;

pub use entity::{Prompt, PromptFunction, PromptId};
