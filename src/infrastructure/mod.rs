//! Infrastructure layer - rendering, execution, grading and I/O

pub mod evaluator;
pub mod grading;
pub mod llm;
pub mod logging;
pub mod script;
pub mod suite;
pub mod template;
