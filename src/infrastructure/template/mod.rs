//! Template rendering

mod engine;
mod renderer;

pub use engine::{TemplateEngine, TemplateFilter};
pub use renderer::PromptRenderer;
