//! Jinja-style template rendering backed by minijinja
//!
//! Supports `{{ var }}` substitution, filters (`{{ name | upper }}`), control
//! flow (`{% for %}`, `{% if %}`) and user-registered filters. Undefined
//! variables render as empty strings.

use std::sync::Arc;

use minijinja::Environment;

use crate::domain::{DomainError, Vars};

/// A user-registered `value | name` filter
pub type TemplateFilter = Arc<dyn Fn(String) -> String + Send + Sync>;

/// Template environment shared by every render in a run
#[derive(Clone)]
pub struct TemplateEngine {
    env: Environment<'static>,
    filters: Vec<String>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
            filters: Vec::new(),
        }
    }

    /// Register a custom filter
    pub fn with_filter(mut self, name: impl Into<String>, filter: TemplateFilter) -> Self {
        let name = name.into();
        self.env
            .add_filter(name.clone(), move |value: String| -> String { filter(value) });
        self.filters.push(name);
        self
    }

    /// Render `template` against `vars`
    pub fn render(&self, template: &str, vars: &Vars) -> Result<String, DomainError> {
        self.env
            .render_str(template, vars)
            .map_err(|e| DomainError::template(format!("Failed to render template: {}", e)))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("filters", &self.filters)
            .finish()
    }
}
