//! Per-run evaluation options

use std::sync::Arc;

/// Invoked with `(completed, total)` after every finished work item
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Options recognised by `evaluate`
#[derive(Clone)]
pub struct EvaluateOptions {
    pub max_concurrency: usize,
    pub repeat: usize,
    /// Pause after every uncached provider call
    pub delay_ms: u64,
    pub show_progress_bar: bool,
    pub progress_callback: Option<ProgressCallback>,
    /// Prompt-variation generation; accepted but not supported
    pub generate_suggestions: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            repeat: 1,
            delay_ms: 0,
            show_progress_bar: false,
            progress_callback: None,
            generate_suggestions: false,
        }
    }
}

impl EvaluateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    // Builder methods
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_generate_suggestions(mut self, generate: bool) -> Self {
        self.generate_suggestions = generate;
        self
    }
}

impl std::fmt::Debug for EvaluateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluateOptions")
            .field("max_concurrency", &self.max_concurrency)
            .field("repeat", &self.repeat)
            .field("delay_ms", &self.delay_ms)
            .field("show_progress_bar", &self.show_progress_bar)
            .field("progress_callback", &self.progress_callback.is_some())
            .field("generate_suggestions", &self.generate_suggestions)
            .finish()
    }
}
