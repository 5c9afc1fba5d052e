//! Eval command - loads a suite, runs it and reports the results

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{EvaluateOptions, EvaluateSummary};
use crate::infrastructure::evaluator::Evaluator;
use crate::infrastructure::grading::GradingEngine;
use crate::infrastructure::llm::ProviderFactory;
use crate::infrastructure::logging;
use crate::infrastructure::script::PythonRunner;
use crate::infrastructure::suite::SuiteLoader;
use crate::infrastructure::template::{PromptRenderer, TemplateEngine};

/// Arguments for the eval command
#[derive(Args, Clone, Debug)]
pub struct EvalArgs {
    /// Suite file (.yaml, .yml, .json or .toml)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Maximum concurrent provider calls (overrides config)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Run every test this many times
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,

    /// Milliseconds to wait after each uncached provider call
    #[arg(long, default_value_t = 0)]
    pub delay: u64,

    /// Write the full summary as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not log progress after every item
    #[arg(long)]
    pub no_progress: bool,
}

/// Run the eval command
pub async fn run(args: EvalArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let api_key = config
        .openai
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let factory = ProviderFactory::new()
        .with_openai(&config.openai.base_url, api_key)
        .with_embedding_model(&config.openai.embedding_model);

    let loaded = SuiteLoader::new(factory.clone()).load(&args.config).await?;

    let renderer = PromptRenderer::new(TemplateEngine::new())
        .with_json_autoescape_disabled(config.eval.disable_json_autoescape);

    let mut grading = GradingEngine::new()
        .with_python(PythonRunner::new(&config.eval.python_executable))
        .with_webhook_timeout(Duration::from_secs(config.eval.webhook_timeout_secs))
        .with_renderer(renderer.clone());
    for provider in loaded.grading_providers {
        grading = grading.with_grading_provider(provider);
    }
    if let Some(embedding) = factory.create_embedding() {
        grading = grading.with_embedding_provider(embedding);
    }

    if config.eval.delay_ms.is_some() && args.delay > 0 {
        warn!("Configured eval.delay_ms overrides --delay");
    }
    let evaluator = Evaluator::new(renderer, grading).with_delay_override(config.eval.delay_ms);

    let options = EvaluateOptions::new()
        .with_max_concurrency(args.max_concurrency.unwrap_or(config.eval.max_concurrency))
        .with_repeat(args.repeat)
        .with_delay_ms(args.delay)
        .with_progress_bar(!args.no_progress);

    let summary = evaluator.evaluate(&loaded.suite, options).await?;

    print!("{}", render_report(&summary));

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), "Wrote evaluation summary");
    }

    Ok(())
}

/// Plain-text report: one line per table cell, then totals
pub fn render_report(summary: &EvaluateSummary) -> String {
    let mut report = String::new();
    let head = &summary.table.head;

    for (row_index, row) in summary.table.body.iter().enumerate() {
        let vars = head
            .vars
            .iter()
            .zip(&row.vars)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        let title = row.description.as_deref().unwrap_or("");
        let _ = writeln!(report, "Row {} {} [{}]", row_index + 1, title, vars);

        for (prompt, output) in head.prompts.iter().zip(&row.outputs) {
            let status = if output.pass { "PASS" } else { "FAIL" };
            let first_line = output.text.lines().next().unwrap_or("");
            let _ = writeln!(
                report,
                "  [{}] {} ({:.2}, {}ms): {}",
                status, prompt.label, output.score, output.latency_ms, first_line
            );
        }
    }

    let stats = &summary.stats;
    let _ = writeln!(
        report,
        "\n{} passed, {} failed, {} tokens ({} prompt, {} completion, {} cached)",
        stats.successes,
        stats.failures,
        stats.token_usage.total,
        stats.token_usage.prompt,
        stats.token_usage.completion,
        stats.token_usage.cached
    );

    report
}
