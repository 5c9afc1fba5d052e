//! CLI module for PMP Eval
//!
//! Provides subcommands:
//! - `eval`: run a test suite and report pass/fail per table cell

pub mod eval;

use clap::{Parser, Subcommand};

/// PMP Eval - Evaluate prompts across providers with assertion-based grading
#[derive(Parser)]
#[command(name = "pmp-eval")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate a test suite file
    Eval(eval::EvalArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eval_args() {
        let cli = Cli::try_parse_from([
            "pmp-eval",
            "eval",
            "--config",
            "suite.yaml",
            "--max-concurrency",
            "2",
            "--repeat",
            "3",
            "--no-progress",
        ])
        .unwrap();

        let Command::Eval(args) = cli.command;
        assert_eq!(args.config.to_str(), Some("suite.yaml"));
        assert_eq!(args.max_concurrency, Some(2));
        assert_eq!(args.repeat, 3);
        assert!(args.no_progress);
        assert!(args.output.is_none());
    }
}
