use clap::Parser;
use pmp_eval::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Eval(args) => cli::eval::run(args).await,
    }
}
