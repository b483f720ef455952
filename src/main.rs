use clap::Parser;
use gatekeeper::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::GenerateKey(args) => cli::keys::generate(args),
        Command::IssueToken(args) => cli::keys::issue_token(args),
        Command::ResetQuotas(args) => cli::quota::run(args).await,
    }
}
