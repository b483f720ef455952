//! Command line entry points
//!
//! - `serve`: HTTP gateway plus the quota reset scheduler
//! - `generate-key`: print a fresh secret and its storage hash
//! - `issue-token`: sign a bearer token for a user
//! - `reset-quotas`: ask a running gateway for one quota reset pass

pub mod keys;
pub mod quota;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Gatekeeper - API authentication, admission control and quotas
#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway HTTP server
    Serve,

    /// Generate a new API key secret and print it with its hash
    GenerateKey(keys::GenerateKeyArgs),

    /// Sign a bearer token with the configured secret
    IssueToken(keys::IssueTokenArgs),

    /// Trigger a quota reset pass on a running gateway and print the summary
    ResetQuotas(quota::ResetQuotasArgs),
}

/// Shared startup for every command: `.env`, layered config, logging
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging)?;

    Ok(config)
}
