//! lfcache command line entry point.
//!
//! Thin wrapper over the cache facade in `lfcache-core`.
//! Logging goes to stderr so stdout carries only cached values.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = cli::Cli::parse();
    cli::run(cli).await
}
