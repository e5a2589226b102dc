//! Command-line interface definitions and handlers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lfcache_core::cache::{NEVER, expires_in};
use lfcache_core::{Cache, CacheConfig};

/// lfcache - a file-backed key-value cache with expiring keys.
#[derive(Parser, Debug)]
#[command(name = "lfcache")]
#[command(
    author,
    version,
    about,
    long_about = r#"lfcache stores string values under string keys in a single SQLite file.

Keys may carry an absolute expiration time. Expired keys read as missing and
are removed the next time one of them is read.

Exit status: 0 on a hit or a successful write, 1 on a miss or a failed write.

Examples:
    lfcache set session 123abc --ttl 5
    lfcache get session
    lfcache get session --full
"#
)]
pub struct Cli {
    /// Directory holding the cache file.
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        long_help = "Directory holding the cache file.\n\n\
Overrides LFCACHE_DIR and the config file; defaults to the system temp directory."
    )]
    pub dir: Option<PathBuf>,

    /// Cache file name inside DIR.
    #[arg(long, global = true, value_name = "NAME")]
    pub filename: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the value stored under KEY.
    Get {
        #[arg(value_name = "KEY")]
        key: String,

        /// Print the whole entry (key, value, timestamp) as JSON.
        #[arg(long)]
        full: bool,
    },

    /// Store VALUE under KEY, replacing any previous value.
    Set {
        #[arg(value_name = "KEY")]
        key: String,

        #[arg(value_name = "VALUE")]
        value: String,

        /// Absolute expiration time as unix timestamp in seconds.
        #[arg(long, value_name = "UNIX", conflicts_with = "ttl", allow_negative_numbers = true)]
        expire: Option<i64>,

        /// Expire the key this many seconds from now (at least 1).
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        ttl: Option<u64>,
    },
}

impl Cli {
    fn config(&self) -> Result<CacheConfig> {
        let mut config = CacheConfig::load().context("loading cache configuration")?;
        if let Some(dir) = &self.dir {
            config.dir = dir.clone();
        }
        if let Some(filename) = &self.filename {
            config.filename = filename.clone();
        }
        config.validate().context("validating cache configuration")?;
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config()?;
    tracing::debug!(
        path = %config.db_path().display(),
        busy_timeout_ms = config.busy_timeout_ms,
        "Cache configuration loaded"
    );
    let cache = Cache::from_config(&config);

    match cli.command {
        Commands::Get { key, full } => {
            let Some(entry) = cache.get_entry(&key).await else {
                return Ok(ExitCode::FAILURE);
            };
            if full {
                println!("{}", serde_json::to_string(&entry)?);
            } else {
                println!("{}", entry.value);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Set { key, value, expire, ttl } => {
            let expire = match (expire, ttl) {
                (Some(timestamp), _) => timestamp,
                (None, Some(secs)) => expires_in(Duration::from_secs(secs)),
                (None, None) => NEVER,
            };
            if cache.set(&key, &value, expire).await {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
