//! Industry CLI - cache administration.
//!
//! The binary is a thin wrapper: argument parsing lives here in [`Cli`] and
//! every command runs through [`run`], which writes its report to any
//! `Write` sink.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use industry_core::{CacheConfig, ConfigError, RawCacheConfig, StoreError};
use industry_storage::{CacheStore, LmdbCacheStore};
use thiserror::Error;

/// Errors surfaced by the admin commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to read config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Parser)]
#[command(name = "industry")]
#[command(about = "Manage the Industry generation cache", version)]
pub struct Cli {
    /// LMDB directory of the cache (overrides config file and environment)
    #[arg(long, global = true, env = "INDUSTRY_CACHE_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    /// TOML file with a [cache] table
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Clear cached data, all of it or one group
    ClearCache(ClearCacheArgs),
    /// List the distinct groups currently cached
    Groups,
    /// Show group and item counts
    Stats,
}

#[derive(Debug, Args)]
pub struct ClearCacheArgs {
    /// Clear all cached data
    #[arg(long, conflicts_with = "group")]
    pub all: bool,

    /// Clear the cache of one group
    #[arg(long)]
    pub group: Option<String>,
}

/// Resolve the cache config: file, then environment, then command line.
pub fn load_config(cli: &Cli) -> CliResult<CacheConfig> {
    let file = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => RawCacheConfig::default(),
    };

    let mut raw = file.overlay(RawCacheConfig::from_env()?);
    if let Some(path) = &cli.storage_path {
        raw.storage_path = Some(path.clone());
    }

    Ok(raw.into_config()?)
}

fn read_config_file(path: &Path) -> CliResult<RawCacheConfig> {
    let source = std::fs::read_to_string(path).map_err(|e| CliError::ConfigFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(RawCacheConfig::from_toml_str(&source)?)
}

/// Run a parsed command against the configured store.
pub fn run(cli: &Cli, out: &mut impl Write) -> CliResult<()> {
    let config = load_config(cli)?;
    let store = LmdbCacheStore::from_config(&config)?;
    tracing::debug!(path = %store.path().display(), "Opened cache store");
    execute(&cli.command, &store, out)
}

/// Run a command against an already opened store.
pub fn execute<S: CacheStore>(command: &Command, store: &S, out: &mut impl Write) -> CliResult<()> {
    match command {
        Command::ClearCache(args) => clear_cache(args, store, out),
        Command::Groups => {
            for group in store.list_groups()? {
                writeln!(out, "{}", group)?;
            }
            Ok(())
        }
        Command::Stats => {
            let stats = store.stats()?;
            writeln!(out, "Groups: {}", stats.group_count)?;
            writeln!(out, "Items:  {}", stats.item_count)?;
            for group in store.groups()? {
                writeln!(
                    out,
                    "  {} ({}): {} items",
                    group.group,
                    group.fingerprint,
                    store.item_count(group.id)?
                )?;
            }
            Ok(())
        }
    }
}

fn clear_cache<S: CacheStore>(
    args: &ClearCacheArgs,
    store: &S,
    out: &mut impl Write,
) -> CliResult<()> {
    if args.all {
        store.clear_all()?;
        writeln!(out, "All cached data has been cleared.")?;
        return Ok(());
    }

    if let Some(group) = &args.group {
        let removed = store.clear_group(group)?;
        tracing::debug!(group = %group, removed, "Cleared group");
        writeln!(out, "Cache for group '{}' has been cleared.", group)?;
        return Ok(());
    }

    let groups = store.list_groups()?;
    if groups.is_empty() {
        writeln!(out, "No cached data found.")?;
        return Ok(());
    }

    writeln!(out, "Cached groups:")?;
    for (i, group) in groups.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, group)?;
    }
    writeln!(
        out,
        "Re-run with --group <name> to clear one group, or --all to clear everything."
    )?;
    Ok(())
}
