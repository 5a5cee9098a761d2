//! dif-admin: Dif Store admin CLI
//!
//! Inspects and maintains a Dif Store selected by backend URL.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dif_store::{open_store, Dif, DifStoreApi, DynDifStore, Fingerprint, StoreConfig};

/// dif-admin: Dif Store admin CLI
#[derive(Parser, Debug)]
#[command(name = "dif-admin")]
#[command(about = "Inspect and maintain a Dif Store")]
struct Args {
    /// Backend URL: file:///DIR/NAME, rocksdb:///DIR/NAME or memory:[NAME].
    /// A memory: store lives only as long as this command.
    #[arg(short, long)]
    url: String,

    /// JSON configuration file (DIFSTORE_* environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List registered partition keys
    Keys,
    /// Register every given key not yet present
    EnsureKeys {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Register one key
    Register { key: String },
    /// Check whether a set of difs was recorded under a key
    Has {
        key: String,
        /// JSON list of {"type": .., "value": ..} objects
        difs: String,
    },
    /// Record a set of difs under a key
    Add {
        key: String,
        /// JSON list of {"type": .., "value": ..} objects
        difs: String,
    },
    /// Print audit log entries, one JSON object per line
    Log {
        /// Only entries whose index field equals this JSON value
        #[arg(long)]
        at: Option<String>,
    },
    /// Delete all data and re-create the store
    Clear,
}

fn load_config(path: Option<&PathBuf>) -> Result<StoreConfig> {
    let config = match path {
        Some(path) => StoreConfig::from_json_file(path)?,
        None => StoreConfig::default(),
    };
    Ok(config.apply_env_overrides()?)
}

fn parse_fingerprint(difs: &str) -> Result<Fingerprint> {
    let difs: Vec<Dif> = serde_json::from_str(difs).context("difs must be a JSON list of {\"type\", \"value\"} objects")?;
    Ok(Fingerprint::from_difs(&difs))
}

/// Execute one command, returning the lines to print.
fn run(store: &DynDifStore, command: Command) -> Result<Vec<String>> {
    let lines = match command {
        Command::Keys => store.keys()?,
        Command::EnsureKeys { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            store.ensure_keys(&keys)?;
            store.keys()?
        }
        Command::Register { key } => vec![store.register_key(&key)?.to_string()],
        Command::Has { key, difs } => {
            vec![store.has(&key, &parse_fingerprint(&difs)?)?.to_string()]
        }
        Command::Add { key, difs } => {
            store.add(&key, &parse_fingerprint(&difs)?)?;
            Vec::new()
        }
        Command::Log { at } => {
            let entries = match at {
                Some(raw) => {
                    let value: Value = serde_json::from_str(&raw)
                        .with_context(|| format!("--at must be a JSON value, got {}", raw))?;
                    store.log_entries_at(&value)?
                }
                None => store.log_entries()?,
            };
            entries
                .into_iter()
                .map(|entry| entry.into_body().to_string())
                .collect()
        }
        Command::Clear => {
            store.clear()?;
            info!("Store cleared");
            Vec::new()
        }
    };
    Ok(lines)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so command output stays machine-readable.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(args.config.as_ref())?;
    let store = open_store(&args.url, config)
        .with_context(|| format!("cannot open store at {}", args.url))?;

    for line in run(&store, args.command)? {
        println!("{}", line);
    }
    Ok(())
}
