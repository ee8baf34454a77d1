//! devparam CLI - Parameter partition admin tool
//!
//! Reads and writes device parameters through the same store the platform
//! services use.

mod value;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devparam_common::Config;
use devparam_store::layout::{NAD_DDR_RESULT_SIZE, NAD_RECORD_SIZE};
use devparam_store::{
    PARAM_BLOCK_SIZE, ParamField, ParamStore, WriteOutcome, show_remote_lock, store_remote_lock,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "devparam")]
#[command(about = "Device parameter partition tool")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/devparam/devparam.toml")]
    config: PathBuf,

    /// Parameter partition (overrides the config file)
    #[arg(short, long, env = "DEVPARAM_DEVICE")]
    device: Option<PathBuf>,

    /// Sales code handed over by the bootloader (overrides the config file)
    #[arg(long)]
    sales_code: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the fields this device recognizes
    Fields {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Read a field
    Get {
        /// Field name (see `fields`)
        field: ParamField,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a field
    Set {
        /// Field name (see `fields`)
        field: ParamField,
        /// Number, comma-separated numbers, text or hex bytes, by field kind
        value: String,
    },
    /// Remote lock operations
    Lock {
        #[command(subcommand)]
        action: LockCommands,
    },
    /// Check the boot sales code against a prefix (exit status 1 if it differs)
    SalesCodeIs {
        /// Prefix to compare
        prefix: String,
    },
    /// Create or extend an image file large enough for the configured layout
    Init,
}

#[derive(Subcommand, Debug)]
enum LockCommands {
    /// Show the remote lock state
    Show,
    /// Engage (non-zero) or release (0) the remote lock
    Set {
        /// Toggle value
        value: String,
    },
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;

    // CLI takes precedence over the config file
    if let Some(device) = args.device {
        config.store.device_path = device;
    }
    if args.sales_code.is_some() {
        config.boot.sales_code = args.sales_code;
    }
    let log_level = args.log_level.unwrap_or_else(|| config.logging.level.clone());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Parameter partition: {}", config.store.device_path.display());

    let store = ParamStore::open(&config)?;
    let result = run(&config, &store, args.command);
    store.shutdown();
    result
}

/// Run one subcommand against an open store
///
/// Returns the process exit status so the caller can still shut the store
/// down before exiting.
fn run(config: &Config, store: &ParamStore, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Fields { json } => {
            for descriptor in store.registry().iter() {
                if json {
                    let line = serde_json::json!({
                        "field": descriptor.field,
                        "index": descriptor.field.index(),
                        "size": descriptor.size(),
                        "kind": descriptor.kind,
                        "out_of_band": descriptor.is_out_of_band(),
                    });
                    println!("{line}");
                } else {
                    println!(
                        "{:>3}  {:<24} {:>4}  {:?}",
                        descriptor.field.index(),
                        descriptor.field.name(),
                        descriptor.size(),
                        descriptor.kind
                    );
                }
            }
        }
        Commands::Get { field, json } => {
            let kind = store.registry().lookup(field)?.kind;
            let rendered = value::render(kind, &store.get(field)?);
            if json {
                let line = serde_json::json!({
                    "field": field,
                    "index": field.index(),
                    "value": rendered,
                });
                println!("{line}");
            } else {
                println!("{rendered}");
            }
        }
        Commands::Set { field, value } => {
            let kind = store.registry().lookup(field)?.kind;
            let bytes = value::parse(kind, &value)?;
            report(field, store.set(field, &bytes)?);
        }
        Commands::Lock { action } => match action {
            LockCommands::Show => print!("{}", show_remote_lock(store)?),
            LockCommands::Set { value } => {
                report(ParamField::RemoteLock, store_remote_lock(store, &value)?);
            }
        },
        Commands::SalesCodeIs { prefix } => {
            let matches = store.sales_code_is(&prefix);
            println!("{matches}");
            if !matches {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Init => init_image(config)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn report(field: ParamField, outcome: WriteOutcome) {
    match outcome {
        WriteOutcome::Applied => info!("{field} updated"),
        WriteOutcome::Ignored => warn!("{field}: value not accepted, stored value unchanged"),
    }
}

fn init_image(config: &Config) -> Result<()> {
    let mut size = config.store.block_offset + PARAM_BLOCK_SIZE as u64;
    if let Some(nad) = config.fields.nad {
        size = size
            .max(nad.record_offset + NAD_RECORD_SIZE as u64)
            .max(nad.ddr_result_offset + NAD_DDR_RESULT_SIZE as u64);
    }

    let path = &config.store.device_path;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let current = file.metadata()?.len();
    if current < size {
        file.set_len(size)
            .with_context(|| format!("failed to size {}", path.display()))?;
    }

    println!("{}: {} bytes", path.display(), current.max(size));
    Ok(())
}
