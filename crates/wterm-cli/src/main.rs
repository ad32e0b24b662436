//! wterm — tabbed remote shell client.
//!
//! Opens SSH sessions through a web shell proxy and drives them as tabs in
//! the local terminal.

mod commands;
mod config;
mod render;
mod terminal;

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use commands::connect::ConnectArgs;

/// wterm — tabbed remote shell client
#[derive(Parser)]
#[command(name = "wterm", version = "0.1.0", about = "Tabbed remote shells through a web shell proxy")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long = "log-file", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open one tab per target
    Connect {
        /// Targets in [user@]host format
        #[arg(required = true)]
        targets: Vec<String>,

        /// SSH port on the remote hosts
        #[arg(short, long)]
        port: Option<u16>,

        /// Authenticate with this private key instead of a password
        #[arg(short = 'i', long = "key-file")]
        key_file: Option<PathBuf>,

        /// Environment variable holding the key passphrase
        #[arg(long = "passphrase-env", requires = "key_file")]
        passphrase_env: Option<String>,
    },
}

fn init_tracing(verbose: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let filter = if verbose {
        "wterm=debug,wterm_cli=debug,wterm_client=debug,wterm_core=debug"
    } else {
        "wterm=warn,wterm_cli=warn,wterm_client=warn"
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(filter))
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(verbose)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(filter))
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .init();
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose, cli.log_file.as_ref())?;

    let config_path = cli.config.unwrap_or_else(config::Config::default_path);
    let cfg = config::Config::load(&config_path)?;

    match cli.command {
        Command::Connect {
            targets,
            port,
            key_file,
            passphrase_env,
        } => {
            let args = ConnectArgs {
                targets,
                port,
                key_file,
                passphrase_env,
            };
            commands::connect::run(args, &cfg).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("wterm: {e:#}");
        std::process::exit(1);
    }
}
