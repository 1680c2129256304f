//! Camino Node - platform chain state engine.
//!
//! This is the main entry point for the camino-node binary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;

use config::NodeConfig;
use node::Node;

/// Camino platform chain node.
#[derive(Parser, Debug)]
#[command(name = "camino-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camino-node.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Network (mainnet, testnet, local)
    #[arg(short, long, default_value = "local")]
    network: String,

    /// Genesis file applied to an empty database
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print version and exit
    #[arg(long)]
    version_info: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the chain status
    Status,
    /// Issue and accept due system transactions
    Tick {
        /// Most blocks to accept
        #[arg(long, default_value = "16")]
        max_blocks: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version_info {
        print_version();
        return Ok(());
    }

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Camino Node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(&args.config, &args)?;

    info!("Network: {} ({})", config.network, config.executor.network_id);
    info!("Data directory: {:?}", config.data_dir);

    let node = Node::open(config)?;

    match args.command.unwrap_or(Command::Status) {
        Command::Status => {}
        Command::Tick { max_blocks } => {
            let accepted = node.tick(max_blocks)?;
            info!(accepted, "Accepted system blocks");
        }
    }
    println!("{}", node.status()?);

    Ok(())
}

fn print_version() {
    println!("Camino Node");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Codec: {}", camino_types::codec::CODEC_VERSION);
    println!();
    println!("Built with:");
    println!("  RocksDB for storage");
    println!("  ed25519-dalek for signatures");
}
