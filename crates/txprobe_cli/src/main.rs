//! txprobe CLI
//!
//! Runs the transaction visibility probes against an in-memory
//! coordinator and logs observations for manual inspection.
//!
//! # Commands
//!
//! - `object-cache` - exercise the namespaced object cache
//! - `repository` - exercise content repository sessions
//! - `directory` - exercise the identity directory query cache
//! - `all` - run every scenario back to back on one wiring
//! - `version` - show version information

mod commands;

use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use txprobe_probes::ProbeSet;
use txprobe_store::CacheConfig;

/// Transaction visibility probe runner.
#[derive(Parser)]
#[command(name = "txprobe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Cache entry expiration in milliseconds (0 disables expiration)
    #[arg(global = true, long, default_value = "50000")]
    expiration_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exercise the namespaced object cache
    ObjectCache {
        /// Bracket the run with transactions
        #[arg(short, long)]
        transactional: bool,
    },

    /// Exercise content repository sessions
    Repository {
        /// Scenario to run
        #[arg(short, long, value_enum, default_value = "transactional")]
        scenario: commands::repository::Scenario,
    },

    /// Exercise the identity directory query cache
    Directory,

    /// Run every scenario back to back on one wiring
    All,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let expiration = match cli.expiration_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    let probes = ProbeSet::in_memory(CacheConfig::new().expiration(expiration));

    match cli.command {
        Commands::ObjectCache { transactional } => {
            commands::object_cache::run(&probes, transactional)?;
        }
        Commands::Repository { scenario } => {
            commands::repository::run(&probes, scenario)?;
        }
        Commands::Directory => {
            commands::directory::run(&probes)?;
        }
        Commands::All => {
            commands::object_cache::run(&probes, false)?;
            commands::object_cache::run(&probes, true)?;
            commands::repository::run(&probes, commands::repository::Scenario::Direct)?;
            commands::repository::run(&probes, commands::repository::Scenario::Transactional)?;
            commands::repository::run(&probes, commands::repository::Scenario::Rollback)?;
            commands::directory::run(&probes)?;
        }
        Commands::Version => {
            println!("txprobe CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("txprobe Core v{}", txprobe_core::VERSION);
        }
    }

    Ok(())
}
