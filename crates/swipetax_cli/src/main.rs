//! SwipeTax CLI
//!
//! Command-line tools for the SwipeTax sync engine.
//!
//! # Commands
//!
//! - `inspect` - Display mutation log and record store state
//! - `prune` - Remove confirmed mutations past the retention window
//! - `sync` - Run one sync session against a server
//! - `resolve-endpoint` - Show the base URL a runtime would resolve to

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SwipeTax sync command-line tools.
#[derive(Parser)]
#[command(name = "swipetax")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mutation log and record store state
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove confirmed mutations older than the given age
    Prune {
        /// Maximum age of confirmed mutations, in seconds
        #[arg(long)]
        max_age_secs: u64,
    },

    /// Run one sync session against a server
    Sync {
        /// Server base URL (e.g. https://functions.swipetax.app)
        #[arg(long)]
        base_url: String,

        /// Device id (UUID); generated when omitted
        #[arg(long)]
        device_id: Option<String>,

        /// Bearer token attached to each call
        #[arg(long)]
        token: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the base URL a runtime environment would resolve to
    ResolveEndpoint {
        /// Origin scheme (e.g. https, capacitor)
        #[arg(long)]
        scheme: String,

        /// Origin host
        #[arg(long)]
        host: String,

        /// Origin port, when bound
        #[arg(long)]
        port: Option<u16>,

        /// Explicit base-URL override
        #[arg(long)]
        override_url: Option<String>,

        /// Remote functions URL used for native contexts
        #[arg(long)]
        functions_url: String,
    },

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

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data directory required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Prune { max_age_secs } => {
            let path = cli.path.ok_or("Data directory required for prune")?;
            commands::prune::run(&path, max_age_secs)?;
        }
        Commands::Sync {
            base_url,
            device_id,
            token,
            format,
        } => {
            let path = cli.path.ok_or("Data directory required for sync")?;
            commands::sync::run(&path, &base_url, device_id.as_deref(), token, &format)?;
        }
        Commands::ResolveEndpoint {
            scheme,
            host,
            port,
            override_url,
            functions_url,
        } => {
            commands::endpoint::run(&scheme, &host, port, override_url, &functions_url);
        }
        Commands::Version => {
            println!("SwipeTax CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
