use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::config::ServerConfig;
use super::demo;
use crate::logging;
use crate::server::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "brrtmux")]
#[command(about = "brrtmux HTTP dispatcher", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the demo API
    Serve {
        /// TOML file with addr, workers, max_body_bytes and pool_capacity
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, overrides the config file
        #[arg(short, long, env = "BRRTMUX_ADDR")]
        addr: Option<String>,

        /// Worker threads, overrides the config file
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Print the demo route table
    Routes,
}

/// Parse `std::env::args` and run the selected command.
pub fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse())
}

/// Run an already parsed command line.
///
/// # Errors
///
/// Fails on an unreadable config file, a route table error, or when the
/// listener cannot bind.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            config,
            addr,
            workers,
        } => {
            let _guard = logging::init_logging()?;
            let settings = resolve_config(config, addr, workers)?;
            let dispatcher = Arc::new(demo::router(&settings)?.build());
            let handle = HttpServer::new(dispatcher)
                .workers(settings.workers)
                .start(settings.addr.as_str())
                .with_context(|| format!("failed to listen on {}", settings.addr))?;
            info!(addr = %handle.addr(), workers = settings.workers, "brrtmux demo API ready");
            handle.join();
            Ok(())
        }
        Commands::Routes => {
            let router = demo::router(&ServerConfig::default())?;
            for (method, pattern) in router.routes() {
                println!("{:<8}{pattern}", method.as_str());
            }
            Ok(())
        }
    }
}

/// Layer the environment, the optional config file and the flags.
pub fn resolve_config(
    config: Option<PathBuf>,
    addr: Option<String>,
    workers: Option<usize>,
) -> anyhow::Result<ServerConfig> {
    let mut settings = ServerConfig::from_env();
    if let Some(path) = config {
        settings = settings.merge_file(&path)?;
    }
    let settings = settings.with_overrides(addr, workers);
    anyhow::ensure!(settings.workers > 0, "--workers must be at least 1");
    Ok(settings)
}
