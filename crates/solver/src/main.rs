//! HTTPProxy Solver - command line entry point
//!
//! Runs a single convergence pass for one challenge against the file store.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use httpproxy_solver::{codec, Challenge, FileStore, HttpProxySolver, SolverError};
use solver_common::{init_tracing, LogFormat};
use solver_config::Config;

/// Exit status when duplicates were cleaned up and the pass should be retried
const EXIT_RETRY: i32 = 75;

/// Keeps one Contour HTTPProxy per ACME HTTP-01 challenge
#[derive(Parser, Debug)]
#[command(name = "httpproxy-solver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "HTTPPROXY_SOLVER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format (pretty or json)
    #[arg(long = "log-format", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Converge the challenge's HTTPProxy and print it
    Ensure {
        /// Challenge object as JSON
        #[arg(long = "challenge")]
        challenge: PathBuf,

        /// Service receiving the challenge traffic
        #[arg(long = "service")]
        service: String,

        /// Object store directory (overrides the configuration)
        #[arg(long = "store")]
        store: Option<PathBuf>,
    },
    /// Run the cleanup hook for a challenge
    Cleanup {
        /// Challenge object as JSON
        #[arg(long = "challenge")]
        challenge: PathBuf,
    },
    /// Validate configuration file and exit
    Test,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let log_level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_tracing(log_level, cli.log_format.unwrap_or(config.logging.format));

    match cli.command {
        Commands::Test => test_config(&config, cli.config.as_deref()),
        Commands::Ensure {
            challenge,
            service,
            store,
        } => {
            config.validate().context("Configuration validation failed")?;
            let store_path = store.unwrap_or_else(|| config.store.path.clone());
            run_ensure(config, &challenge, service, &store_path)
        }
        Commands::Cleanup { challenge } => {
            config.validate().context("Configuration validation failed")?;
            run_cleanup(config, &challenge)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

/// Test configuration file and exit
fn test_config(config: &Config, path: Option<&Path>) -> Result<()> {
    config.validate().context("Configuration validation failed")?;

    info!("Configuration test successful:");
    info!("  - listen port {}", config.solver.listen_port);
    info!("  - survivor policy {}", config.solver.survivor);
    info!("  - store at {}", config.store.path.display());

    println!(
        "httpproxy-solver: configuration file {} test is successful",
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    );

    Ok(())
}

fn run_ensure(config: Config, challenge_path: &Path, service: String, store_path: &Path) -> Result<()> {
    let challenge = read_challenge(challenge_path)?;
    let runtime = tokio::runtime::Runtime::new()?;

    let result = runtime.block_on(async {
        let store = FileStore::open(store_path)
            .await
            .with_context(|| format!("Failed to open object store {}", store_path.display()))?;
        let solver = HttpProxySolver::new(Arc::new(store), config.solver);
        let backend = solver.backend_for(service);

        Ok::<_, anyhow::Error>(solver.ensure(&challenge, &backend).await)
    })?;

    match result {
        Ok(proxy) => {
            let object = codec::encode(&proxy)?;
            println!("{}", serde_json::to_string_pretty(&object)?);
            Ok(())
        }
        Err(e @ SolverError::AmbiguousState { .. }) => {
            warn!(error = %e, "Duplicates removed, run again to converge");
            process::exit(EXIT_RETRY);
        }
        Err(e) => Err(e).context("Failed to ensure HTTPProxy"),
    }
}

fn run_cleanup(config: Config, challenge_path: &Path) -> Result<()> {
    let challenge = read_challenge(challenge_path)?;
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let store = FileStore::open(&config.store.path).await?;
        let solver = HttpProxySolver::new(Arc::new(store), config.solver);
        solver.cleanup(&challenge).await
    })?;

    info!(challenge = %challenge.key(), "Cleanup complete");
    Ok(())
}

fn read_challenge(path: &Path) -> Result<Challenge> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read challenge {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse challenge {}", path.display()))
}
