//! resilient-client command line.
//!
//! Loads a client configuration and inspects it without running any commands.
//!
//! ```text
//!     config.toml ──▶ loader ──▶ validation ──▶ ClientConfig
//!                                                 │
//!                      ┌──────────────────────────┴──────────────┐
//!                      ▼                                         ▼
//!               check: print JSON                 services: registry + round-robin
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use resilient_client::config::loader::load_config;
use resilient_client::load_balancer::Client;
use resilient_client::observability::{logging, metrics};
use resilient_client::{ClientConfig, InMemoryServiceRegistry, ServiceQuery};

#[derive(Parser)]
#[command(name = "resilient-client")]
#[command(about = "Inspect resilient-client configurations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and print the resolved configuration
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the configured instances matching a service query
    Services {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        name: String,

        #[arg(long)]
        version: Option<String>,

        #[arg(short, long = "role")]
        roles: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load(&config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Services {
            config,
            name,
            version,
            roles,
        } => {
            let config = load(&config)?;

            let mut query = ServiceQuery::new(name).roles(roles);
            if let Some(version) = version {
                query = query.version(version);
            }

            let registry = InMemoryServiceRegistry::from_services(config.services);
            let matches = registry.services(&query);
            println!("{}", serde_json::to_string_pretty(&matches)?);

            let picked = registry.client(query).call(|d| d.clone())?;
            println!("selected: {picked}");
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let config = load_config(path)?;

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("Logging already initialized: {e}");
    }
    tracing::info!(path = %path.display(), services = config.services.len(), "Configuration loaded");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }
    Ok(config)
}
