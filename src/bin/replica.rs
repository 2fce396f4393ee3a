//! Replica binary

use clap::{Parser, Subcommand};
use ringfs::common::Config;
use ringfs::ReplicaServer;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ringfs-replica")]
#[command(about = "ringfs replica node")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start replica server
    Serve {
        /// Bind address for the replica endpoint
        #[arg(long)]
        bind: Option<String>,

        /// Address this node joins the cluster with
        #[arg(long)]
        advertise: Option<String>,

        /// Coordinator URL
        #[arg(long)]
        coordinator: Option<String>,

        /// Do not join/leave the coordinator automatically
        #[arg(long)]
        no_join: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            advertise,
            coordinator,
            no_join,
        } => {
            let mut replica_config = config.replica.unwrap_or_default();
            if let Some(bind) = bind {
                replica_config.bind_addr = bind.parse()?;
            }
            if let Some(advertise) = advertise {
                replica_config.advertise_addr = advertise;
            }
            if let Some(coordinator) = coordinator {
                replica_config.coordinator_url = coordinator;
            }
            if no_join {
                replica_config.auto_join = false;
            }

            ReplicaServer::new(replica_config)
                .serve(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("shutting down");
                })
                .await?;
        }
    }

    Ok(())
}
