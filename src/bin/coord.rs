//! Coordinator binary

use clap::{Parser, Subcommand};
use ringfs::common::{parse_duration, Config};
use ringfs::Coordinator;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ringfs-coord")]
#[command(about = "ringfs coordinator: membership, placement and re-replication")]
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
    /// Start coordinator server
    Serve {
        /// Bind address for the API
        #[arg(long)]
        bind: Option<String>,

        /// Address this coordinator is known by
        #[arg(long)]
        advertise: Option<String>,

        /// Replication factor
        #[arg(long)]
        replicas: Option<usize>,

        /// Virtual nodes per member on the hash ring
        #[arg(long)]
        vnodes: Option<usize>,

        /// Failure-detection period (e.g. 3s)
        #[arg(long)]
        ping_period: Option<String>,

        /// Heartbeat timeout (e.g. 1500ms)
        #[arg(long)]
        ping_timeout: Option<String>,

        /// Timeout for file updates and replication calls
        #[arg(long)]
        request_timeout: Option<String>,
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
            replicas,
            vnodes,
            ping_period,
            ping_timeout,
            request_timeout,
        } => {
            // File/env config first, CLI flags take priority
            let mut coord_config = config.coordinator.unwrap_or_default();
            if let Some(bind) = bind {
                coord_config.bind_addr = bind.parse()?;
            }
            if let Some(advertise) = advertise {
                coord_config.advertise_addr = advertise;
            }
            if let Some(replicas) = replicas {
                coord_config.replicas = replicas;
            }
            if let Some(vnodes) = vnodes {
                coord_config.virtual_nodes = vnodes;
            }
            if let Some(period) = ping_period {
                coord_config.ping_period_ms = parse_duration(&period)?.as_millis() as u64;
            }
            if let Some(timeout) = ping_timeout {
                coord_config.ping_timeout_ms = parse_duration(&timeout)?.as_millis() as u64;
            }
            if let Some(timeout) = request_timeout {
                coord_config.request_timeout_ms = parse_duration(&timeout)?.as_millis() as u64;
            }
            coord_config.validate()?;

            let coord = Coordinator::new(coord_config);
            coord
                .serve(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("shutting down");
                })
                .await?;
        }
    }

    Ok(())
}
