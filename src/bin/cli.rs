//! CLI for cluster operations

use clap::{Parser, Subcommand};
use ringfs::common::parse_duration;
use ringfs::CoordinatorClient;

#[derive(Parser)]
#[command(name = "ringfs")]
#[command(about = "ringfs distributed file store CLI")]
#[command(version)]
struct Cli {
    /// Coordinator URL
    #[arg(long, default_value = "http://localhost:60222")]
    coordinator: String,

    /// Per-request timeout
    #[arg(long, default_value = "1s")]
    timeout: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a node to the cluster
    Join {
        /// Node address
        address: String,

        /// Replica port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Remove a node from the cluster
    Leave {
        /// Node address
        address: String,
    },

    /// Record a write of a file
    Put {
        /// File name
        name: String,

        /// Address of the node holding the new content
        #[arg(long)]
        source: String,
    },

    /// Delete a file
    Delete {
        /// File name
        name: String,
    },

    /// List replicas of a file
    Ls {
        /// File name
        name: String,
    },

    /// List files replicated on a node
    Store {
        /// Node address
        address: String,
    },

    /// List cluster members
    Members,

    /// List version labels of a file
    Versions {
        /// File name
        name: String,

        /// Requested number of versions (logged by the coordinator; all labels are listed)
        #[arg(long, default_value = "0")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = CoordinatorClient::new(&cli.coordinator, parse_duration(&cli.timeout)?)?;

    match cli.command {
        Commands::Join { address, port } => {
            let node = client.join(&address, port).await?;
            println!(
                "Joined {} (port {}, iteration {})",
                node.address, node.port, node.iteration
            );
        }

        Commands::Leave { address } => {
            if client.leave(&address).await? {
                println!("Removed {}", address);
            } else {
                println!("{} was not a member", address);
            }
        }

        Commands::Put { name, source } => {
            let ack = client.put(&name, &source).await?;
            println!("PUT {} -> version {} ({})", name, ack.version, ack.op);
            println!("  Replicas: {}", ack.replicas.join(", "));
        }

        Commands::Delete { name } => {
            if client.delete(&name).await? {
                println!("Deleted {}", name);
            } else {
                println!("{} does not exist", name);
            }
        }

        Commands::Ls { name } => {
            for addr in client.ls(&name).await? {
                println!("{}", addr);
            }
        }

        Commands::Store { address } => {
            for file in client.store(&address).await? {
                println!("{}", file);
            }
        }

        Commands::Members => {
            println!("Membership List:");
            for (addr, node) in client.members().await? {
                println!(
                    "  {} (port {}, iteration {}, joined {})",
                    addr,
                    node.port,
                    node.iteration,
                    node.joined_at.to_rfc3339()
                );
            }
        }

        Commands::Versions { name, count } => {
            for label in client.versions(&name, count).await? {
                println!("{}", label);
            }
        }
    }

    Ok(())
}
