//! Configuration for ringfs components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default port of the coordinator API
pub const COORDINATOR_PORT: u16 = 60222;
/// Default port of the replica endpoint
pub const REPLICA_PORT: u16 = 60221;

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Replica-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica: Option<ReplicaConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from an optional TOML file, then `RINGFS_*` env vars.
    ///
    /// Nested keys use a double underscore: `RINGFS_COORDINATOR__REPLICAS=3`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("RINGFS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let mut cfg: Config = settings.try_deserialize()?;
        if cfg.log_level.is_empty() {
            cfg.log_level = default_log_level();
        }
        Ok(cfg)
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for the coordinator API
    #[serde(default = "default_coordinator_bind")]
    pub bind_addr: SocketAddr,

    /// Address under which this coordinator is known to the cluster
    #[serde(default = "default_advertise")]
    pub advertise_addr: String,

    /// Replication factor
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Positions each node occupies on the hash ring
    #[serde(default = "default_virtual_nodes")]
    pub virtual_nodes: usize,

    /// Period of the failure-detection loop
    #[serde(default = "default_ping_period")]
    pub ping_period_ms: u64,

    /// How long a heartbeat may stay unacknowledged
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,

    /// Per-call timeout for file updates and replication calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Port replicas listen on when a join request does not name one
    #[serde(default = "default_replica_port")]
    pub replica_port: u16,
}

fn default_coordinator_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], COORDINATOR_PORT))
}
fn default_advertise() -> String {
    "127.0.0.1".to_string()
}
fn default_replicas() -> usize {
    4
}
fn default_virtual_nodes() -> usize {
    160
}
fn default_ping_period() -> u64 {
    3_000
}
fn default_ping_timeout() -> u64 {
    1_500
}
fn default_request_timeout() -> u64 {
    1_000
}
fn default_replica_port() -> u16 {
    REPLICA_PORT
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_coordinator_bind(),
            advertise_addr: default_advertise(),
            replicas: default_replicas(),
            virtual_nodes: default_virtual_nodes(),
            ping_period_ms: default_ping_period(),
            ping_timeout_ms: default_ping_timeout(),
            request_timeout_ms: default_request_timeout(),
            replica_port: default_replica_port(),
        }
    }
}

impl CoordinatorConfig {
    pub fn ping_period(&self) -> Duration {
        Duration::from_millis(self.ping_period_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject settings the coordinator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::InvalidConfig("replicas must be at least 1".into()));
        }
        if self.virtual_nodes == 0 {
            return Err(Error::InvalidConfig(
                "virtual_nodes must be at least 1".into(),
            ));
        }
        if self.ping_period_ms == 0 || self.ping_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".into()));
        }
        if self.ping_timeout_ms > self.ping_period_ms {
            tracing::warn!(
                ping_timeout_ms = self.ping_timeout_ms,
                ping_period_ms = self.ping_period_ms,
                "ping timeout exceeds ping period, detection cycles will run back to back"
            );
        }
        Ok(())
    }
}

/// Replica configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Bind address for the replica endpoint
    #[serde(default = "default_replica_bind")]
    pub bind_addr: SocketAddr,

    /// Address under which this replica joins the cluster. It must differ
    /// from the coordinator's advertised address, which the coordinator
    /// never probes or notifies.
    #[serde(default = "default_replica_advertise")]
    pub advertise_addr: String,

    /// Coordinator base URL
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,

    /// Join the coordinator on start-up and leave on shutdown
    #[serde(default = "default_auto_join")]
    pub auto_join: bool,

    /// Per-call timeout for calls to the coordinator
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_replica_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], REPLICA_PORT))
}
fn default_replica_advertise() -> String {
    format!("127.0.0.1:{}", REPLICA_PORT)
}
fn default_coordinator_url() -> String {
    format!("http://127.0.0.1:{}", COORDINATOR_PORT)
}
fn default_auto_join() -> bool {
    true
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_replica_bind(),
            advertise_addr: default_replica_advertise(),
            coordinator_url: default_coordinator_url(),
            auto_join: default_auto_join(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ReplicaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
