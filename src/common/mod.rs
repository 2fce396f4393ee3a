//! Common utilities and types shared across ringfs

pub mod config;
pub mod error;
pub mod hash;
pub mod types;
pub mod utils;

pub use config::{Config, CoordinatorConfig, ReplicaConfig, COORDINATOR_PORT, REPLICA_PORT};
pub use error::{Error, Result};
pub use hash::{ring_position, vnode_position};
pub use types::{FileGroup, FileUpdate, Node, OpKind, Replication};
pub use utils::{base_url, parse_duration, split_host_port};
