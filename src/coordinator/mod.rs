//! Coordinator implementation
//!
//! The coordinator is responsible for:
//! - Membership (join, leave, detected failures)
//! - Placement decisions (consistent hash ring with virtual nodes)
//! - File metadata (versions, replica sets)
//! - Re-replication when the topology changes
//! - Health monitoring via heartbeats

pub mod detector;
pub mod diff;
pub mod directory;
pub mod http;
pub mod replica_client;
pub mod ring;
pub mod server;
pub mod service;

pub use detector::FailureDetector;
pub use diff::ReplicationDiffEngine;
pub use directory::FileDirectory;
pub use replica_client::{HttpReplicaClient, ReplicaClient};
pub use ring::Ring;
pub use server::Coordinator;
pub use service::CoordinatorService;
