//! # ringfs
//!
//! A distributed file-storage coordinator:
//! - Consistent hashing with virtual nodes for replica placement
//! - Heartbeat failure detection with bounded, parallel probes
//! - Per-file version counters and replica sets
//! - Re-replication of affected files on every topology change
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             Coordinator                 │
//! │  members · ring snapshot · directory    │
//! │  failure detector (periodic probes)     │
//! └───────────┬─────────────────────────────┘
//!             │ HTTP/JSON
//!   ┌─────────┴──────────┬──────────────┐
//!   │                    │              │
//! ┌─▼──────────┐   ┌─────▼──────┐   ┌───▼────────┐
//! │ Replica A  │   │ Replica B  │   │ Replica C  │
//! │ heartbeat  │   │ heartbeat  │   │ heartbeat  │
//! │ updates    │   │ updates    │   │ updates    │
//! └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! There is exactly one coordinator; it owns all cluster state.
//!
//! ## Usage
//!
//! ### Start a coordinator
//! ```bash
//! ringfs-coord serve --bind 0.0.0.0:60222 --advertise coord-1 --replicas 3
//! ```
//!
//! ### Start a replica
//! ```bash
//! ringfs-replica serve --bind 0.0.0.0:60221 --advertise node-1 \
//!   --coordinator http://coord-1:60222
//! ```
//!
//! ### Use the CLI
//! ```bash
//! ringfs put report.pdf --source node-1
//! ringfs ls report.pdf
//! ringfs store node-1
//! ringfs versions report.pdf --count 3
//! ringfs members
//! ```

pub mod client;
pub mod common;
pub mod coordinator;
pub mod replica;

// Re-export commonly used types
pub use client::CoordinatorClient;
pub use common::{Config, Error, Result};
pub use coordinator::{Coordinator, CoordinatorService, Ring};
pub use replica::ReplicaServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
