//! Replica node
//!
//! Handles the coordinator-facing side of a storage node:
//! - Heartbeat acknowledgements
//! - File update notifications (new, update, delete, read-ack)
//! - Replication push (source side) and receive (destination side)

pub mod http;
pub mod server;
pub mod transfer;

pub use server::ReplicaServer;
pub use transfer::{BulkTransfer, LoggingTransfer, TransferRequest};
