//! Records exchanged between the coordinator, replicas and clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// A cluster member. Identity is the address; `iteration` grows each time
/// the same address joins again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub address: String,
    pub port: u16,
    pub iteration: u64,
    pub joined_at: DateTime<Utc>,
}

impl Node {
    pub fn new(address: impl Into<String>, port: u16, iteration: u64) -> Self {
        Self {
            address: address.into(),
            port,
            iteration,
            joined_at: Utc::now(),
        }
    }

    /// Base URL of this node's replica endpoint, always on `self.port`
    pub fn endpoint(&self) -> String {
        let (host, _) = crate::common::utils::split_host_port(&self.address);
        format!("http://{}:{}", host, self.port)
    }
}

/// Kind of file mutation carried by a [`FileUpdate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    New,
    Update,
    Delete,
    ReadAck,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::New => write!(f, "new"),
            OpKind::Update => write!(f, "update"),
            OpKind::Delete => write!(f, "delete"),
            OpKind::ReadAck => write!(f, "read-ack"),
        }
    }
}

/// Per-file replication metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroup {
    pub name: String,
    pub version: u64,
    pub replicas: BTreeSet<String>,
}

/// Notification sent to replicas after a write or delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub name: String,
    pub version: u64,
    pub op: OpKind,
}

/// One source → destination copy instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replication {
    pub transfer_id: Uuid,
    pub source: String,
    pub destination: String,
    pub file: FileGroup,
}

impl Replication {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, file: FileGroup) -> Self {
        Self {
            transfer_id: Uuid::new_v4(),
            source: source.into(),
            destination: destination.into(),
            file,
        }
    }
}

// === Coordinator API ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinAck {
    pub node: Node,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveAck {
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRequest {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutAck {
    pub version: u64,
    pub op: OpKind,
    pub replicas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub existed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsQuery {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsResponse {
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreQuery {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub files: Vec<String>,
}

pub type MemberList = BTreeMap<String, Node>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionsQuery {
    pub filename: String,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetVersionsResponse {
    pub versions: Vec<String>,
}

// === Replica API ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
