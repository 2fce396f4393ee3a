//! Bulk data transfer boundary
//!
//! Moving file bytes between nodes is not the coordinator's job. A replica
//! asked to push a copy hands the request to a [`BulkTransfer`]
//! implementation.

use crate::common::{Replication, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// What to copy, from where, to where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: String,
    pub destination: String,
    pub filename: String,
    pub version: u64,
}

impl From<&Replication> for TransferRequest {
    fn from(rep: &Replication) -> Self {
        Self {
            source: rep.source.clone(),
            destination: rep.destination.clone(),
            filename: rep.file.name.clone(),
            version: rep.file.version,
        }
    }
}

#[async_trait]
pub trait BulkTransfer: Send + Sync + 'static {
    async fn transfer(&self, request: &TransferRequest) -> Result<()>;
}

/// Records transfer requests without moving any bytes
#[derive(Debug, Default)]
pub struct LoggingTransfer {
    requests: Mutex<Vec<TransferRequest>>,
}

impl LoggingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BulkTransfer for LoggingTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<()> {
        tracing::info!(
            file = %request.filename,
            version = request.version,
            destination = %request.destination,
            "sending file"
        );
        self.requests
            .lock()
            .map_err(|_| crate::Error::Internal("transfer log poisoned".into()))?
            .push(request.clone());
        Ok(())
    }
}
