//! HTTP endpoint of a replica node
//!
//! Answers the coordinator's heartbeats, file-update notifications and both
//! halves of the replication handshake.

use crate::common::types::{Ack, Heartbeat};
use crate::common::{Error, FileUpdate, OpKind, Replication, Result};
use crate::replica::transfer::{BulkTransfer, TransferRequest};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ReplicaState {
    pub address: String,
    /// Latest version this node was told about, per file
    pub files: Arc<Mutex<BTreeMap<String, u64>>>,
    pub transfer: Arc<dyn BulkTransfer>,
}

impl ReplicaState {
    pub fn new(address: impl Into<String>, transfer: Arc<dyn BulkTransfer>) -> Self {
        Self {
            address: address.into(),
            files: Arc::new(Mutex::new(BTreeMap::new())),
            transfer,
        }
    }

    fn with_files<T>(&self, f: impl FnOnce(&mut BTreeMap<String, u64>) -> T) -> Result<T> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| Error::Internal("file table poisoned".into()))?;
        Ok(f(&mut files))
    }
}

pub fn create_router(state: ReplicaState) -> Router {
    Router::new()
        .route("/heartbeat", post(heartbeat))
        .route("/file-update", post(file_update))
        .route("/replication/send", post(send_replication))
        .route("/replication/receive", post(receive_replication))
        .route("/files", get(files))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn heartbeat(Json(ping): Json<Heartbeat>) -> Json<Ack> {
    tracing::trace!(from = %ping.from, "heartbeat");
    Json(Ack::ok())
}

async fn file_update(
    State(state): State<ReplicaState>,
    Json(update): Json<FileUpdate>,
) -> Result<Json<Ack>> {
    match update.op {
        OpKind::New => {
            tracing::info!(file = %update.name, version = update.version, "received new file");
            state.with_files(|f| f.insert(update.name.clone(), update.version))?;
        }
        OpKind::Update => {
            tracing::info!(file = %update.name, version = update.version, "updated file");
            state.with_files(|f| {
                let v = f.entry(update.name.clone()).or_insert(0);
                *v = (*v).max(update.version);
            })?;
        }
        OpKind::Delete => {
            tracing::info!(file = %update.name, "deleted all versions of file");
            state.with_files(|f| f.remove(&update.name))?;
        }
        OpKind::ReadAck => {
            tracing::info!(file = %update.name, version = update.version, "acking read");
        }
    }
    Ok(Json(Ack::ok()))
}

async fn send_replication(
    State(state): State<ReplicaState>,
    Json(rep): Json<Replication>,
) -> Result<Json<Ack>> {
    if rep.source != state.address {
        tracing::warn!(source = %rep.source, local = %state.address, "push requested from another source address");
    }
    state.transfer.transfer(&TransferRequest::from(&rep)).await?;
    Ok(Json(Ack::ok()))
}

async fn receive_replication(
    State(state): State<ReplicaState>,
    Json(rep): Json<Replication>,
) -> Result<Json<Ack>> {
    tracing::info!(
        file = %rep.file.name,
        version = rep.file.version,
        source = %rep.source,
        transfer_id = %rep.transfer_id,
        "received file"
    );
    state.with_files(|f| {
        let v = f.entry(rep.file.name.clone()).or_insert(0);
        *v = (*v).max(rep.file.version);
    })?;
    Ok(Json(Ack::ok()))
}

async fn files(State(state): State<ReplicaState>) -> Result<Json<BTreeMap<String, u64>>> {
    Ok(Json(state.with_files(|f| f.clone())?))
}

async fn health(State(state): State<ReplicaState>) -> impl IntoResponse {
    let files = state.with_files(|f| f.len()).unwrap_or_default();
    Json(json!({
        "status": "healthy",
        "role": "replica",
        "address": state.address,
        "files": files,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
