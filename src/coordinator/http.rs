//! HTTP API for the coordinator
//!
//! JSON request/response bodies from [`crate::common::types`]:
//! - `POST /join`, `POST /leave`: membership
//! - `POST /put`, `POST /delete`: file writes
//! - `GET /ls`, `GET /store`, `GET /members`, `GET /versions`: queries
//! - `GET /health`

use crate::common::types::{
    DeleteRequest, DeleteResponse, GetVersionsResponse, JoinAck, JoinRequest, LeaveAck,
    LeaveRequest, LsQuery, LsResponse, MemberList, PutAck, PutRequest, StoreQuery, StoreResponse,
    VersionsQuery,
};
use crate::common::Result;
use crate::coordinator::service::CoordinatorService;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct CoordState {
    pub service: Arc<CoordinatorService>,
}

/// Creates the HTTP router with all coordinator endpoints.
pub fn create_router(state: CoordState) -> Router {
    Router::new()
        // Membership
        .route("/join", post(join))
        .route("/leave", post(leave))
        .route("/members", get(members))
        // Files
        .route("/put", post(put))
        .route("/delete", post(delete))
        .route("/ls", get(ls))
        .route("/store", get(store))
        .route("/versions", get(versions))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn join(State(state): State<CoordState>, Json(req): Json<JoinRequest>) -> Result<Json<JoinAck>> {
    let node = state.service.join(&req.address, req.port).await?;
    Ok(Json(JoinAck { node }))
}

async fn leave(State(state): State<CoordState>, Json(req): Json<LeaveRequest>) -> Result<Json<LeaveAck>> {
    let removed = state.service.leave(&req.address).await?;
    Ok(Json(LeaveAck { removed }))
}

async fn put(State(state): State<CoordState>, Json(req): Json<PutRequest>) -> Result<Json<PutAck>> {
    let ack = state.service.put(&req.name, &req.source).await?;
    Ok(Json(ack))
}

async fn delete(State(state): State<CoordState>, Json(req): Json<DeleteRequest>) -> Json<DeleteResponse> {
    let existed = state.service.delete(&req.filename).await;
    Json(DeleteResponse { existed })
}

async fn ls(State(state): State<CoordState>, Query(q): Query<LsQuery>) -> Json<LsResponse> {
    let addresses = state.service.ls(&q.filename).await;
    Json(LsResponse { addresses })
}

async fn store(State(state): State<CoordState>, Query(q): Query<StoreQuery>) -> Json<StoreResponse> {
    let files = state.service.store(&q.address).await;
    Json(StoreResponse { files })
}

async fn members(State(state): State<CoordState>) -> Json<MemberList> {
    Json(state.service.members().await)
}

async fn versions(
    State(state): State<CoordState>,
    Query(q): Query<VersionsQuery>,
) -> Json<GetVersionsResponse> {
    let versions = state.service.versions(&q.filename, q.count).await;
    Json(GetVersionsResponse { versions })
}

/// Health check with cluster size
async fn health(State(state): State<CoordState>) -> impl IntoResponse {
    let ring = state.service.ring().await;
    Json(json!({
        "status": "healthy",
        "role": "coordinator",
        "members": ring.len(),
        "ring_generation": ring.generation(),
        "files": state.service.file_count().await,
        "replicas": state.service.config().replicas,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
