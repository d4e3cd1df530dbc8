//! Result-ingestion API.
//!
//!   GET  /identity             — ledger address, peer id and role of this node
//!   POST /results/{topic_id}   — hand one execution's results to the aggregator
//!                                matching the node role
//!
//! Worker results are dispatched in the background (202). Reputer results are
//! submitted before the response is sent (200 with the tx hash, 502 on failure).

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use topiq_protocol::TopicId;

use crate::{
    execution::ExecutionResults,
    identity::NodeRole,
    pipeline::{Outcome, Pipeline},
};

#[derive(Clone)]
pub struct ApiState(Arc<ApiInner>);

struct ApiInner {
    pipeline: Pipeline,
    /// Bearer token required on POST routes. None disables the check.
    api_secret: Option<String>,
}

impl ApiState {
    pub fn new(pipeline: Pipeline, api_secret: Option<String>) -> Self {
        Self(Arc::new(ApiInner { pipeline, api_secret }))
    }
}

#[derive(Serialize)]
struct IdentityView {
    address: String,
    account_name: String,
    peer_id: String,
    role: NodeRole,
}

// ============================================================================
// Server
// ============================================================================

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/identity",            get(get_identity))
        .route("/results/{topic_id}",  post(post_results))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    state: ApiState,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_identity(State(state): State<ApiState>) -> impl IntoResponse {
    let identity = &state.0.pipeline.identity;
    Json(IdentityView {
        address: identity.address.clone(),
        account_name: identity.account_name.clone(),
        peer_id: identity.peer_id.to_base58(),
        role: identity.role,
    })
}

async fn post_results(
    State(state):   State<ApiState>,
    Path(topic_id): Path<TopicId>,
    headers:        HeaderMap,
    Json(results):  Json<ExecutionResults>,
) -> impl IntoResponse {
    if let Some(ref secret) = state.0.api_secret {
        let expected = format!("Bearer {secret}");
        let provided = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !ct_eq(provided, &expected) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "unauthorized" })),
            );
        }
    }

    tracing::info!(topic = topic_id, groups = results.len(), "Received execution results");

    let reply = match state.0.pipeline.process(topic_id, &results).await {
        Ok(Outcome::Worker(dispatch)) => {
            serde_json::to_value(dispatch).map(|body| (StatusCode::ACCEPTED, body))
        }
        Ok(Outcome::Reputer(submission)) => {
            serde_json::to_value(submission).map(|body| (StatusCode::OK, body))
        }
        Err(e) => {
            tracing::warn!(topic = topic_id, error = %e, "Result processing failed");
            Ok((StatusCode::BAD_GATEWAY, serde_json::json!({ "error": e.to_string() })))
        }
    };

    match reply {
        Ok((status, body)) => (status, Json(body)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

fn ct_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let len = a.len().max(b.len());
    let mut diff: u8 = (a.len() ^ b.len()) as u8;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }
    diff == 0
}
