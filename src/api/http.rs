use super::AppState;
use crate::error::{GatewayError, GatewayResult};
use crate::types::{
    LogsQuery, NamespaceParam, PodActionResult, ScaleBody, ScaleResult, WorkloadKind,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mode: state.backend.mode(),
    })
}

#[derive(Debug, Serialize)]
pub struct ScaleResponse {
    pub status: &'static str,
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
}

impl From<ScaleResult> for ScaleResponse {
    fn from(result: ScaleResult) -> Self {
        Self {
            status: "scaled",
            kind: result.kind,
            namespace: result.namespace,
            name: result.name,
            replicas: result.replicas,
        }
    }
}

pub async fn scale(
    State(state): State<AppState>,
    body: Result<Json<ScaleBody>, JsonRejection>,
) -> GatewayResult<Json<ScaleResponse>> {
    let Json(body) = body?;
    let result = state.scaler.scale(body).await?;
    Ok(Json(result.into()))
}

/// Plain-text log snapshot; `text/plain` comes from the `String` response.
pub async fn pod_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> GatewayResult<String> {
    state.pods.snapshot_logs(query).await
}

/// The body is optional: `{"ns": "..."}` or nothing at all.
pub async fn restart_pod(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> GatewayResult<Json<PodActionResult>> {
    let params: NamespaceParam = if body.iter().all(u8::is_ascii_whitespace) {
        NamespaceParam::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| GatewayError::Validation(format!("invalid request body: {}", e)))?
    };
    let result = state.pods.restart(params.ns, &name).await?;
    Ok(Json(result))
}

pub async fn delete_pod(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<NamespaceParam>,
) -> GatewayResult<Json<PodActionResult>> {
    let result = state.pods.delete(params.ns, &name).await?;
    Ok(Json(result))
}
