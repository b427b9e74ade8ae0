pub mod http;
pub mod socket;

use crate::gateway::{Backend, GatewaySettings, PodOperations, ScaleOrchestrator};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub settings: Arc<GatewaySettings>,
    pub scaler: ScaleOrchestrator,
    pub pods: PodOperations,
    pub buffer_size: usize,
}

impl AppState {
    pub fn new(backend: Backend, settings: GatewaySettings, buffer_size: usize) -> Self {
        let settings = Arc::new(settings);
        Self {
            scaler: ScaleOrchestrator::new(backend.clone(), Arc::clone(&settings)),
            pods: PodOperations::new(backend.clone(), Arc::clone(&settings)),
            backend,
            settings,
            buffer_size: buffer_size.max(1),
        }
    }
}

pub fn create_router(state: AppState, frontend_url: Option<&str>) -> Router {
    Router::new()
        .route("/api/health", get(http::health_check))
        .route("/api/k8s/scale", post(http::scale))
        .route("/api/k8s/logs", get(http::pod_logs))
        .route("/api/k8s/pods/:name/restart", post(http::restart_pod))
        .route("/api/k8s/pods/:name", delete(http::delete_pod))
        .route("/ws/logs", get(socket::logs_socket))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(frontend_url))
        .with_state(state)
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match frontend_url.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid frontend URL for CORS: {}", e);
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}
