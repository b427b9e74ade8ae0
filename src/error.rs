use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

/// Messages produced when a log stream is torn down underneath its reader.
static TRANSIENT_TRANSPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(aborted|ECONNRESET|socket hang up|connection reset|broken pipe)",
    )
    .expect("transport pattern is valid")
});

pub fn is_transient_transport_message(message: &str) -> bool {
    TRANSIENT_TRANSPORT.is_match(message)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Malformed input, rejected before anything leaves the process.
    #[error("{0}")]
    Validation(String),

    #[error("{resource} {name} not found in namespace {namespace}")]
    NotFound {
        resource: String,
        namespace: String,
        name: String,
    },

    /// Stream teardown noise. Logged, never shown to a client.
    #[error("transport interrupted: {0}")]
    TransientTransport(String),

    #[error("{message}")]
    Orchestrator {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    Configuration(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Classify a kube client failure for the named object.
    ///
    /// Anything that is not an API status becomes an `Orchestrator` error
    /// without a code; only log streams treat teardown noise specially.
    pub fn from_kube(err: kube::Error, resource: &str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => GatewayError::NotFound {
                resource: resource.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(response) => GatewayError::Orchestrator {
                status: Some(response.code),
                message: response.message.clone(),
            },
            other => GatewayError::Orchestrator {
                status: None,
                message: other.to_string(),
            },
        }
    }

    /// Like [`GatewayError::from_kube`], for failures while opening a follow
    /// log stream.
    pub fn from_kube_stream(err: kube::Error, namespace: &str, pod: &str) -> Self {
        match err {
            kube::Error::Api(_) => Self::from_kube(err, "Pod", namespace, pod),
            other => Self::from_transport(other.to_string()),
        }
    }

    /// Classify a failure on an open log stream.
    pub fn from_transport(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_transient_transport_message(&message) {
            GatewayError::TransientTransport(message)
        } else {
            GatewayError::Orchestrator {
                status: None,
                message,
            }
        }
    }

    pub fn timeout(operation: &str, after: std::time::Duration) -> Self {
        GatewayError::Orchestrator {
            status: None,
            message: format!("{} timed out after {}s", operation, after.as_secs_f64()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::TransientTransport(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::TransientTransport(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Orchestrator { status, .. } => status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            GatewayError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A body that is not the expected JSON is bad input like any other.
impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::Validation(rejection.body_text())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
