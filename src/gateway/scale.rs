//! Scaling a workload whose kind is not known up front.
//!
//! Kinds are tried in [`WorkloadKind::PRIORITY`] order. A not-found answer
//! moves on to the next kind; any other failure (including a timeout) ends the
//! search and is returned as-is.

use super::{Backend, GatewaySettings};
use crate::error::{GatewayError, GatewayResult};
use crate::kubernetes::Orchestrator;
use crate::types::{ScaleBody, ScaleRequest, ScaleResult, WorkloadKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ScaleRequest {
    /// Check a raw body without touching the cluster.
    pub fn validate(body: ScaleBody, settings: &GatewaySettings) -> GatewayResult<Self> {
        let name = body
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                GatewayError::Validation("name and numeric replicas are required".to_string())
            })?;
        let desired_replicas = parse_replicas(body.replicas.as_ref())?;

        Ok(ScaleRequest {
            namespace: settings.namespace_or_default(body.ns),
            name,
            desired_replicas,
        })
    }
}

/// Accepts an integral JSON number or a string holding one, so `3`, `3.0`,
/// `"3"` and `"3.0"` all mean three replicas.
pub fn parse_replicas(value: Option<&Value>) -> GatewayResult<i32> {
    let invalid = || GatewayError::Validation("name and numeric replicas are required".to_string());

    let parsed: i64 = match value {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => v,
            None if n.as_u64().is_some() => i64::MAX,
            None => n.as_f64().and_then(integral).ok_or_else(invalid)?,
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(v) => v,
                Err(_) => s.parse::<f64>().ok().and_then(integral).ok_or_else(invalid)?,
            }
        }
        _ => return Err(invalid()),
    };

    if parsed < 0 {
        return Err(GatewayError::Validation(
            "replicas cannot be negative".to_string(),
        ));
    }
    i32::try_from(parsed)
        .map_err(|_| GatewayError::Validation(format!("replicas must be at most {}", i32::MAX)))
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

#[derive(Clone)]
pub struct ScaleOrchestrator {
    backend: Backend,
    settings: Arc<GatewaySettings>,
}

impl ScaleOrchestrator {
    pub fn new(backend: Backend, settings: Arc<GatewaySettings>) -> Self {
        Self { backend, settings }
    }

    pub async fn scale(&self, body: ScaleBody) -> GatewayResult<ScaleResult> {
        let orchestrator = self.backend.orchestrator()?;
        let request = ScaleRequest::validate(body, &self.settings)?;
        info!(
            "Scale requested: {}/{} -> {} replicas",
            request.namespace, request.name, request.desired_replicas
        );

        match orchestrator {
            Some(orchestrator) => scale_workload(orchestrator.as_ref(), &request).await,
            None => Ok(ScaleResult {
                kind: WorkloadKind::Deployment,
                namespace: request.namespace,
                name: request.name,
                replicas: request.desired_replicas,
            }),
        }
    }
}

/// Try each kind in priority order and scale the first one that exists.
pub async fn scale_workload(
    orchestrator: &dyn Orchestrator,
    request: &ScaleRequest,
) -> GatewayResult<ScaleResult> {
    for kind in WorkloadKind::PRIORITY {
        match scale_kind(orchestrator, kind, request).await {
            Ok(result) => {
                info!(
                    "Scaled {} {}/{} to {}",
                    kind, request.namespace, request.name, request.desired_replicas
                );
                return Ok(result);
            }
            Err(e) if e.is_not_found() => {
                debug!("{}/{} is not a {}", request.namespace, request.name, kind);
            }
            Err(e) => {
                warn!(
                    "Scaling {} {}/{} failed: {}",
                    kind, request.namespace, request.name, e
                );
                return Err(e);
            }
        }
    }

    Err(GatewayError::NotFound {
        resource: "workload".to_string(),
        namespace: request.namespace.clone(),
        name: request.name.clone(),
    })
}

async fn scale_kind(
    orchestrator: &dyn Orchestrator,
    kind: WorkloadKind,
    request: &ScaleRequest,
) -> GatewayResult<ScaleResult> {
    let current = orchestrator
        .read_scale(kind, &request.namespace, &request.name)
        .await?;
    debug!(
        "{} {}/{} currently at {} replicas",
        kind, request.namespace, request.name, current
    );
    orchestrator
        .write_scale(kind, &request.namespace, &request.name, request.desired_replicas)
        .await?;

    Ok(ScaleResult {
        kind,
        namespace: request.namespace.clone(),
        name: request.name.clone(),
        replicas: request.desired_replicas,
    })
}
