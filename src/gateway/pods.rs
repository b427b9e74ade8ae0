//! One-shot pod operations: a log snapshot, restart and delete.
//!
//! A restart is a delete; the pod's controller brings up a replacement.

use super::{Backend, GatewaySettings};
use crate::error::{GatewayError, GatewayResult};
use crate::types::{LogRequest, LogsQuery, PodAction, PodActionResult};
use std::sync::Arc;
use tracing::info;

/// Lines returned by a log snapshot.
pub const SNAPSHOT_TAIL_LINES: i64 = 200;

/// Lines in a demo log snapshot, after the header.
pub const DEMO_SNAPSHOT_LINES: usize = 50;

#[derive(Clone)]
pub struct PodOperations {
    backend: Backend,
    settings: Arc<GatewaySettings>,
}

impl PodOperations {
    pub fn new(backend: Backend, settings: Arc<GatewaySettings>) -> Self {
        Self { backend, settings }
    }

    /// The recent log of a pod as plain text, with timestamps.
    pub async fn snapshot_logs(&self, query: LogsQuery) -> GatewayResult<String> {
        let orchestrator = self.backend.orchestrator()?;
        let namespace = self.settings.namespace_or_default(query.ns);
        let pod = query
            .pod
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GatewayError::Validation("pod required".to_string()))?;

        let Some(orchestrator) = orchestrator else {
            return Ok(demo_snapshot(&namespace, &pod));
        };

        let request = LogRequest {
            namespace,
            pod,
            container: query
                .container
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            tail_lines: SNAPSHOT_TAIL_LINES,
            follow: false,
            timestamps: true,
        };
        orchestrator.read_pod_logs(&request).await
    }

    pub async fn restart(
        &self,
        namespace: Option<String>,
        name: &str,
    ) -> GatewayResult<PodActionResult> {
        self.remove(PodAction::Restart, namespace, name).await
    }

    pub async fn delete(
        &self,
        namespace: Option<String>,
        name: &str,
    ) -> GatewayResult<PodActionResult> {
        self.remove(PodAction::Delete, namespace, name).await
    }

    async fn remove(
        &self,
        action: PodAction,
        namespace: Option<String>,
        name: &str,
    ) -> GatewayResult<PodActionResult> {
        let orchestrator = self.backend.orchestrator()?;
        let namespace = self.settings.namespace_or_default(namespace);
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::Validation("pod name is required".to_string()));
        }

        if let Some(orchestrator) = orchestrator {
            orchestrator.delete_pod(&namespace, name).await?;
        }
        info!("Pod {}/{} {}", namespace, name, action.status());

        Ok(PodActionResult {
            status: action.status(),
            ns: namespace,
            name: name.to_string(),
        })
    }
}

fn demo_snapshot(namespace: &str, pod: &str) -> String {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let lines: Vec<String> = (1..=DEMO_SNAPSHOT_LINES)
        .map(|i| format!("[demo] line {} - {}", i, now))
        .collect();
    format!("Simulated logs for {} in {}\n{}", pod, namespace, lines.join("\n"))
}
