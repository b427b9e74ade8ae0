pub mod pods;
pub mod relay;
pub mod scale;
pub mod subscriptions;

pub use pods::PodOperations;
pub use scale::ScaleOrchestrator;
pub use subscriptions::SubscriptionManager;

use crate::cli::Cli;
use crate::error::{GatewayError, GatewayResult};
use crate::kubernetes::{KubeOrchestrator, Orchestrator, initialize_client};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Lines of history sent before following a pod log.
pub const TAIL_LINES: i64 = 100;

/// Period of synthetic log lines in demo mode.
pub const DEMO_INTERVAL: Duration = Duration::from_millis(500);

/// What the gateway talks to.
#[derive(Clone)]
pub enum Backend {
    Live(Arc<dyn Orchestrator>),
    Demo,
    /// No usable cluster credentials and demo mode is off.
    Unavailable(String),
}

impl Backend {
    /// Resolve the adapter to use: `Some` for a live cluster, `None` for demo mode.
    pub fn orchestrator(&self) -> GatewayResult<Option<Arc<dyn Orchestrator>>> {
        match self {
            Backend::Live(orchestrator) => Ok(Some(Arc::clone(orchestrator))),
            Backend::Demo => Ok(None),
            Backend::Unavailable(reason) => Err(GatewayError::Configuration(format!(
                "Kubernetes client not initialized ({}). Ensure kubeconfig is mounted or run inside a cluster.",
                reason
            ))),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Backend::Live(_) => "live",
            Backend::Demo => "demo",
            Backend::Unavailable(_) => "unavailable",
        }
    }
}

pub async fn initialize_backend(cli: &Cli) -> Backend {
    if cli.demo {
        info!("Demo mode enabled; no cluster calls will be made");
        return Backend::Demo;
    }

    match initialize_client(cli.context.as_deref(), cli.kubeconfig_data.as_deref()).await {
        Ok(client) => Backend::Live(Arc::new(KubeOrchestrator::new(
            client,
            cli.request_timeout(),
        ))),
        Err(e) => {
            warn!("Kubernetes client unavailable: {}", e);
            Backend::Unavailable(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub default_namespace: String,
    pub tail_lines: i64,
    pub demo_interval: Duration,
}

impl GatewaySettings {
    pub fn new(default_namespace: impl Into<String>) -> Self {
        Self {
            default_namespace: default_namespace.into(),
            tail_lines: TAIL_LINES,
            demo_interval: DEMO_INTERVAL,
        }
    }

    /// The requested namespace, or the configured default when blank.
    pub fn namespace_or_default(&self, namespace: Option<String>) -> String {
        namespace
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.default_namespace.clone())
    }
}
