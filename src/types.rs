use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one log subscription on one connection. Strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub namespace: String,
    pub pod_name: String,
    pub container_name: Option<String>,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A piece of log output attributed to the subscription whose stream produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub subscription_id: SubscriptionId,
    pub payload: String,
}

/// What a relay task hands back to its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Chunk(LogChunk),
    Failed {
        subscription_id: SubscriptionId,
        message: String,
    },
}

impl RelayEvent {
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            RelayEvent::Chunk(chunk) => chunk.subscription_id,
            RelayEvent::Failed {
                subscription_id, ..
            } => *subscription_id,
        }
    }
}

/// Frames sent by a client over the log socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    Subscribe {
        #[serde(default, alias = "namespace")]
        ns: Option<String>,
        #[serde(default)]
        pod: Option<String>,
        #[serde(default)]
        container: Option<String>,
    },
}

/// Frames sent to a client over the log socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Subscribed {
        id: SubscriptionId,
        namespace: String,
        pod: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },
    Log {
        text: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SubscribeRequest {
    pub namespace: Option<String>,
    pub pod: Option<String>,
    pub container: Option<String>,
}

/// Workload kinds that expose a scale subresource, in lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    ReplicaSet,
}

impl WorkloadKind {
    pub const PRIORITY: [WorkloadKind; 3] = [
        WorkloadKind::Deployment,
        WorkloadKind::StatefulSet,
        WorkloadKind::ReplicaSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::ReplicaSet => "ReplicaSet",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw scale body as it arrives over HTTP, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScaleBody {
    #[serde(default, alias = "namespace")]
    pub ns: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub replicas: Option<serde_json::Value>,
}

/// A validated scale request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleRequest {
    pub namespace: String,
    pub name: String,
    pub desired_replicas: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleResult {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
}

/// Container names of a pod, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodContainers {
    pub containers: Vec<String>,
}

/// Parameters of one pod log read, followed or one-shot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    pub tail_lines: i64,
    pub follow: bool,
    pub timestamps: bool,
}

/// Query of a one-shot log read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    #[serde(default, alias = "namespace")]
    pub ns: Option<String>,
    #[serde(default)]
    pub pod: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
}

/// Namespace selector accepted in pod action bodies and queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamespaceParam {
    #[serde(default, alias = "namespace")]
    pub ns: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodAction {
    Restart,
    Delete,
}

impl PodAction {
    /// Past tense, as reported back to clients.
    pub fn status(&self) -> &'static str {
        match self {
            PodAction::Restart => "restarted",
            PodAction::Delete => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodActionResult {
    pub status: &'static str,
    pub ns: String,
    pub name: String,
}
