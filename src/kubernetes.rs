use crate::error::{GatewayError, GatewayResult};
use crate::types::{LogRequest, PodContainers, WorkloadKind};
use async_trait::async_trait;
use futures::io::AsyncBufReadExt;
use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v1::Scale;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, LogParams, Patch, PatchParams};
use kube::{Api, Client, config};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

const LOG_STREAM_BUFFER: usize = 256;

/// Lines of a followed pod log, each terminated by a newline.
pub type LogStream = BoxStream<'static, GatewayResult<String>>;

/// The cluster operations the gateway relies on.
///
/// Every failure is already classified into a [`GatewayError`] when it leaves
/// an implementation, so callers only ever match on variants.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn read_pod(&self, namespace: &str, name: &str) -> GatewayResult<PodContainers>;

    async fn stream_pod_logs(&self, request: &LogRequest) -> GatewayResult<LogStream>;

    /// The last `tail_lines` of a pod log as one body.
    async fn read_pod_logs(&self, request: &LogRequest) -> GatewayResult<String>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> GatewayResult<()>;

    async fn read_scale(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> GatewayResult<i32>;

    async fn write_scale(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> GatewayResult<()>;
}

/// Build a client from inline kubeconfig data, a named context, or the
/// usual inference chain (KUBECONFIG, ~/.kube/config, in-cluster).
pub async fn initialize_client(
    context: Option<&str>,
    kubeconfig_data: Option<&str>,
) -> anyhow::Result<Client> {
    let options = config::KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let config = if let Some(data) = kubeconfig_data.filter(|d| !d.trim().is_empty()) {
        let kubeconfig = config::Kubeconfig::from_yaml(data)
            .map_err(|e| anyhow::anyhow!("Invalid inline kubeconfig: {}", e))?;
        info!("Using inline kubeconfig");
        config::Config::from_custom_kubeconfig(kubeconfig, &options).await?
    } else if let Some(ctx) = context {
        let config = config::Config::from_kubeconfig(&options)
            .await
            .map_err(|e| anyhow::anyhow!("Context '{}' not found in kubeconfig: {}", ctx, e))?;
        info!("Using context: {}", ctx);
        config
    } else {
        config::Config::infer().await?
    };

    info!("Kubernetes API server: {}", config.cluster_url);
    Ok(Client::try_from(config)?)
}

/// [`Orchestrator`] backed by a live kube client.
#[derive(Clone)]
pub struct KubeOrchestrator {
    client: Client,
    request_timeout: Duration,
}

impl KubeOrchestrator {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    async fn bounded<T, F>(
        &self,
        operation: &str,
        resource: &str,
        namespace: &str,
        name: &str,
        fut: F,
    ) -> GatewayResult<T>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GatewayError::from_kube(e, resource, namespace, name)),
            Err(_) => Err(GatewayError::timeout(operation, self.request_timeout)),
        }
    }

    async fn read_scale_of<T>(&self, namespace: &str, name: &str) -> GatewayResult<Scale>
    where
        T: k8s_openapi::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + k8s_openapi::Metadata<Ty = k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta>
            + serde::de::DeserializeOwned
            + serde::Serialize
            + Clone
            + Debug
            + Send
            + Sync,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        self.bounded("read scale", T::KIND, namespace, name, api.get_scale(name))
            .await
    }

    async fn patch_scale_of<T>(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> GatewayResult<Scale>
    where
        T: k8s_openapi::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + k8s_openapi::Metadata<Ty = k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta>
            + serde::de::DeserializeOwned
            + serde::Serialize
            + Clone
            + Debug
            + Send
            + Sync,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        let params = PatchParams::default();
        self.bounded(
            "write scale",
            T::KIND,
            namespace,
            name,
            api.patch_scale(name, &params, &Patch::Merge(&patch)),
        )
        .await
    }
}

fn scale_replicas(scale: &Scale) -> i32 {
    scale.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0)
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn read_pod(&self, namespace: &str, name: &str) -> GatewayResult<PodContainers> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = self
            .bounded("read pod", "Pod", namespace, name, api.get(name))
            .await?;
        let containers = pod
            .spec
            .map(|spec| spec.containers.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();
        Ok(PodContainers { containers })
    }

    async fn stream_pod_logs(&self, request: &LogRequest) -> GatewayResult<LogStream> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &request.namespace);
        let params = LogParams {
            follow: request.follow,
            container: request.container.clone(),
            tail_lines: Some(request.tail_lines),
            timestamps: request.timestamps,
            ..Default::default()
        };
        let request_timeout = self.request_timeout;
        let target = request.clone();

        let (opened_tx, opened_rx) = oneshot::channel::<GatewayResult<()>>();
        let (line_tx, line_rx) = mpsc::channel(LOG_STREAM_BUFFER);

        // The reader is owned by this task; it stops as soon as the consumer
        // drops its end of the channel.
        tokio::spawn(async move {
            let opened =
                tokio::time::timeout(request_timeout, api.log_stream(&target.pod, &params)).await;
            let reader = match opened {
                Ok(Ok(reader)) => {
                    let _ = opened_tx.send(Ok(()));
                    reader
                }
                Ok(Err(e)) => {
                    let _ = opened_tx.send(Err(GatewayError::from_kube_stream(
                        e,
                        &target.namespace,
                        &target.pod,
                    )));
                    return;
                }
                Err(_) => {
                    let _ = opened_tx.send(Err(GatewayError::timeout(
                        "open log stream",
                        request_timeout,
                    )));
                    return;
                }
            };

            let mut lines = reader.lines();
            loop {
                tokio::select! {
                    _ = line_tx.closed() => break,
                    next = lines.next() => match next {
                        Some(Ok(line)) => {
                            if line_tx.send(Ok(format!("{}\n", line))).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = line_tx.send(Err(GatewayError::from_transport(e.to_string()))).await;
                            break;
                        }
                        None => break,
                    }
                }
            }
            debug!(
                "Log reader for pod {}/{} finished",
                target.namespace, target.pod
            );
        });

        match opened_rx.await {
            Ok(Ok(())) => Ok(ReceiverStream::new(line_rx).boxed()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GatewayError::from_transport(
                "log stream task aborted before the stream opened",
            )),
        }
    }

    async fn read_pod_logs(&self, request: &LogRequest) -> GatewayResult<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &request.namespace);
        let params = LogParams {
            container: request.container.clone(),
            tail_lines: Some(request.tail_lines),
            timestamps: request.timestamps,
            ..Default::default()
        };
        self.bounded(
            "read pod logs",
            "Pod",
            &request.namespace,
            &request.pod,
            api.logs(&request.pod, &params),
        )
        .await
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(
            "delete pod",
            "Pod",
            namespace,
            name,
            api.delete(name, &DeleteParams::default()),
        )
        .await?;
        info!("Deleted pod {}/{}", namespace, name);
        Ok(())
    }

    async fn read_scale(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> GatewayResult<i32> {
        let scale = match kind {
            WorkloadKind::Deployment => self.read_scale_of::<Deployment>(namespace, name).await?,
            WorkloadKind::StatefulSet => self.read_scale_of::<StatefulSet>(namespace, name).await?,
            WorkloadKind::ReplicaSet => self.read_scale_of::<ReplicaSet>(namespace, name).await?,
        };
        Ok(scale_replicas(&scale))
    }

    async fn write_scale(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> GatewayResult<()> {
        let scale = match kind {
            WorkloadKind::Deployment => {
                self.patch_scale_of::<Deployment>(namespace, name, replicas)
                    .await?
            }
            WorkloadKind::StatefulSet => {
                self.patch_scale_of::<StatefulSet>(namespace, name, replicas)
                    .await?
            }
            WorkloadKind::ReplicaSet => {
                self.patch_scale_of::<ReplicaSet>(namespace, name, replicas)
                    .await?
            }
        };
        debug!(
            "{} {}/{} scale spec now {}",
            kind,
            namespace,
            name,
            scale_replicas(&scale)
        );
        Ok(())
    }
}
