use super::GatewaySettings;
use super::subscriptions::SubscriptionToken;
use crate::error::GatewayError;
use crate::kubernetes::Orchestrator;
use crate::types::{LogChunk, LogRequest, RelayEvent, Subscription};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// What to do with a stream failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The subscription was superseded or its connection closed.
    Discard,
    /// Teardown noise.
    Suppress,
    Surface(String),
}

pub fn classify_failure(live: bool, err: &GatewayError) -> FailureDisposition {
    if !live {
        FailureDisposition::Discard
    } else if err.is_transient() {
        FailureDisposition::Suppress
    } else {
        FailureDisposition::Surface(err.to_string())
    }
}

/// Relay one subscription until it is aborted, the upstream ends, or the
/// connection stops reading.
pub(crate) async fn run(
    token: SubscriptionToken,
    orchestrator: Option<Arc<dyn Orchestrator>>,
    subscription: Subscription,
    settings: Arc<GatewaySettings>,
    tx: mpsc::Sender<RelayEvent>,
) {
    match orchestrator {
        Some(orchestrator) => run_live(token, orchestrator, subscription, settings, tx).await,
        None => run_demo(token, subscription, settings, tx).await,
    }
}

async fn run_demo(
    token: SubscriptionToken,
    subscription: Subscription,
    settings: Arc<GatewaySettings>,
    tx: mpsc::Sender<RelayEvent>,
) {
    let period = settings.demo_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut count: u64 = 0;
    loop {
        ticker.tick().await;
        if !token.is_live() {
            break;
        }
        count += 1;
        let payload = format!(
            "[demo] {} {} line {} - {}\n",
            subscription.pod_name,
            subscription.namespace,
            count,
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        );
        let chunk = LogChunk {
            subscription_id: token.id(),
            payload,
        };
        if tx.send(RelayEvent::Chunk(chunk)).await.is_err() {
            break;
        }
    }
    debug!("Demo relay for subscription {} stopped", token.id());
}

async fn run_live(
    token: SubscriptionToken,
    orchestrator: Arc<dyn Orchestrator>,
    subscription: Subscription,
    settings: Arc<GatewaySettings>,
    tx: mpsc::Sender<RelayEvent>,
) {
    let container = match subscription.container_name.clone() {
        Some(container) => Some(container),
        None => match orchestrator
            .read_pod(&subscription.namespace, &subscription.pod_name)
            .await
        {
            Ok(pod) => pod.containers.into_iter().next(),
            Err(e) => {
                warn!(
                    "Could not resolve container of pod {}/{}: {}. Streaming without a container filter.",
                    subscription.namespace, subscription.pod_name, e
                );
                None
            }
        },
    };

    if !token.is_live() {
        return;
    }

    let request = LogRequest {
        namespace: subscription.namespace.clone(),
        pod: subscription.pod_name.clone(),
        container,
        tail_lines: settings.tail_lines,
        follow: true,
        timestamps: false,
    };

    let mut stream = match orchestrator.stream_pod_logs(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            report_failure(&token, &tx, e).await;
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(payload) => {
                let chunk = LogChunk {
                    subscription_id: token.id(),
                    payload,
                };
                if tx.send(RelayEvent::Chunk(chunk)).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                report_failure(&token, &tx, e).await;
                return;
            }
        }
    }

    debug!(
        "Log stream for subscription {} ({}/{}) ended",
        token.id(),
        request.namespace,
        request.pod
    );
}

async fn report_failure(token: &SubscriptionToken, tx: &mpsc::Sender<RelayEvent>, err: GatewayError) {
    match classify_failure(token.is_live(), &err) {
        FailureDisposition::Discard => {
            debug!("Discarding error of stale subscription {}: {}", token.id(), err);
        }
        FailureDisposition::Suppress => {
            debug!("Suppressed transport noise on subscription {}: {}", token.id(), err);
        }
        FailureDisposition::Surface(message) => {
            warn!("Log stream for subscription {} failed: {}", token.id(), message);
            let _ = tx
                .send(RelayEvent::Failed {
                    subscription_id: token.id(),
                    message,
                })
                .await;
        }
    }
}
