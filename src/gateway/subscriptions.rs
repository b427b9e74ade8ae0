//! Per-connection log subscriptions.
//!
//! A connection owns one [`SubscriptionManager`]. Each subscribe allocates a
//! new, strictly greater [`SubscriptionId`] and makes it current *before* the
//! relay task starts. Relays carry a [`SubscriptionToken`] (the id plus a
//! handle on the connection's table) and every delivery path compares the id
//! against the table, so output from a superseded or closed subscription is
//! dropped no matter when its producer gets around to emitting it.

use super::relay;
use super::{Backend, GatewaySettings};
use crate::error::{GatewayError, GatewayResult};
use crate::types::{RelayEvent, ServerEvent, SubscribeRequest, Subscription, SubscriptionId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

struct Slot {
    subscription: Subscription,
    task: Option<AbortHandle>,
}

impl Slot {
    fn release(mut self) -> Subscription {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.subscription.active = false;
        self.subscription
    }
}

#[derive(Default)]
pub(crate) struct SubscriptionTable {
    last_id: u64,
    current: Option<Slot>,
    closed: bool,
}

impl SubscriptionTable {
    fn is_current(&self, id: SubscriptionId) -> bool {
        !self.closed
            && self
                .current
                .as_ref()
                .is_some_and(|slot| slot.subscription.active && slot.subscription.id == id)
    }

    fn current_id(&self) -> Option<SubscriptionId> {
        self.current.as_ref().map(|slot| slot.subscription.id)
    }

    /// Stop whatever is running and hand out the next id.
    fn activate(
        &mut self,
        namespace: String,
        pod_name: String,
        container_name: Option<String>,
    ) -> Subscription {
        if let Some(previous) = self.current.take() {
            let previous = previous.release();
            debug!(
                "Superseded subscription {} ({}/{})",
                previous.id, previous.namespace, previous.pod_name
            );
        }

        self.last_id += 1;
        let subscription = Subscription {
            id: SubscriptionId(self.last_id),
            namespace,
            pod_name,
            container_name,
            active: true,
            created_at: chrono::Utc::now(),
        };
        self.current = Some(Slot {
            subscription: subscription.clone(),
            task: None,
        });
        subscription
    }

    /// Record the relay task for `id`. Returns false if `id` is no longer current.
    fn attach(&mut self, id: SubscriptionId, task: AbortHandle) -> bool {
        match self.current.as_mut() {
            Some(slot) if !self.closed && slot.subscription.id == id => {
                slot.task = Some(task);
                true
            }
            _ => false,
        }
    }

    fn close(&mut self) -> Option<Subscription> {
        self.closed = true;
        self.current.take().map(Slot::release)
    }
}

/// Identity of one subscription, checked on every delivery.
#[derive(Clone)]
pub struct SubscriptionToken {
    id: SubscriptionId,
    table: Arc<Mutex<SubscriptionTable>>,
}

impl SubscriptionToken {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// True while this subscription is the connection's current one.
    pub fn is_live(&self) -> bool {
        self.table.lock().is_current(self.id)
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    pub subscription: Subscription,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.subscription.id
    }

    pub fn acknowledgement(&self) -> ServerEvent {
        ServerEvent::Subscribed {
            id: self.subscription.id,
            namespace: self.subscription.namespace.clone(),
            pod: self.subscription.pod_name.clone(),
            container: self.subscription.container_name.clone(),
        }
    }
}

pub struct SubscriptionManager {
    backend: Backend,
    settings: Arc<GatewaySettings>,
    table: Arc<Mutex<SubscriptionTable>>,
    tx: mpsc::Sender<RelayEvent>,
}

impl SubscriptionManager {
    /// `tx` is the connection's inbox; events read from it must go through
    /// [`SubscriptionManager::deliver`].
    pub fn new(
        backend: Backend,
        settings: Arc<GatewaySettings>,
        tx: mpsc::Sender<RelayEvent>,
    ) -> Self {
        Self {
            backend,
            settings,
            table: Arc::new(Mutex::new(SubscriptionTable::default())),
            tx,
        }
    }

    /// Replace the connection's subscription. Never waits on the old stream.
    pub fn subscribe(&self, request: SubscribeRequest) -> GatewayResult<SubscriptionHandle> {
        let pod = request
            .pod
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GatewayError::Validation("pod is required".to_string()))?;
        let container = request
            .container
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let orchestrator = self.backend.orchestrator()?;
        let namespace = self.settings.namespace_or_default(request.namespace);

        let subscription = {
            let mut table = self.table.lock();
            if table.closed {
                return Err(GatewayError::TransientTransport(
                    "connection already closed".to_string(),
                ));
            }
            table.activate(namespace, pod, container)
        };

        let token = SubscriptionToken {
            id: subscription.id,
            table: Arc::clone(&self.table),
        };
        let task = tokio::spawn(relay::run(
            token,
            orchestrator,
            subscription.clone(),
            Arc::clone(&self.settings),
            self.tx.clone(),
        ));

        if !self.table.lock().attach(subscription.id, task.abort_handle()) {
            task.abort();
        }

        debug!(
            "Subscription {} started for {}/{}",
            subscription.id, subscription.namespace, subscription.pod_name
        );
        Ok(SubscriptionHandle { subscription })
    }

    /// Close the connection: stop the relay and refuse all later delivery.
    pub fn unsubscribe(&self) {
        if let Some(subscription) = self.table.lock().close() {
            let age = chrono::Utc::now().signed_duration_since(subscription.created_at);
            debug!(
                "Subscription {} closed with its connection after {}s",
                subscription.id,
                age.num_seconds()
            );
        }
    }

    pub fn current_id(&self) -> Option<SubscriptionId> {
        self.table.lock().current_id()
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    /// Turn a relay event into a client frame, or drop it if its subscription
    /// is not the current one.
    pub fn deliver(&self, event: RelayEvent) -> Option<ServerEvent> {
        if !self.table.lock().is_current(event.subscription_id()) {
            debug!(
                "Dropping output of stale subscription {}",
                event.subscription_id()
            );
            return None;
        }
        match event {
            RelayEvent::Chunk(chunk) => Some(ServerEvent::Log {
                text: chunk.payload,
            }),
            RelayEvent::Failed { message, .. } => Some(ServerEvent::Error { message }),
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
