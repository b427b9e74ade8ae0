use super::AppState;
use crate::gateway::SubscriptionManager;
use crate::types::{ClientEvent, RelayEvent, ServerEvent, SubscribeRequest};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn logs_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut inbound) = socket.split();
    let (tx, mut rx) = mpsc::channel::<RelayEvent>(state.buffer_size);
    let manager = SubscriptionManager::new(state.backend.clone(), state.settings.clone(), tx);
    debug!("Log socket connected");

    loop {
        let outgoing = tokio::select! {
            message = inbound.next() => match message {
                Some(Ok(Message::Text(text))) => handle_client_frame(&manager, &text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    debug!("Log socket receive failed: {}", e);
                    break;
                }
            },
            Some(event) = rx.recv() => manager.deliver(event),
        };

        if let Some(event) = outgoing
            && send_event(&mut sink, &event).await.is_err()
        {
            break;
        }
    }

    let last = manager.current_id();
    manager.unsubscribe();
    info!("Log socket disconnected (last subscription: {:?})", last);
}

fn handle_client_frame(manager: &SubscriptionManager, text: &str) -> Option<ServerEvent> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            return Some(ServerEvent::Error {
                message: format!("invalid message: {}", e),
            });
        }
    };

    match event {
        ClientEvent::Subscribe { ns, pod, container } => {
            let request = SubscribeRequest {
                namespace: ns,
                pod,
                container,
            };
            match manager.subscribe(request) {
                Ok(handle) => {
                    debug!("Log socket now on subscription {}", handle.id());
                    Some(handle.acknowledgement())
                }
                Err(e) if e.is_transient() => None,
                Err(e) => {
                    warn!("Subscribe rejected: {}", e);
                    Some(ServerEvent::Error {
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &ServerEvent) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Could not encode log socket event: {}", e);
            return Ok(());
        }
    };
    sink.send(Message::Text(payload)).await
}
