use std::{collections::HashMap, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{SessionAck, SessionInboundMessage},
    state::{SharedState, Topic},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of one session WebSocket connection.
///
/// The first frame must be an identification message; it binds the session to
/// the user's topic for the rest of the connection. Challenge topics are then
/// joined and left on demand with watch/unwatch messages.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match SessionInboundMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse session message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let SessionInboundMessage::Identification { user_id } = inbound else {
        warn!("first message was not identification");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    info!(user_id = %user_id, "session connected");

    send_to_socket(
        &outbound_tx,
        &SessionAck {
            user_id: user_id.clone(),
            status: "identified".to_owned(),
        },
    );

    // One forwarder task per subscribed topic; the user topic lives for the
    // whole connection, challenge topics come and go with watch/unwatch.
    let mut forwarders: HashMap<Topic, JoinHandle<()>> = HashMap::new();
    let user_topic = Topic::User(user_id.clone());
    forwarders.insert(
        user_topic.clone(),
        spawn_forwarder(&state, user_topic, outbound_tx.clone()),
    );

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match SessionInboundMessage::from_json_str(&text) {
                Ok(SessionInboundMessage::WatchChallenge { challenge_id }) => {
                    let topic = Topic::Challenge(challenge_id);
                    if forwarders.contains_key(&topic) {
                        debug!(user_id = %user_id, challenge_id = %challenge_id, "already watching");
                        continue;
                    }
                    debug!(user_id = %user_id, challenge_id = %challenge_id, "watching challenge");
                    forwarders.insert(
                        topic.clone(),
                        spawn_forwarder(&state, topic, outbound_tx.clone()),
                    );
                }
                Ok(SessionInboundMessage::UnwatchChallenge { challenge_id }) => {
                    let topic = Topic::Challenge(challenge_id);
                    if let Some(task) = forwarders.remove(&topic) {
                        debug!(user_id = %user_id, challenge_id = %challenge_id, "unwatched challenge");
                        task.abort();
                    }
                }
                Ok(SessionInboundMessage::Identification { .. }) => {
                    warn!(user_id = %user_id, "ignoring duplicate identification message");
                }
                Ok(SessionInboundMessage::Unknown) => {
                    warn!(user_id = %user_id, "ignoring unknown session message");
                }
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "failed to parse session message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(user_id = %user_id, "session closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    for (_, task) in forwarders {
        task.abort();
    }
    info!(user_id = %user_id, "session disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Forward events from a broadcast topic onto the connection's writer channel
/// until either side goes away. Lagged receivers skip the missed events and
/// keep going; clients reconcile through `updated_at` on their next read.
fn spawn_forwarder(
    state: &SharedState,
    topic: Topic,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut receiver = state.broadcaster().subscribe(topic.clone());
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                event = receiver.recv() => match event {
                    Ok(event) => {
                        if tx.send(Message::Text(event.data.into())).is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic, skipped, "session fell behind on topic");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

/// Serialize a payload and push it onto the connection's writer channel.
/// Serialization failures are logged and dropped; a closed writer is handled
/// by the main loop.
fn send_to_socket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T)
where
    T: ?Sized + serde::Serialize,
{
    match serde_json::to_string(value) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound message");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
