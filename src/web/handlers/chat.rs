//! WebSocket endpoints: per-pair chat, notification fan-out, mentor
//! new-request feeds and request status feeds.

use futures::{SinkExt, StreamExt};
use salvo::http::StatusError;
use salvo::prelude::*;
use salvo::websocket::{Message, WebSocket, WebSocketUpgrade};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::relay::{
    GLOBAL_NOTIFICATIONS_TOPIC, InboundChat, OutboundFrame, chat_topic, mentor_topic, status_topic,
};
use crate::web::web_state;

#[handler]
pub async fn chat_connect(req: &mut Request, res: &mut Response) -> Result<(), StatusError> {
    let sender_id = req
        .param::<String>("sender_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(StatusError::bad_request)?;
    let receiver_id = req
        .param::<String>("receiver_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(StatusError::bad_request)?;

    WebSocketUpgrade::new()
        .upgrade(req, res, move |ws| handle_chat(ws, sender_id, receiver_id))
        .await
}

#[handler]
pub async fn notifications_connect(req: &mut Request, res: &mut Response) -> Result<(), StatusError> {
    // Bound connections filter events down to one recipient; the bare path
    // is the unscoped inbox mode that receives everything.
    let scope = req.param::<String>("user_id").filter(|v| !v.is_empty());

    WebSocketUpgrade::new()
        .upgrade(req, res, move |ws| {
            relay_topic_stream(ws, GLOBAL_NOTIFICATIONS_TOPIC.to_string(), scope)
        })
        .await
}

#[handler]
pub async fn mentor_connect(req: &mut Request, res: &mut Response) -> Result<(), StatusError> {
    let mentor_id = req
        .param::<String>("mentor_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(StatusError::bad_request)?;

    WebSocketUpgrade::new()
        .upgrade(req, res, move |ws| {
            relay_topic_stream(ws, mentor_topic(&mentor_id), None)
        })
        .await
}

#[handler]
pub async fn status_connect(req: &mut Request, res: &mut Response) -> Result<(), StatusError> {
    let request_id = req
        .param::<i64>("request_id")
        .filter(|v| *v > 0)
        .ok_or_else(StatusError::bad_request)?;

    WebSocketUpgrade::new()
        .upgrade(req, res, move |ws| {
            relay_topic_stream(ws, status_topic(request_id), None)
        })
        .await
}

/// Bidirectional chat connection: subscribed to the canonical pair topic
/// and to global notifications scoped to the connecting user; inbound
/// frames are relayed through `ChatRelay::send_message`.
async fn handle_chat(ws: WebSocket, sender_id: String, receiver_id: String) {
    let state = web_state();
    let relay = state.relay.clone();
    let topics = relay.topics();

    let topic = chat_topic(&sender_id, &receiver_id);
    info!(%sender_id, %receiver_id, %topic, "chat connection opened");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    let pair_subscription = topics.subscribe(&topic, None, tx.clone());
    let global_subscription =
        topics.subscribe(GLOBAL_NOTIFICATIONS_TOPIC, Some(sender_id.clone()), tx.clone());

    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%sender_id, error = %e, "chat connection read error");
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        let Ok(text) = msg.as_str() else {
            continue;
        };

        match serde_json::from_str::<InboundChat>(text) {
            Ok(inbound) => {
                if let Err(e) = relay.send_message(inbound).await {
                    warn!(%sender_id, error = %e, "inbound chat frame rejected");
                    let _ = tx.send(OutboundFrame::error(e.to_string()));
                }
            }
            Err(e) => {
                let _ = tx.send(OutboundFrame::error(format!("invalid frame: {e}")));
            }
        }
    }

    topics.unsubscribe(&topic, pair_subscription);
    topics.unsubscribe(GLOBAL_NOTIFICATIONS_TOPIC, global_subscription);
    drop(tx);
    let _ = writer.await;
    info!(%sender_id, %receiver_id, "chat connection closed");
}

/// Receive-only connection: forwards everything a topic delivers and
/// ignores inbound frames, mirroring the notification/status consumers.
async fn relay_topic_stream(ws: WebSocket, topic: String, scope: Option<String>) {
    let topics = web_state().relay.topics();
    info!(%topic, scoped = scope.is_some(), "topic stream opened");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    let subscription = topics.subscribe(&topic, scope, tx);

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) if msg.is_close() => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    topics.unsubscribe(&topic, subscription);
    let _ = writer.await;
    info!(%topic, "topic stream closed");
}
