//! WebSocket adapter between a live call connection and its session.
//!
//! The adapter is deliberately thin: it decodes inbound protocol frames and
//! queues them into the session, and it drains the session's outbound queue
//! onto the socket. The write half of the socket is owned by one task, so
//! the session is the only writer of call media.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::codec::{self, InboundMessage, OutboundMessage};
use crate::http::AppState;
use crate::session::{CallSession, InboundEvent, SessionContext, SessionHandle};

/// GET /call/stream
/// Upgrades to the call media WebSocket.
pub async fn call_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("New call media stream connection");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(64);
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut session: Option<Arc<SessionHandle>> = None;

    loop {
        tokio::select! {
            maybe = stream.next() => match maybe {
                Some(Ok(Message::Text(text))) => {
                    if !handle_text(&text, &state, &outbound_tx, &mut session).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // binary/ping/pong are not part of the contract
                Some(Err(e)) => {
                    error!("Media socket error: {}", e);
                    break;
                }
            },
            // The session can end on its own (idle timeout, forced close);
            // the connection follows it down.
            _ = session_done(&session) => break,
        }
    }

    // Let the writer finish once the session has released its sender.
    drop(outbound_tx);

    if let Some(handle) = session {
        handle.close();
        handle.done().await;
        state.registry.remove(&handle.call_id).await;
    }

    let _ = writer.await;
    info!("Call media stream connection closed");
}

/// Routes one inbound text frame. Returns `false` when the connection should
/// be torn down.
async fn handle_text(
    text: &str,
    state: &AppState,
    outbound_tx: &mpsc::Sender<OutboundMessage>,
    session: &mut Option<Arc<SessionHandle>>,
) -> bool {
    let message = match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring unparsable media message: {}", e);
            return true;
        }
    };

    match message {
        InboundMessage::Connected => {
            debug!("Transport handshake received");
            true
        }
        InboundMessage::Start { start } => {
            if session.is_some() {
                warn!("Duplicate start on an already-bound connection ignored");
                return true;
            }

            let ctx = SessionContext {
                call_id: start.call_id.clone(),
                stream_id: start
                    .stream_id
                    .clone()
                    .unwrap_or_else(|| start.call_id.clone()),
                owner_id: start.owner_id.clone(),
            };
            let config = state.config.session_config();
            let providers = state.providers.clone();
            let outbound = outbound_tx.clone();

            match state
                .registry
                .create(&start.call_id, || {
                    CallSession::spawn(ctx, config, providers, outbound)
                })
                .await
            {
                Ok(handle) => {
                    handle.dispatch(InboundEvent::Start).await;
                    *session = Some(handle);
                    true
                }
                Err(e) => {
                    // The existing session keeps the call; this connection
                    // is refused.
                    warn!(call = %start.call_id, "{}", e);
                    false
                }
            }
        }
        InboundMessage::Media { media } => {
            let Some(handle) = session else {
                debug!("Media frame before start ignored");
                return true;
            };
            match codec::decode_media(&media) {
                Ok(frame) => handle.dispatch(InboundEvent::Media(frame)).await,
                Err(e) => {
                    // Malformed frames are dropped; the call continues.
                    warn!(call = %handle.call_id, "Dropping frame: {}", e);
                    true
                }
            }
        }
        InboundMessage::Stop => {
            if let Some(handle) = session {
                handle.dispatch(InboundEvent::Stop).await;
            }
            true
        }
        InboundMessage::Mark => {
            debug!("Mark event acknowledged");
            true
        }
        InboundMessage::Unknown => {
            warn!("Ignoring unrecognized media event");
            true
        }
    }
}

async fn session_done(session: &Option<Arc<SessionHandle>>) {
    match session {
        Some(handle) => handle.done().await,
        None => std::future::pending().await,
    }
}
