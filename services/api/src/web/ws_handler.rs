//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! The connection task owns the live session and applies client messages and
//! clock ticks to it in arrival order.

use crate::web::{
    clocks::Clock,
    live_session::LiveSession,
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, SplitStream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use vector_core::domain::{SignedInUser, WorkoutPlan};

type WsSender = SplitSink<WebSocket, Message>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<SignedInUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user))
}

/// Serializes and sends one message. Returns `false` once the client is gone.
async fn send(sender: &mut WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: SignedInUser) {
    info!("New WebSocket connection established for user: {}", user.id);
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Initialization Phase ---
    let Some(plan) = await_init(&app_state, &user, &mut sender, &mut receiver).await else {
        return;
    };

    let (tick_tx, mut tick_rx) = mpsc::channel::<Clock>(16);
    let mut live = LiveSession::start(plan.clone(), user.id, app_state.history.clone(), tick_tx);

    let initialized = ServerMessage::SessionInitialized {
        plan: plan.as_ref().clone(),
    };
    if !send(&mut sender, &initialized).await {
        live.disconnect();
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        let replies = tokio::select! {
            Some(clock) = tick_rx.recv() => live.handle_tick(clock),
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => live.handle_client(message).await,
                        Err(e) => {
                            warn!("Failed to deserialize client message: {}", e);
                            vec![ServerMessage::error("Unrecognised message.")]
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected.");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            },
        };

        for reply in &replies {
            if !send(&mut sender, reply).await {
                info!("Client stopped receiving.");
                live.disconnect();
                return;
            }
        }
        if live.is_over() {
            break;
        }
    }

    // --- 3. Cleanup ---
    live.disconnect();
    let _ = sender.close().await;
    info!("WebSocket connection closed.");
}

/// Waits for the `init` message and claims the plan it names.
async fn await_init(
    app_state: &AppState,
    user: &SignedInUser,
    sender: &mut WsSender,
    receiver: &mut SplitStream<WebSocket>,
) -> Option<Arc<WorkoutPlan>> {
    let Some(Ok(Message::Text(init_json))) = receiver.next().await else {
        error!("Client disconnected before sending Init message.");
        return None;
    };

    let plan_id = match serde_json::from_str::<ClientMessage>(&init_json) {
        Ok(ClientMessage::Init { plan_id }) => plan_id,
        _ => {
            error!("First message was not a valid Init message.");
            send(sender, &ServerMessage::error("Expected an init message.")).await;
            return None;
        }
    };

    info!("Initializing session for plan: {}", plan_id);
    match app_state.claim_plan(user.id, plan_id).await {
        Some(plan) => Some(plan),
        None => {
            warn!("Plan {} is not pending for user {}", plan_id, user.id);
            send(sender, &ServerMessage::error("No such workout to start.")).await;
            None
        }
    }
}
