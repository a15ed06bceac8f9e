use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{dashboard::DashboardSession, ws::ClientMessage, AppState};

/// GET /ws  (upgrade to WebSocket)
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // One dashboard session per connected view
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let session = DashboardSession::start(
        state.pool.clone(),
        &state.feed,
        state.settings_tx.subscribe(),
        out_tx,
    );

    // Channel used by the receive loop to hand Pong payloads to send_task
    let (pong_tx, mut pong_rx) = mpsc::channel::<Vec<u8>>(8);

    // Task: forward session events → WebSocket client; also send Pongs
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = out_rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Ok(text) = serde_json::to_string(&event) {
                                if sender.send(Message::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        None => break,
                    }
                }
                pong_data = pong_rx.recv() => {
                    match pong_data {
                        Some(data) => {
                            if sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    // Receive loop: client commands go to the session, Ping → Pong
    let recv_loop = async {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(Message::Ping(data)) => {
                    if pong_tx.send(data).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(cmd) => {
                        if !session.send(cmd).await {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!("Ignoring malformed client message: {}", e),
                },
                _ => {}
            }
        }
    };

    // Wait for either side to finish
    tokio::select! {
        _ = send_task => {}
        _ = recv_loop => {}
    }

    session.teardown().await;
    tracing::debug!("WebSocket client disconnected");
}
