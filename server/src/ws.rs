use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::bowl_loop::BowlCommand;
use bowling_shared::protocol::{ClientMsg, ServerMsg};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub cmd_tx: mpsc::Sender<BowlCommand>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .cmd_tx
        .send(BowlCommand::Join { response: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    let welcome = match resp_rx.await {
        Ok(welcome) => welcome,
        Err(_) => {
            tracing::error!("Failed to receive welcome");
            return;
        }
    };

    tracing::info!("Renderer connected");

    let welcome_json = match serde_json::to_string(&ServerMsg::Welcome(welcome)) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode welcome: {}", e);
            return;
        }
    };
    if sink.send(Message::Text(welcome_json.into())).await.is_err() {
        return;
    }

    // Subscribe to broadcasts
    let mut broadcast_rx = app_state.broadcast_tx.subscribe();

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(ClientMsg::Bowl { params }) => {
                                let clamped = params.clamped();
                                if clamped != params {
                                    tracing::warn!(
                                        "Clamped bowl parameters {:?} to {:?}",
                                        params,
                                        clamped
                                    );
                                }
                                let _ = app_state.cmd_tx.send(BowlCommand::Bowl {
                                    params: clamped,
                                    response: None,
                                }).await;
                            }
                            Err(e) => {
                                tracing::debug!("Ignoring malformed client message: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Renderer lagged by {} messages", n);
                        // Positions are superseded by the next one; the final
                        // trajectory still arrives whole.
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!("Renderer disconnected");
}
