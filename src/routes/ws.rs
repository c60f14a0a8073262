use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::notification::{ClientMessage, ServerMessage};

/// GET /ws — notification channel.
///
/// The client registers for targeted notifications by sending a `join`
/// frame with its user id; until then it only receives broadcasts. The
/// registry entry is process-local, so clients re-join after reconnecting.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.registry.register(connection_id, tx);

    tracing::debug!(%connection_id, "Client connected");

    let (mut sink, mut stream) = socket.split();

    // Writer: drains this connection's ordered channel into the socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize server frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Join { user_id }) => {
                    state.registry.join(&user_id, connection_id);
                    tracing::debug!(%connection_id, user_id = %user_id, "User joined notifications");
                    state.registry.send_to(
                        connection_id,
                        ServerMessage::Joined {
                            user_id,
                            message: "Successfully joined notifications".to_string(),
                        },
                    );
                }
                Err(e) => {
                    tracing::debug!(%connection_id, error = %e, "Ignoring unrecognized client frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.leave(connection_id);
    writer.abort();
    tracing::debug!(%connection_id, "Client disconnected");
}
