use crate::auth::verify_token;
use crate::rooms::{RoomError, SignalingEnvelope};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use huddle_protocol::{ClientMessage, ConnectionId, ServerMessage, SignalKind};
use tokio::sync::mpsc;
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Send a message straight on the socket, before the connection is registered
async fn reply(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            false
        }
    }
}

async fn reject(sender: &mut SplitSink<WebSocket, Message>, message: &str) {
    reply(
        sender,
        &ServerMessage::Error {
            message: message.to_string(),
        },
    )
    .await;
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // First message should be authentication
    let auth_msg = match receiver.next().await {
        Some(Ok(Message::Text(text))) => text,
        _ => {
            tracing::warn!("WebSocket closed before authentication");
            return;
        }
    };

    let user_id = match serde_json::from_str::<ClientMessage>(&auth_msg) {
        Ok(ClientMessage::Authenticate { token }) => {
            match verify_token(&token, &state.config.jwt_secret) {
                Ok(claims) => claims.sub,
                Err(_) => {
                    reject(&mut sender, "Invalid token").await;
                    return;
                }
            }
        }
        Ok(_) => {
            reject(&mut sender, "First message must be authentication").await;
            return;
        }
        Err(e) => {
            tracing::warn!("Invalid auth message: {}", e);
            reject(&mut sender, "Invalid message format").await;
            return;
        }
    };

    let connection_id = ConnectionId::new();
    if !reply(&mut sender, &ServerMessage::Authenticated { connection_id }).await {
        return;
    }

    tracing::info!(%user_id, %connection_id, "WebSocket authenticated");

    // Create channel for outbound messages
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state
        .connections
        .add_connection(connection_id, user_id, tx)
        .await;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Messages from one connection are handled in order, which keeps relayed
    // signals from one sender to one recipient in order too
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let client_msg: ClientMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(%connection_id, "Invalid message: {}", e);
                        continue;
                    }
                };

                handle_client_message(&state, user_id, connection_id, client_msg).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!(%connection_id, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup on disconnect. Runs whether or not the client left its room.
    state.connections.remove_connection(connection_id).await;
    state.rooms.disconnect(connection_id).await;

    send_task.abort();

    tracing::info!(%user_id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    user_id: Uuid,
    connection_id: ConnectionId,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Authenticate { .. } => {
            // Already authenticated
        }
        ClientMessage::JoinRoom { room_code } => {
            if let Err(e) = state.rooms.join(connection_id, &room_code).await {
                send_room_error(state, connection_id, e).await;
            }
        }
        ClientMessage::LeaveRoom { room_code } => {
            state.rooms.leave(connection_id, &room_code).await;
        }
        ClientMessage::SendOffer { offer, to } => {
            relay(state, SignalKind::Offer, connection_id, to, offer).await;
        }
        ClientMessage::SendAnswer { answer, to } => {
            relay(state, SignalKind::Answer, connection_id, to, answer).await;
        }
        ClientMessage::SendIceCandidate { candidate, to } => {
            relay(state, SignalKind::IceCandidate, connection_id, to, candidate).await;
        }
        ClientMessage::SendRoomChat { room_code, message } => {
            if let Err(e) = state
                .rooms
                .broadcast_chat(connection_id, user_id, &room_code, message)
                .await
            {
                send_room_error(state, connection_id, e).await;
            }
        }
        ClientMessage::SendCanvasData { room_code, point } => {
            if let Err(e) = state
                .rooms
                .broadcast_canvas(connection_id, &room_code, point)
                .await
            {
                send_room_error(state, connection_id, e).await;
            }
        }
        ClientMessage::SendNotification {
            receiver_id,
            message,
        } => {
            state
                .connections
                .send_to_user(
                    receiver_id,
                    &ServerMessage::Notification {
                        sender_id: user_id,
                        message,
                    },
                )
                .await;
        }
        ClientMessage::Ping => {
            state
                .connections
                .send_to_connection(connection_id, &ServerMessage::Pong)
                .await;
        }
    }
}

async fn relay(
    state: &AppState,
    kind: SignalKind,
    from: ConnectionId,
    to: ConnectionId,
    body: serde_json::Value,
) {
    state
        .rooms
        .relay(SignalingEnvelope {
            kind,
            from,
            to,
            body,
        })
        .await;
}

async fn send_room_error(state: &AppState, connection_id: ConnectionId, err: RoomError) {
    let message = match &err {
        RoomError::Store(e) => {
            tracing::error!(%connection_id, "Room store error: {}", e);
            "Room store unavailable".to_string()
        }
        _ => err.to_string(),
    };

    state
        .connections
        .send_to_connection(connection_id, &ServerMessage::Error { message })
        .await;
}
