use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{CanvasPoint, ConnectionId, RoomCode, SignalKind};

/// Messages sent from client to server via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Authenticate with the server. Must be the first frame.
    Authenticate { token: String },

    /// Join a call room
    JoinRoom { room_code: String },

    /// Leave a call room
    LeaveRoom { room_code: String },

    /// WebRTC offer for one connection
    SendOffer { offer: Value, to: ConnectionId },

    /// WebRTC answer for one connection
    SendAnswer { answer: Value, to: ConnectionId },

    /// WebRTC ICE candidate for one connection
    SendIceCandidate { candidate: Value, to: ConnectionId },

    /// Chat message for everyone in the call
    SendRoomChat { room_code: String, message: String },

    /// Whiteboard stroke point for everyone in the call
    SendCanvasData { room_code: String, point: CanvasPoint },

    /// Out-of-band notification for every device of a user
    SendNotification { receiver_id: Uuid, message: String },

    /// Ping to keep connection alive
    Ping,
}

/// Messages sent from server to client via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Authentication successful
    Authenticated { connection_id: ConnectionId },

    /// Error message
    Error { message: String },

    /// Pong response to ping
    Pong,

    /// Other members of the room just joined, sent to the joiner
    AllUsers { users: Vec<ConnectionId> },

    /// A connection joined the caller's room
    UserJoined { connection_id: ConnectionId },

    /// A connection left the caller's room
    UserLeft { connection_id: ConnectionId },

    /// WebRTC offer from another connection
    Offer { from: ConnectionId, offer: Value },

    /// WebRTC answer from another connection
    Answer { from: ConnectionId, answer: Value },

    /// WebRTC ICE candidate from another connection
    IceCandidate { from: ConnectionId, candidate: Value },

    /// Chat message posted in the room
    RoomChat {
        room_code: RoomCode,
        sender_id: Uuid,
        message: String,
        sent_at: DateTime<Utc>,
    },

    /// Whiteboard stroke point drawn in the room
    CanvasData {
        room_code: RoomCode,
        from: ConnectionId,
        point: CanvasPoint,
    },

    /// Personal notification
    Notification { sender_id: Uuid, message: String },
}

impl ServerMessage {
    /// Build the event delivered to the recipient of a relayed signal
    pub fn signal(kind: SignalKind, from: ConnectionId, body: Value) -> Self {
        match kind {
            SignalKind::Offer => ServerMessage::Offer { from, offer: body },
            SignalKind::Answer => ServerMessage::Answer { from, answer: body },
            SignalKind::IceCandidate => ServerMessage::IceCandidate {
                from,
                candidate: body,
            },
        }
    }
}
