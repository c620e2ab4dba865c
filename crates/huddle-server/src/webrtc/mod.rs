use crate::auth::AuthUser;
use crate::state::AppState;
use axum::{extract::State, Json};
use huddle_protocol::IceServer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct IceServersResponse {
    pub ice_servers: Vec<IceServer>,
}

/// STUN/TURN servers clients should use for their peer connections.
/// Media never passes through this server.
pub async fn get_ice_servers(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Json<IceServersResponse> {
    let stun = state.config.stun_servers.iter().map(|url| IceServer {
        urls: vec![url.clone()],
        username: None,
        credential: None,
    });

    let turn = state.config.turn_servers.iter().map(|turn| IceServer {
        urls: vec![turn.url.clone()],
        username: Some(turn.username.clone()),
        credential: Some(turn.credential.clone()),
    });

    Json(IceServersResponse {
        ice_servers: stun.chain(turn).collect(),
    })
}
