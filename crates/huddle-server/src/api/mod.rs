mod rooms;

pub use rooms::{CreateRoomResponse, UploadResponse, UploadedFile, VerifyRoomResponse};

use crate::state::AppState;
use crate::ws;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Room routes
        .route("/api/rooms/create", post(rooms::create_room))
        .route("/api/rooms/verify/{code}", post(rooms::verify_room))
        .route("/api/rooms/{code}/upload", post(rooms::upload_files))
        .route("/uploads/{name}", get(rooms::download_file))
        // WebRTC configuration
        .route("/api/rtc/ice-servers", get(crate::webrtc::get_ice_servers))
        // WebSocket endpoint
        .route("/ws", get(ws::handler::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
