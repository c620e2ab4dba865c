//! Huddle Server Library
//!
//! This module exposes the server components for testing and embedding.

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod rooms;
pub mod services;
pub mod state;
pub mod store;
pub mod webrtc;
pub mod ws;

use anyhow::Result;
use std::sync::Arc;
use store::{DiskFileStore, FileStore, MemoryRoomStore, PgRoomStore, RoomStore};

/// Create and configure the server application
pub async fn create_app(config: state::Config) -> Result<axum::Router> {
    let room_store: Arc<dyn RoomStore> = match &config.database_url {
        Some(url) => {
            let db_pool =
                db::connect_room_store(url, config.database_max_connections).await?;
            db::migrate_room_store(&db_pool).await?;
            Arc::new(PgRoomStore::new(db_pool))
        }
        None => Arc::new(MemoryRoomStore::new()),
    };
    let files: Arc<dyn FileStore> = Arc::new(DiskFileStore::new(config.upload_dir.clone()));

    let app_state = state::AppState::new(config, room_store, files);
    Ok(api::create_router(app_state))
}
