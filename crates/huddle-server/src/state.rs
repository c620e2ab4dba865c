use crate::rooms::RoomManager;
use crate::services::room::RoomService;
use crate::store::{FileStore, RoomStore};
use crate::ws::connections::ConnectionManager;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct Config {
    pub bind_address: String,
    /// `None` keeps room records in memory
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub frontend_base_url: String,
    pub stun_servers: Vec<String>,
    pub turn_servers: Vec<TurnServer>,
}

#[derive(Clone)]
pub struct TurnServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL").ok();
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set, room records will only live in memory");
        }

        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|n| n.parse().ok())
            .unwrap_or(10);

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using default (insecure for production!)");
            "dev-secret-change-in-production".to_string()
        });

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let frontend_base_url = std::env::var("FRONTEND_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let stun_servers = std::env::var("STUN_SERVERS")
            .map(|s| s.split(',').map(String::from).collect())
            .unwrap_or_else(|_| vec!["stun:stun.l.google.com:19302".to_string()]);

        let turn_servers = match (
            std::env::var("TURN_URL"),
            std::env::var("TURN_USERNAME"),
            std::env::var("TURN_CREDENTIAL"),
        ) {
            (Ok(url), Ok(username), Ok(credential)) => vec![TurnServer {
                url,
                username,
                credential,
            }],
            _ => vec![],
        };

        Ok(Config {
            bind_address,
            database_url,
            database_max_connections,
            jwt_secret,
            upload_dir,
            frontend_base_url,
            stun_servers,
            turn_servers,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub connections: Arc<ConnectionManager>,
    pub rooms: Arc<RoomManager>,
    pub room_service: RoomService,
    pub files: Arc<dyn FileStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        room_store: Arc<dyn RoomStore>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let rooms = Arc::new(RoomManager::new(
            connections.clone(),
            room_store.clone(),
            files.clone(),
        ));
        let room_service = RoomService::new(room_store, rooms.clone());

        Self {
            config,
            connections,
            rooms,
            room_service,
            files,
        }
    }
}
