use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use huddle_protocol::RoomCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub link: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRoomResponse {
    pub exists: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_url: String,
    pub original_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files: Vec<UploadedFile>,
}

/// Allocate a new room code
/// POST /api/rooms/create
pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CreateRoomResponse>> {
    let record = state.room_service.create(auth.user_id).await?;

    let link = format!(
        "{}/videoCalling/{}",
        state.config.frontend_base_url.trim_end_matches('/'),
        record.room_code
    );

    Ok(Json(CreateRoomResponse {
        room_id: record.room_code,
        link,
    }))
}

/// Check whether a code can still be joined
/// POST /api/rooms/verify/{code}
pub async fn verify_room(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(code): Path<String>,
) -> Result<impl IntoResponse> {
    let exists = state.room_service.verify(&code).await?;

    let (status, message) = if exists {
        (StatusCode::OK, "Room was found")
    } else {
        (StatusCode::NOT_FOUND, "Room not found")
    };

    Ok((
        status,
        Json(VerifyRoomResponse {
            exists,
            message: message.to_string(),
        }),
    ))
}

/// Upload files shared during a call. Only allowed while the room is open;
/// the files are removed when the room closes.
/// POST /api/rooms/{code}/upload
pub async fn upload_files(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let code = RoomCode::parse(&code).map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.rooms.ensure_open(&code)?;

    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let filename = field
            .file_name()
            .map(String::from)
            .ok_or_else(|| AppError::BadRequest("Missing filename".to_string()))?;

        let data = field.bytes().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read file data: {}", e))
        })?;

        let stored = state
            .rooms
            .save_file(state.files.as_ref(), &code, &filename, &data)
            .await?;

        files.push(UploadedFile {
            file_url: format!("/uploads/{}", stored.name),
            original_name: stored.original_name,
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }

    Ok(Json(UploadResponse { files }))
}

/// Serve an uploaded file
/// GET /uploads/{name}
pub async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let data = state.files.read(&name).await?;

    let content_type = content_type_for(&name);
    let disposition = if content_type.starts_with("image/")
        || content_type.starts_with("video/")
        || content_type.starts_with("audio/")
        || content_type == "application/pdf"
    {
        format!("inline; filename=\"{}\"", name)
    } else {
        format!("attachment; filename=\"{}\"", name)
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "md" | "csv" => "text/plain; charset=utf-8",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
