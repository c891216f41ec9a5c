use std::path::{Path as FsPath, PathBuf};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use agora_types::dto::FileDto;

use crate::blocking;
use crate::dto::to_file_dto;
use crate::error::ApiError;
use crate::permissions::{ResourceKind, check_permission, denial_error};
use crate::session::AuthSession;
use crate::state::AppState;
use crate::validate::{sanitize_filename, validate_file_upload};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

fn disk_path(uploads_dir: &str, file_id: &Uuid) -> PathBuf {
    FsPath::new(uploads_dir).join(file_id.to_string())
}

fn io_internal(context: &str, err: std::io::Error) -> ApiError {
    error!("{}: {}", context, err);
    ApiError::Internal
}

/// POST /files?filename=... — raw bytes in, metadata row plus blob on disk.
/// The stored name comes from the query string; the id is always a fresh
/// UUID, so client-supplied names never touch the filesystem path.
pub async fn upload_file(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<UploadQuery>,
    headers: header::HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let filename = sanitize_filename(&query.filename);

    let input = validate_file_upload(&filename, &content_type, bytes.len() as u64)
        .map_err(ApiError::validation)?;

    let file_id = Uuid::new_v4();
    let size = bytes.len() as i64;

    tokio::fs::create_dir_all(&state.config.uploads_dir)
        .await
        .map_err(|e| io_internal("failed to create uploads directory", e))?;

    let path = disk_path(&state.config.uploads_dir, &file_id);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| io_internal("failed to write upload", e))?;

    let user_id = session.user_id().to_string();
    let db_state = state.clone();
    let row_result = blocking(move || {
        db_state
            .db
            .insert_file(
                &file_id.to_string(),
                &user_id,
                &input.filename,
                &input.content_type,
                size,
            )
            .map_err(ApiError::from)
    })
    .await;

    // Keep disk and metadata consistent when the insert fails.
    if row_result.is_err() {
        let _ = tokio::fs::remove_file(&path).await;
    }
    row_result?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "file_id": file_id, "size": size })),
    ))
}

/// GET /files/{id} — streams the blob back to its owner.
pub async fn download_file(
    State(state): State<AppState>,
    session: AuthSession,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session.session();
    let db_state = state.clone();
    let row = blocking(move || {
        let id = file_id.to_string();
        let permission = check_permission(&db_state.db, &session, ResourceKind::File, &id);
        if !permission.allowed {
            return Err(denial_error(&permission));
        }
        db_state
            .db
            .get_file(&id)
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::NotFound("file not found".into()))
    })
    .await?;

    let path = disk_path(&state.config.uploads_dir, &file_id);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| io_internal("failed to read stored file", e))?;

    Ok((
        [
            (header::CONTENT_TYPE, row.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", row.name),
            ),
        ],
        bytes,
    ))
}

/// GET /files/{id}/meta — metadata only, owner only.
pub async fn file_metadata(
    State(state): State<AppState>,
    session: AuthSession,
    Path(file_id): Path<Uuid>,
) -> Result<Json<FileDto>, ApiError> {
    let session = session.session();
    let row = blocking(move || {
        let id = file_id.to_string();
        let permission = check_permission(&state.db, &session, ResourceKind::File, &id);
        if !permission.allowed {
            return Err(denial_error(&permission));
        }
        state
            .db
            .get_file(&id)
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::NotFound("file not found".into()))
    })
    .await?;

    Ok(Json(to_file_dto(row)))
}

/// DELETE /files/{id} — removes the metadata row, then the blob.
pub async fn delete_file(
    State(state): State<AppState>,
    session: AuthSession,
    Path(file_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let session = session.session();
    let db_state = state.clone();
    blocking(move || {
        let id = file_id.to_string();
        let permission = check_permission(&db_state.db, &session, ResourceKind::File, &id);
        if !permission.allowed {
            return Err(denial_error(&permission));
        }
        db_state.db.delete_file(&id).map_err(ApiError::from)
    })
    .await?;

    let path = disk_path(&state.config.uploads_dir, &file_id);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        // The row is gone; a missing blob is not worth failing the call.
        error!("failed to remove stored file {}: {}", path.display(), e);
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_path_is_id_only() {
        let id = Uuid::new_v4();
        let path = disk_path("./uploads", &id);
        assert_eq!(path, FsPath::new("./uploads").join(id.to_string()));
    }
}
