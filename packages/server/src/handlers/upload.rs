use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::upload::{HistoryEntry, HistoryResponse, UploadResponse};
use crate::state::AppState;
use crate::uploads::{self, UploadStore};

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_SLACK: u64 = 64 * 1024;

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_upload_size.saturating_add(MULTIPART_SLACK) as usize)
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Uploads",
    operation_id = "submitUpload",
    summary = "Upload an equipment CSV",
    description = "Parses the `file` multipart field as an equipment table \
        (Equipment Name, Type, Flowrate, Pressure, Temperature), stores it and \
        returns the computed statistics. Only the most recent uploads are kept \
        per user; older ones are deleted.",
    request_body(content_type = "multipart/form-data", description = "CSV file in the `file` field"),
    responses(
        (status = 201, description = "Upload stored", body = UploadResponse),
        (status = 400, description = "Unparseable file (MALFORMED_INPUT) or bad request (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 503, description = "Storage unavailable (PERSISTENCE_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(owner_id = auth_user.user_id))]
pub async fn submit_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
        file = Some((filename, data.to_vec()));
    }

    let (filename, data) = file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    let outcome = uploads::submit_upload(&state, auth_user.user_id, &filename, &data).await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(outcome))))
}

#[utoipa::path(
    get,
    path = "/history",
    tag = "Uploads",
    operation_id = "listHistory",
    summary = "List recent uploads",
    description = "Returns the caller's retained uploads, most recent first.",
    responses(
        (status = 200, description = "Upload history", body = HistoryResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 503, description = "Storage unavailable (PERSISTENCE_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn list_history(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, AppError> {
    let uploads = UploadStore::new(&state.db)
        .list_recent(auth_user.user_id, state.config.history.keep)
        .await?
        .into_iter()
        .map(HistoryEntry::from)
        .collect();

    Ok(Json(HistoryResponse { uploads }))
}

#[utoipa::path(
    get,
    path = "/{id}/report",
    tag = "Uploads",
    operation_id = "renderReport",
    summary = "Download the PDF report of an upload",
    params(("id" = i32, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "PDF report", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Upload not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn render_report(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let pdf = uploads::render_report(&state, auth_user.user_id, id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"report_{id}.pdf\""),
            ),
        ],
        pdf,
    )
        .into_response())
}
