//! File endpoints.
//!
//! Uploads are raw request bodies with the access list in the query string:
//! `PUT /api/v1/files/report.pdf?access=finance,board`.

use crate::auth::{Admin, Authenticated};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use coffer_core::access;
use coffer_metadata::FileModel;
use coffer_service::UserInfo;
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub access: String,
}

#[derive(Debug, Deserialize)]
pub struct FileAccessRequest {
    pub access: Vec<String>,
}

/// GET /api/v1/files
///
/// Administrators see every file; everyone else sees what their labels open.
pub async fn list_files(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<Json<Vec<FileModel>>> {
    let files = if user.is_admin {
        state.services.files.list().await?
    } else {
        state.services.files.list_visible(&user.access).await?
    };
    Ok(Json(files))
}

/// PUT /api/v1/files/{name}
pub async fn upload_file(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(name): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<FileModel>)> {
    let labels = access::parse_list(&query.access)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let size = body.len();
    let file = state.services.files.upload(&name, body, &labels).await?;

    metrics::FILES_UPLOADED.inc();
    metrics::BYTES_UPLOADED.inc_by(size as u64);
    tracing::info!(admin = %admin.name, file = %file.name, size, "file uploaded via api");
    Ok((StatusCode::CREATED, Json(file)))
}

/// GET /api/v1/files/{name}
pub async fn download_file(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let data = fetch_for(&state, &user, &name).await?;
    Ok(file_response(&name, data, false))
}

/// DELETE /api/v1/files/{name}
pub async fn delete_file(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.files.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/files/{name}/access
pub async fn update_file_access(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(name): Path<String>,
    Json(req): Json<FileAccessRequest>,
) -> ApiResult<Json<FileModel>> {
    state
        .services
        .files
        .update_access(&name, &req.access)
        .await?;
    Ok(Json(state.services.files.get(&name).await?))
}

/// Read a file on behalf of `user`: unchecked for administrators, label
/// intersection for everyone else.
pub(crate) async fn fetch_for(
    state: &AppState,
    user: &UserInfo,
    name: &str,
) -> ApiResult<bytes::Bytes> {
    let data = if user.is_admin {
        state.services.files.read(name).await?
    } else {
        state.services.files.retrieve(name, &user.access).await?
    };
    metrics::FILES_DOWNLOADED.inc();
    Ok(data)
}

/// Octet-stream response with a content-hash ETag.
pub(crate) fn file_response(name: &str, data: bytes::Bytes, attachment: bool) -> Response {
    let etag = format!("\"{}\"", hex::encode(Sha256::digest(&data)));
    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }
    if attachment {
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_graphic() && c != '"' { c } else { '_' })
            .collect();
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{safe}\"")) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}
