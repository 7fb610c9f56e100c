//! User management endpoints.

use crate::auth::{Admin, Authenticated};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use coffer_service::{NewUser, UserInfo};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub access: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    /// Required when changing your own password.
    pub old_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessRequest {
    pub access: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Only the user themself or an administrator may act on `name`.
fn require_self_or_admin(caller: &UserInfo, name: &str) -> ApiResult<()> {
    if caller.is_admin || caller.name == name {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("not allowed to manage user {name}")))
    }
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    Admin(_): Admin,
) -> ApiResult<Json<Vec<UserInfo>>> {
    Ok(Json(state.services.users.list_users().await?))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserInfo>)> {
    let user = state
        .services
        .users
        .create_user(NewUser {
            name: req.name,
            email: req.email,
            password: req.password,
            is_admin: req.is_admin,
            access: req.access,
        })
        .await?;
    tracing::info!(admin = %admin.name, user = %user.name, "user created via api");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/{name}
pub async fn get_user(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(name): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    require_self_or_admin(&caller, &name)?;
    Ok(Json(state.services.users.get_user(&name).await?))
}

/// DELETE /api/v1/users/{name}
pub async fn delete_user(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    if admin.name == name {
        return Err(ApiError::BadRequest(
            "administrators cannot delete themselves".to_string(),
        ));
    }
    state.services.users.delete_user(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/users/{name}/password
///
/// Changing your own password requires the old one. Administrators may
/// reset anyone else's without it.
pub async fn update_password(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(name): Path<String>,
    Json(req): Json<PasswordRequest>,
) -> ApiResult<StatusCode> {
    require_self_or_admin(&caller, &name)?;
    let users = &state.services.users;
    if caller.name == name {
        let old = req
            .old_password
            .ok_or_else(|| ApiError::BadRequest("old_password is required".to_string()))?;
        users
            .change_password(&name, &old, &req.new_password)
            .await?;
    } else {
        users.set_password(&name, &req.new_password).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/users/{name}/access
pub async fn update_user_access(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(name): Path<String>,
    Json(req): Json<AccessRequest>,
) -> ApiResult<Json<UserInfo>> {
    state
        .services
        .users
        .update_access(&name, &req.access)
        .await?;
    Ok(Json(state.services.users.get_user(&name).await?))
}

/// PUT /api/v1/users/{name}/email
pub async fn update_email(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(name): Path<String>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<UserInfo>> {
    require_self_or_admin(&caller, &name)?;
    state.services.users.update_email(&name, &req.email).await?;
    Ok(Json(state.services.users.get_user(&name).await?))
}

/// POST /api/v1/users/{name}/promote
pub async fn promote_user(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(name): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    state.services.users.promote(&name).await?;
    Ok(Json(state.services.users.get_user(&name).await?))
}

/// POST /api/v1/users/{name}/demote
pub async fn demote_user(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(name): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    if admin.name == name {
        return Err(ApiError::BadRequest(
            "administrators cannot demote themselves".to_string(),
        ));
    }
    state.services.users.demote(&name).await?;
    Ok(Json(state.services.users.get_user(&name).await?))
}
