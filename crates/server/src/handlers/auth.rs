//! Session and health endpoints.

use crate::auth::{Authenticated, TraceId};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use coffer_service::{ServiceError, UserInfo};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub name: String,
    pub token: String,
    /// `name:token`, ready for `Authorization: Bearer`.
    pub credential: String,
    pub expires_at: String,
}

/// POST /api/v1/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let session = match state.services.users.login(&req.name, &req.password).await {
        Ok(session) => {
            metrics::record_login(true);
            session
        }
        Err(e) => {
            if matches!(e, ServiceError::InvalidCredentials) {
                metrics::record_login(false);
            }
            return Err(e.into());
        }
    };

    let expires_at = OffsetDateTime::from_unix_timestamp(session.expires)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .ok_or_else(|| ApiError::Internal("failed to format session expiry".to_string()))?;

    Ok(Json(LoginResponse {
        credential: session.credential(),
        name: session.name,
        token: session.token,
        expires_at,
    }))
}

/// POST /api/v1/logout
pub async fn logout(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<StatusCode> {
    state.services.users.logout(&user.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/whoami
pub async fn whoami(Authenticated(user): Authenticated) -> Json<UserInfo> {
    Json(user)
}

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub name: String,
    pub locked: bool,
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: String,
    pub stores: Vec<StoreHealth>,
    pub trace_id: String,
}

/// GET /api/v1/health
///
/// Unauthenticated for load balancers. Returns 503 when any store fails its
/// health check. A held lock alone is reported but not treated as a failure.
pub async fn health_check(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
) -> (StatusCode, Json<HealthResponse>) {
    let mut stores = Vec::new();
    let mut healthy = true;
    for store in state.stores.blobs() {
        let ok = match store.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(store = store.name(), error = %e, "store health check failed");
                false
            }
        };
        let locked = store.is_locked().await.unwrap_or(false);
        healthy &= ok;
        stores.push(StoreHealth {
            name: store.name().to_string(),
            locked,
            ok,
        });
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            backend: state.config.storage.kind().to_string(),
            stores,
            trace_id: trace_id.to_string(),
        }),
    )
}
