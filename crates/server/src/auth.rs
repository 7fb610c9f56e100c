//! Authentication middleware and request extractors.
//!
//! A session credential is `name:token`, sent either as
//! `Authorization: Bearer name:token` or in the `coffer_session` cookie.
//! The middleware resolves it once per request and stores the user as a
//! request extension; handlers then ask for [`Authenticated`] or [`Admin`].

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use coffer_service::{ServiceError, UserInfo};
use std::net::SocketAddr;
use tower_cookies::Cookies;
use tracing::Instrument;
use uuid::Uuid;

/// Cookie carrying the session credential for HTML pages.
pub const SESSION_COOKIE: &str = "coffer_session";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, keeping at most
    /// [`MAX_TRACE_ID_LEN`] printable ASCII characters.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed `name:token` credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub token: String,
}

impl Credential {
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, token) = raw.trim().split_once(':')?;
        if name.is_empty() || token.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            token: token.to_string(),
        })
    }
}

/// The user behind a valid credential, stored as a request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub UserInfo);

/// Extract a bearer credential. The scheme is case-insensitive (RFC 6750).
fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Resolve the request's credential, if any, and run the rest of the stack
/// inside a span carrying the trace ID.
///
/// A missing or invalid credential is not an error here: public routes such
/// as login must still work. Only store failures abort the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let span = tracing::info_span!("request", trace_id = %trace_id);
    req.extensions_mut().insert(trace_id);

    let raw = match bearer_credential(req.headers()) {
        Some(raw) => Some(raw.to_string()),
        None => req
            .extensions()
            .get::<Cookies>()
            .and_then(|cookies| cookies.get(SESSION_COOKIE))
            .map(|cookie| cookie.value().to_string()),
    };

    if let Some(credential) = raw.as_deref().and_then(Credential::parse) {
        match state
            .services
            .users
            .authenticate(&credential.name, &credential.token)
            .instrument(span.clone())
            .await
        {
            Ok(user) => {
                req.extensions_mut().insert(AuthenticatedUser(user));
            }
            Err(ServiceError::InvalidCredentials) => {
                tracing::debug!(parent: &span, user = %credential.name, "stale or invalid credential");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(next.run(req).instrument(span).await)
}

/// Any signed-in user. Rejects with 401.
pub struct Authenticated(pub UserInfo);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|user| Self(user.0.clone()))
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}

/// A signed-in administrator. Rejects with 401, or 403 for non-admins.
pub struct Admin(pub UserInfo);

impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(user) = Authenticated::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::Forbidden("administrator required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Signed-in user for HTML pages. Redirects to the login page instead of
/// returning a JSON error.
pub struct PageUser(pub UserInfo);

impl<S: Send + Sync> FromRequestParts<S> for PageUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|user| Self(user.0.clone()))
            .ok_or_else(|| Redirect::to("/login").into_response())
    }
}

/// The signed-in user, if any. Never rejects.
pub struct MaybeUser(pub Option<UserInfo>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}

/// Client address that CSRF tokens are bound to.
///
/// Uses the first `X-Forwarded-For` entry only when
/// `server.trust_forwarded_for` is set, then the socket peer, then
/// `"unknown"` when neither is available (for example under test).
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.config.server.trust_forwarded_for
            && let Some(ip) = forwarded_ip(&parts.headers)
        {
            return Ok(Self(ip));
        }
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self(ip))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let ip = value.split(',').next()?.trim();
    (!ip.is_empty()).then(|| ip.to_string())
}
