//! Server-rendered HTML pages.
//!
//! Every page that shows a form issues a CSRF token bound to the client
//! address, and every POST verifies one before doing anything else.

use crate::auth::{ClientIp, MaybeUser, PageUser, SESSION_COOKIE};
use crate::error::ApiError;
use crate::handlers::files::{fetch_for, file_response};
use crate::metrics;
use crate::state::AppState;
use crate::templates::{self, Notice};
use axum::Form;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use coffer_core::access;
use coffer_service::{NewUser, ServiceError, UserInfo};
use serde::Deserialize;
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::{Cookie, Cookies};

/// An [`ApiError`] rendered as an HTML page.
pub struct PageError(pub ApiError);

impl<E: Into<ApiError>> From<E> for PageError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        self.0.observe();
        let status = self.0.status_code();
        if status == StatusCode::UNAUTHORIZED {
            return Redirect::to("/login").into_response();
        }
        (
            status,
            Html(templates::error_page(status.as_u16(), &self.0.public_message())),
        )
            .into_response()
    }
}

type PageResult<T = Response> = Result<T, PageError>;

#[derive(Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    csrf: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    csrf: String,
    name: String,
    password: String,
}

#[derive(Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    csrf: String,
    old_password: String,
    new_password: String,
    confirm: String,
}

#[derive(Deserialize)]
pub struct NewUserForm {
    #[serde(default)]
    csrf: String,
    name: String,
    #[serde(default)]
    email: String,
    password: String,
    #[serde(default)]
    access: String,
    is_admin: Option<String>,
}

#[derive(Deserialize)]
pub struct UserActionForm {
    #[serde(default)]
    csrf: String,
    access: Option<String>,
}

async fn verify_csrf(state: &AppState, ip: &str, token: &str) -> Result<(), PageError> {
    state.services.csrf.verify(ip, token).await?;
    Ok(())
}

fn require_admin(user: &UserInfo) -> Result<(), PageError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(PageError(ApiError::Forbidden(
            "administrator required".to_string(),
        )))
    }
}

/// GET /
pub async fn root(MaybeUser(user): MaybeUser) -> Redirect {
    match user {
        Some(_) => Redirect::to("/files"),
        None => Redirect::to("/login"),
    }
}

/// GET /login
pub async fn login_form(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    MaybeUser(user): MaybeUser,
) -> PageResult {
    if user.is_some() {
        return Ok(Redirect::to("/files").into_response());
    }
    let csrf = state.services.csrf.issue(&ip).await?;
    Ok(Html(templates::login_page(&csrf, None)).into_response())
}

/// POST /login
pub async fn login_submit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> PageResult {
    verify_csrf(&state, &ip, &form.csrf).await?;

    match state.services.users.login(&form.name, &form.password).await {
        Ok(session) => {
            metrics::record_login(true);
            let cookie = Cookie::build((SESSION_COOKIE, session.credential()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Strict)
                .secure(state.config.server.secure_cookies)
                .max_age(CookieDuration::seconds(state.config.session.ttl()))
                .build();
            cookies.add(cookie);
            Ok(Redirect::to("/files").into_response())
        }
        Err(ServiceError::InvalidCredentials) => {
            metrics::record_login(false);
            let csrf = state.services.csrf.issue(&ip).await?;
            let notice = Notice::Error("Unknown user or wrong password.".to_string());
            Ok((
                StatusCode::UNAUTHORIZED,
                Html(templates::login_page(&csrf, Some(&notice))),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /logout
pub async fn logout_submit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    MaybeUser(user): MaybeUser,
    cookies: Cookies,
    Form(form): Form<CsrfForm>,
) -> PageResult {
    verify_csrf(&state, &ip, &form.csrf).await?;
    if let Some(user) = user {
        state.services.users.logout(&user.name).await?;
        tracing::info!(user = %user.name, "logged out");
    }
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    Ok(Redirect::to("/login").into_response())
}

/// GET /files
pub async fn files_page(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    PageUser(user): PageUser,
) -> PageResult {
    let files = if user.is_admin {
        state.services.files.list().await?
    } else {
        state.services.files.list_visible(&user.access).await?
    };
    let csrf = state.services.csrf.issue(&ip).await?;
    Ok(Html(templates::files_page(&user, &files, &csrf)).into_response())
}

/// GET /files/{name}
pub async fn download_page(
    State(state): State<AppState>,
    PageUser(user): PageUser,
    Path(name): Path<String>,
) -> PageResult {
    let data = fetch_for(&state, &user, &name).await?;
    Ok(file_response(&name, data, true))
}

/// GET /account
pub async fn account_page(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    PageUser(user): PageUser,
) -> PageResult {
    let csrf = state.services.csrf.issue(&ip).await?;
    Ok(Html(templates::account_page(&user, &csrf, None)).into_response())
}

/// POST /account/password
pub async fn change_password_submit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    PageUser(user): PageUser,
    Form(form): Form<PasswordForm>,
) -> PageResult {
    verify_csrf(&state, &ip, &form.csrf).await?;

    let (status, notice) = if form.new_password != form.confirm {
        (
            StatusCode::BAD_REQUEST,
            Notice::Error("The new passwords do not match.".to_string()),
        )
    } else {
        match state
            .services
            .users
            .change_password(&user.name, &form.old_password, &form.new_password)
            .await
        {
            Ok(()) => (StatusCode::OK, Notice::Info("Password changed.".to_string())),
            Err(ServiceError::InvalidCredentials) => (
                StatusCode::BAD_REQUEST,
                Notice::Error("The current password is wrong.".to_string()),
            ),
            Err(ServiceError::WeakPassword(reason)) => (
                StatusCode::BAD_REQUEST,
                Notice::Error(format!("The new password is too weak: {reason}")),
            ),
            Err(e) => return Err(e.into()),
        }
    };

    let csrf = state.services.csrf.issue(&ip).await?;
    Ok((
        status,
        Html(templates::account_page(&user, &csrf, Some(&notice))),
    )
        .into_response())
}

async fn render_users(
    state: &AppState,
    ip: &str,
    admin: &UserInfo,
    status: StatusCode,
    notice: Option<Notice>,
) -> PageResult {
    let users = state.services.users.list_users().await?;
    let csrf = state.services.csrf.issue(ip).await?;
    Ok((
        status,
        Html(templates::admin_users_page(
            admin,
            &users,
            &csrf,
            notice.as_ref(),
        )),
    )
        .into_response())
}

/// GET /admin/users
pub async fn admin_users_page(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    PageUser(user): PageUser,
) -> PageResult {
    require_admin(&user)?;
    render_users(&state, &ip, &user, StatusCode::OK, None).await
}

/// POST /admin/users
pub async fn admin_create_user(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    PageUser(admin): PageUser,
    Form(form): Form<NewUserForm>,
) -> PageResult {
    require_admin(&admin)?;
    verify_csrf(&state, &ip, &form.csrf).await?;

    let labels = access::parse_list(&form.access);
    let result = match labels {
        Ok(access) => {
            state
                .services
                .users
                .create_user(NewUser {
                    name: form.name.clone(),
                    email: form.email,
                    password: form.password,
                    is_admin: form.is_admin.is_some(),
                    access,
                })
                .await
        }
        Err(e) => Err(e.into()),
    };

    let (status, notice) = match result {
        Ok(user) => (
            StatusCode::OK,
            Notice::Info(format!("Created user {}.", user.name)),
        ),
        Err(e) if is_client_fault(&e) => (
            StatusCode::BAD_REQUEST,
            Notice::Error(format!("Could not create {}: {e}", form.name)),
        ),
        Err(e) => return Err(e.into()),
    };
    render_users(&state, &ip, &admin, status, Some(notice)).await
}

/// POST /admin/users/{name}/{action}
pub async fn admin_user_action(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    PageUser(admin): PageUser,
    Path((name, action)): Path<(String, String)>,
    Form(form): Form<UserActionForm>,
) -> PageResult {
    require_admin(&admin)?;
    verify_csrf(&state, &ip, &form.csrf).await?;

    let users = &state.services.users;
    let self_target = admin.name == name;
    let result = match action.as_str() {
        "delete" if self_target => Err(ServiceError::InvalidArgument(
            "administrators cannot delete themselves".to_string(),
        )),
        "demote" if self_target => Err(ServiceError::InvalidArgument(
            "administrators cannot demote themselves".to_string(),
        )),
        "delete" => users.delete_user(&name).await,
        "promote" => users.promote(&name).await,
        "demote" => users.demote(&name).await,
        "access" => {
            let raw = form.access.unwrap_or_default();
            match access::parse_list(&raw) {
                Ok(labels) => users.update_access(&name, &labels).await.map(|_| ()),
                Err(e) => Err(e.into()),
            }
        }
        other => {
            return Err(PageError(ApiError::NotFound(format!(
                "unknown action {other}"
            ))));
        }
    };

    let (status, notice) = match result {
        Ok(()) => (
            StatusCode::OK,
            Notice::Info(format!("{action}: {name} done.")),
        ),
        Err(e) if is_client_fault(&e) => (
            StatusCode::BAD_REQUEST,
            Notice::Error(format!("{action} {name}: {e}")),
        ),
        Err(e) => return Err(e.into()),
    };
    render_users(&state, &ip, &admin, status, Some(notice)).await
}

/// Errors shown inline on a form rather than as an error page.
fn is_client_fault(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::WeakPassword(_) | ServiceError::InvalidArgument(_)
    ) || err.is_not_found()
        || err.is_already_exists()
}
