//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers::{self, pages};
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Session
        .route("/v1/login", post(handlers::login))
        .route("/v1/logout", post(handlers::logout))
        .route("/v1/whoami", get(handlers::whoami))
        // Health check (unauthenticated for load balancers)
        .route("/v1/health", get(handlers::health_check))
        // Users
        .route(
            "/v1/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/v1/users/{name}",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route("/v1/users/{name}/password", put(handlers::update_password))
        .route("/v1/users/{name}/access", put(handlers::update_user_access))
        .route("/v1/users/{name}/email", put(handlers::update_email))
        .route("/v1/users/{name}/promote", post(handlers::promote_user))
        .route("/v1/users/{name}/demote", post(handlers::demote_user))
        // Files
        .route("/v1/files", get(handlers::list_files))
        .route(
            "/v1/files/{name}",
            put(handlers::upload_file)
                .get(handlers::download_file)
                .delete(handlers::delete_file),
        )
        .route(
            "/v1/files/{name}/access",
            put(handlers::update_file_access),
        );

    let page_routes = Router::new()
        .route("/", get(pages::root))
        .route("/login", get(pages::login_form).post(pages::login_submit))
        .route("/logout", post(pages::logout_submit))
        .route("/files", get(pages::files_page))
        .route("/files/{name}", get(pages::download_page))
        .route("/account", get(pages::account_page))
        .route("/account/password", post(pages::change_password_submit))
        .route(
            "/admin/users",
            get(pages::admin_users_page).post(pages::admin_create_user),
        )
        .route(
            "/admin/users/{name}/{action}",
            post(pages::admin_user_action),
        );

    let mut router = Router::new()
        .nest("/api", api_routes)
        .merge(page_routes);

    // When enabled, this endpoint must be network-restricted to the
    // Prometheus scraper.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Layers run outermost first: trace, cookies, auth, handler.
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
