//! Server test utilities.

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use coffer_core::{AppConfig, PasswordHasher, PasswordPolicy};
use coffer_metadata::Repositories;
use coffer_server::{AppState, create_router};
use coffer_service::{NewUser, Services, UserInfo};
use coffer_storage::{LockPolicy, StoreSet};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Password that satisfies the default policy.
#[allow(dead_code)]
pub const STRONG: &str = "correct-Horse-battery-9";

/// Reversible hasher so tests do not pay for Argon2.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> coffer_core::Result<String> {
        Ok(format!("plain:{password}"))
    }

    fn check(&self, password: &str, hash: &str) -> coffer_core::Result<()> {
        if hash.strip_prefix("plain:") == Some(password) {
            Ok(())
        } else {
            Err(coffer_core::Error::PasswordMismatch)
        }
    }
}

/// A router over in-memory stores.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
}

/// A rendered HTML response.
#[allow(dead_code)]
pub struct Page {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

#[allow(dead_code)]
impl Page {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// The first CSRF token embedded in the page.
    pub fn csrf(&self) -> String {
        let marker = r#"name="csrf" value=""#;
        let start = self.body.find(marker).expect("page has no csrf field") + marker.len();
        let len = self.body[start..].find('"').expect("unterminated csrf value");
        self.body[start..start + len].to_string()
    }

    /// `name=value` of the session cookie set by this response.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("coffer_session="))
            .map(|v| v.split(';').next().unwrap_or_default().to_string())
    }
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = AppConfig::for_testing();
        modifier(&mut config);

        coffer_server::metrics::register_metrics();

        let stores = StoreSet::in_memory(LockPolicy::new(
            config.lock.max_retries,
            config.lock.retry_interval(),
        ));
        let repos = Repositories::new(&stores, &config);
        let services = Services::new(
            &repos,
            stores.content.clone(),
            Arc::new(PlainHasher),
            Arc::new(PasswordPolicy::from_config(&config.password)),
        );
        let state = AppState::new(config, services, stores);
        let router = create_router(state.clone());
        Self { router, state }
    }

    pub async fn add_user(&self, name: &str, is_admin: bool, access: &[&str]) -> UserInfo {
        self.state
            .services
            .users
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{name}@example.com"),
                password: STRONG.to_string(),
                is_admin,
                access: access.iter().map(|s| s.to_string()).collect(),
            })
            .await
            .expect("Failed to create user")
    }

    /// Log `name` in directly and return their `name:token` credential.
    pub async fn login(&self, name: &str) -> String {
        self.state
            .services
            .users
            .login(name, STRONG)
            .await
            .expect("Failed to log in")
            .credential()
    }

    /// Create the administrator `root` and return their credential.
    pub async fn admin(&self) -> String {
        self.add_user("root", true, &[]).await;
        self.login("root").await
    }

    /// Create an ordinary user and return their credential.
    pub async fn user(&self, name: &str, access: &[&str]) -> String {
        self.add_user(name, false, access).await;
        self.login(name).await
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Make a JSON request, returning the status and parsed body.
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        credential: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(credential) = credential {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {credential}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let response = self.send(builder.body(body).unwrap()).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Upload raw bytes through the API.
    pub async fn upload(
        &self,
        name: &str,
        access: &str,
        data: &'static [u8],
        credential: &str,
    ) -> StatusCode {
        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/files/{name}?access={access}"))
            .header(header::AUTHORIZATION, format!("Bearer {credential}"))
            .body(Body::from(data))
            .unwrap();
        self.send(request).await.status()
    }

    /// Download raw bytes through the API.
    pub async fn download(&self, name: &str, credential: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        let request = Request::builder()
            .uri(format!("/api/v1/files/{name}"))
            .header(header::AUTHORIZATION, format!("Bearer {credential}"))
            .body(Body::empty())
            .unwrap();
        let response = self.send(request).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    /// GET an HTML page, optionally with a `coffer_session=...` cookie.
    pub async fn get_page(&self, uri: &str, cookie: Option<&str>) -> Page {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.page(builder.body(Body::empty()).unwrap()).await
    }

    /// POST an urlencoded form.
    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)], cookie: Option<&str>) -> Page {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.page(builder.body(Body::from(body)).unwrap()).await
    }

    /// Log in through the HTML form and return the session cookie.
    pub async fn page_login(&self, name: &str, password: &str) -> String {
        let form = self.get_page("/login", None).await;
        let csrf = form.csrf();
        let page = self
            .post_form(
                "/login",
                &[("csrf", &csrf), ("name", name), ("password", password)],
                None,
            )
            .await;
        page.session_cookie().expect("login set no session cookie")
    }

    async fn page(&self, request: Request<Body>) -> Page {
        let response = self.send(request).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        Page {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

fn form_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
