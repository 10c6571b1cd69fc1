//! HTTP surface: router, shared state and request plumbing.

pub mod admin;
pub mod auth;
pub mod claims;
pub mod cookies;
pub mod error;
pub mod extract;
pub mod files;
pub mod flash;
pub mod guard;
pub mod profile;

use crate::config::Settings;
use crate::mail::Mailer;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};

pub use error::{AppError, AppResult};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub settings: Arc<Settings>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(pool: SqlitePool, settings: Settings, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            pool,
            settings: Arc::new(settings),
            mailer,
        }
    }

    /// Cookies get the `Secure` attribute outside debug mode
    pub fn secure_cookies(&self) -> bool {
        !self.settings.debug
    }
}

async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!("http.request", method = %method, path = %path);

    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    let _entered = span.enter();
    if response.status().is_server_error() {
        warn!(status, elapsed_ms, "request failed");
    } else {
        info!(status, elapsed_ms, "request handled");
    }
    response
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let settings = &state.settings;
    let body_limit = (2 * settings.max_csv_bytes).max(settings.max_picture_bytes) + 1024 * 1024;
    let media_route = format!("{}*path", settings.media_url);

    Router::new()
        .route("/", get(claims::claims_list))
        .route("/claim/:claim_id/", get(claims::claim_detail))
        .route("/api/search/", get(claims::search_claims))
        .route("/api/flag/:claim_id/", post(claims::flag_claim))
        .route("/api/add-note/:claim_id/", post(claims::add_note))
        .route("/report/:claim_id/", get(claims::claim_report))
        .route(
            "/profile/",
            get(profile::profile_view).post(profile::profile_update),
        )
        .route("/profile/upload-picture/", post(profile::upload_picture))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/logout/", get(auth::logout))
        .route(
            "/auth/password-reset/",
            get(auth::password_reset_form).post(auth::password_reset),
        )
        .route(
            "/auth/password-reset-done/",
            get(auth::password_reset_done),
        )
        .route(
            "/auth/password-reset-confirm/:uidb64/:token/",
            get(auth::password_reset_confirm_form).post(auth::password_reset_confirm),
        )
        .route("/admin-dashboard/", get(admin::dashboard))
        .route("/admin-dashboard/csv-upload/", get(admin::csv_upload_form))
        .route("/admin-dashboard/process-csv/", post(admin::process_csv))
        .route(
            "/admin-dashboard/manage-users/",
            get(admin::manage_users_form).post(admin::manage_users),
        )
        .route("/admin-dashboard/system-stats/", get(admin::system_stats))
        .route(&media_route, get(files::serve_media))
        .route("/static/*path", get(files::serve_static))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), flash::flash_middleware))
        .layer(from_fn(guard::same_origin_middleware))
        .layer(from_fn(request_logging_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind `bind_addr` and serve until the process is stopped
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    use anyhow::Context;

    let addr = state.settings.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, debug = state.settings.debug, "claimdesk listening");

    axum::serve(listener, build_router(state))
        .await
        .with_context(|| "HTTP server failed")?;
    Ok(())
}
