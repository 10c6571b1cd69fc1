use crate::render;
use crate::utils::encode_query_component;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, warn};

pub const LOGIN_URL: &str = "/auth/login/";

/// Errors a handler can end with, each mapped to one HTTP response
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("authentication required for {next}")]
    LoginRequired { next: String, htmx: bool },

    #[error("staff access required")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Login page URL that returns to `next` afterwards
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, encode_query_component(next))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => {
                (StatusCode::NOT_FOUND, Html(render::not_found_page())).into_response()
            }
            AppError::LoginRequired { next, htmx } => {
                let target = login_url(&next);
                if htmx {
                    // htmx ignores 3xx bodies; HX-Redirect makes it navigate the whole page.
                    let mut response = StatusCode::UNAUTHORIZED.into_response();
                    if let Ok(value) = HeaderValue::from_str(&target) {
                        response.headers_mut().insert("hx-redirect", value);
                    }
                    response
                } else {
                    (StatusCode::SEE_OTHER, [(LOCATION, target)]).into_response()
                }
            }
            AppError::Forbidden => {
                warn!("non-staff user refused");
                (StatusCode::FORBIDDEN, Html(render::forbidden_page())).into_response()
            }
            AppError::BadRequest(message) => {
                warn!(%message, "bad request");
                (StatusCode::BAD_REQUEST, Html(render::bad_request_page(&message))).into_response()
            }
            AppError::Database(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(render::server_error_page()))
                    .into_response()
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(render::server_error_page()))
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect() {
        let response = AppError::LoginRequired {
            next: "/claim/30001/?x=1".to_string(),
            htmx: false,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/auth/login/?next=%2Fclaim%2F30001%2F%3Fx%3D1"
        );
    }

    #[test]
    fn test_htmx_login_redirect() {
        let response = AppError::LoginRequired {
            next: "/api/search/".to_string(),
            htmx: true,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["hx-redirect"],
            "/auth/login/?next=%2Fapi%2Fsearch%2F"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
