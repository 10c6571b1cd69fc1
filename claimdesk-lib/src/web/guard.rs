//! Same-origin checks for state-changing requests and anti-framing headers.

use super::AppError;
use axum::body::Body;
use axum::http::header::{HOST, ORIGIN, REFERER, X_FRAME_OPTIONS};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

const SEC_FETCH_SITE: &str = "sec-fetch-site";

/// Host (with port) named by an `Origin` or `Referer` value
fn source_host(value: &str) -> Option<String> {
    let uri: Uri = value.parse().ok()?;
    uri.authority().map(|authority| authority.as_str().to_ascii_lowercase())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Why a request that changes state must be refused, if it must
pub fn cross_site_reason(headers: &HeaderMap) -> Option<&'static str> {
    let header = |name: &str| header_str(headers, name);

    if header(SEC_FETCH_SITE).is_some_and(|site| site.eq_ignore_ascii_case("cross-site")) {
        return Some("cross-site fetch");
    }

    // Clients that send neither header (curl, scripts) are let through.
    let (source, label) = match (header(ORIGIN.as_str()), header(REFERER.as_str())) {
        (Some(origin), _) => (origin, "origin"),
        (None, Some(referer)) => (referer, "referer"),
        (None, None) => return None,
    };
    let host = header(HOST.as_str()).map(str::to_ascii_lowercase);
    match (source_host(source), host) {
        (Some(source), Some(host)) if source == host => None,
        _ if label == "origin" => Some("origin does not match host"),
        _ => Some("referer does not match host"),
    }
}

/// Refuse cross-site POSTs and forbid framing of every response
pub async fn same_origin_middleware(request: Request<Body>, next: Next) -> Response {
    let safe = matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    );

    let mut response = match cross_site_reason(request.headers()).filter(|_| !safe) {
        Some(reason) => {
            warn!(path = %request.uri().path(), reason, "cross-site request refused");
            AppError::Forbidden.into_response()
        }
        None => next.run(request).await,
    };
    response
        .headers_mut()
        .insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}
