//! One-shot messages carried across a redirect in a cookie.

use super::cookies::{build_cookie, read_cookie, removal_cookie};
use super::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::debug;

pub const FLASH_COOKIE: &str = "claimdesk_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl FlashLevel {
    /// Bootstrap alert modifier
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

/// Messages waiting to be shown: those carried in by the request plus any
/// added by the handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flashes {
    messages: Vec<Flash>,
}

impl Flashes {
    pub fn messages(&self) -> &[Flash] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, level: FlashLevel, text: impl Into<String>) {
        self.messages.push(Flash {
            level,
            text: text.into(),
        });
    }

    pub fn success(mut self, text: impl Into<String>) -> Self {
        self.push(FlashLevel::Success, text);
        self
    }

    pub fn error(mut self, text: impl Into<String>) -> Self {
        self.push(FlashLevel::Error, text);
        self
    }

    /// Add every message as an error
    pub fn errors<I, T>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        for text in texts {
            self.push(FlashLevel::Error, text);
        }
        self
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&self.messages).unwrap_or_default())
    }

    /// Decode a cookie value; anything malformed yields no messages
    pub fn decode(raw: &str) -> Self {
        let messages = URL_SAFE_NO_PAD
            .decode(raw)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self { messages }
    }

    /// 303 redirect that hands the messages to the next page
    pub fn redirect(&self, location: &str, secure: bool) -> Response {
        let mut response = (StatusCode::SEE_OTHER, [(LOCATION, location.to_string())]).into_response();
        let cookie = if self.is_empty() {
            removal_cookie(FLASH_COOKIE, secure)
        } else {
            build_cookie(FLASH_COOKIE, &self.encode(), None, secure)
        };
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
        response
    }
}

/// Response marker: the page showed the messages it was handed
#[derive(Debug, Clone, Copy)]
struct MessagesShown;

/// Full HTML page whose layout displays the pending messages
///
/// Only responses built from this clear the message cookie; pages that never
/// show messages (the printable report, error pages) leave them waiting.
#[derive(Debug, Clone)]
pub struct FlashPage(pub String);

impl IntoResponse for FlashPage {
    fn into_response(self) -> Response {
        let mut response = Html(self.0).into_response();
        response.extensions_mut().insert(MessagesShown);
        response
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Flashes
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Flashes>().cloned().unwrap_or_default())
    }
}

/// Load incoming messages and clear the cookie once a full page rendered them
pub async fn flash_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let incoming = read_cookie(request.headers(), FLASH_COOKIE)
        .map(Flashes::decode)
        .unwrap_or_default();
    let had_messages = !incoming.is_empty();
    let is_htmx = request.headers().contains_key("hx-request");
    request.extensions_mut().insert(incoming);

    let mut response = next.run(request).await;

    let sets_own_cookie = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(FLASH_COOKIE));
    let rendered_page = response.status().is_success()
        && !is_htmx
        && response.extensions().get::<MessagesShown>().is_some();

    if had_messages && rendered_page && !sets_own_cookie {
        debug!("flash messages delivered");
        let cookie = removal_cookie(FLASH_COOKIE, !state.settings.debug);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;

    #[test]
    fn test_encode_decode() {
        let flashes = Flashes::default()
            .success("Saved")
            .errors(["Bad", "Worse"]);
        let decoded = Flashes::decode(&flashes.encode());
        assert_eq!(decoded, flashes);
        assert_eq!(decoded.messages()[2].level.css_class(), "danger");
        assert!(Flashes::decode("%%%").is_empty());
    }

    #[test]
    fn test_flash_page_is_marked() {
        let response = FlashPage("<p>hi</p>".to_string()).into_response();
        assert!(response.extensions().get::<MessagesShown>().is_some());
        assert!(response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        let plain = Html("<p>hi</p>").into_response();
        assert!(plain.extensions().get::<MessagesShown>().is_none());
    }

    #[test]
    fn test_redirect_sets_cookie() {
        let response = Flashes::default().success("Done").redirect("/", false);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/");
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("claimdesk_messages="));
    }
}
