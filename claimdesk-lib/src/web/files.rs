//! Uploaded media and bundled static assets served from disk.

use super::error::{AppError, AppResult};
use super::AppState;
use axum::extract::{Path as UrlPath, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Join a request path under `root`, refusing anything that could escape it
pub fn safe_join(root: &Path, requested: &str) -> Option<PathBuf> {
    let requested = requested.trim_start_matches('/');
    if requested.is_empty() || requested.contains('\\') || requested.contains('\0') {
        return None;
    }
    let relative = Path::new(requested);
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

/// Content type from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "html" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

async fn serve_file(root: &Path, requested: &str) -> AppResult<Response> {
    let Some(path) = safe_join(root, requested) else {
        warn!(%requested, "refused file path");
        return Err(AppError::NotFound);
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, content_type_for(&path))], bytes).into_response()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound),
        Err(e) => {
            // Directories and unreadable files look the same as missing ones.
            warn!(path = %path.display(), error = %e, "failed to read file");
            Err(AppError::NotFound)
        }
    }
}

/// `GET <media_url>*path`
pub async fn serve_media(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> AppResult<Response> {
    serve_file(&state.settings.media_root, &path).await
}

/// `GET /static/*path`
pub async fn serve_static(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> AppResult<Response> {
    serve_file(&state.settings.static_root, &path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_join() {
        let root = Path::new("/srv/media");
        assert_eq!(
            safe_join(root, "profile_pictures/user_1.png"),
            Some(PathBuf::from("/srv/media/profile_pictures/user_1.png"))
        );
        assert_eq!(
            safe_join(root, "/images/a.svg"),
            Some(PathBuf::from("/srv/media/images/a.svg"))
        );
        assert_eq!(safe_join(root, "../secret.txt"), None);
        assert_eq!(safe_join(root, "a/../../b"), None);
        assert_eq!(safe_join(root, ""), None);
        assert_eq!(safe_join(root, "..\\x"), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a/b.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("site.css")), "text/css; charset=utf-8");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }
}
