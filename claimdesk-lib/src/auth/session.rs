use crate::models::User;
use crate::queries::{sessions, users};
use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Cookie carrying the opaque session token
pub const SESSION_COOKIE: &str = "claimdesk_session";

/// Fresh random session token (32 bytes, base64url)
pub fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest stored in the database in place of the token itself
pub fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Open a session for `user_id` and return the token for the cookie
pub async fn start_session(pool: &SqlitePool, user_id: i64, ttl_secs: i64) -> Result<String> {
    let token = new_session_token();
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);

    let purged = sessions::purge_expired_sessions(pool, Utc::now()).await?;
    if purged > 0 {
        debug!(purged, "expired sessions removed");
    }

    sessions::create_session(pool, &token_digest(&token), user_id, expires_at)
        .await
        .with_context(|| format!("Failed to create session for user {}", user_id))?;
    users::touch_last_login(pool, user_id).await?;

    info!(user_id, "session started");
    Ok(token)
}

/// User behind a session token, if the session is live and the account active
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    if token.is_empty() {
        return Ok(None);
    }
    let user = sessions::find_session_user(pool, &token_digest(token), Utc::now())
        .await
        .with_context(|| "Failed to look up session")?;
    if user.is_none() {
        debug!("session token not found or expired");
    }
    Ok(user)
}

pub async fn end_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sessions::delete_session(pool, &token_digest(token))
        .await
        .with_context(|| "Failed to delete session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_connection::DatabaseConnection;
    use crate::queries::users::{create_user, set_user_active, NewUser};

    #[test]
    fn test_token_digest_is_stable() {
        let token = new_session_token();
        assert_eq!(token.len(), 43);
        assert_eq!(token_digest(&token), token_digest(&token));
        assert_ne!(token_digest(&token), token);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let db = DatabaseConnection::open_and_migrate("sqlite::memory:")
            .await
            .unwrap();
        let pool = db.pool();
        let user = create_user(
            pool,
            &NewUser {
                username: "dana".to_string(),
                password_hash: "x".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let token = start_session(pool, user.id, 3600).await.unwrap();
        let resolved = resolve_session(pool, &token).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(resolved.last_login.is_some());

        set_user_active(pool, user.id, false).await.unwrap();
        assert!(resolve_session(pool, &token).await.unwrap().is_none());
        set_user_active(pool, user.id, true).await.unwrap();

        end_session(pool, &token).await.unwrap();
        assert!(resolve_session(pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let db = DatabaseConnection::open_and_migrate("sqlite::memory:")
            .await
            .unwrap();
        let pool = db.pool();
        let user = create_user(
            pool,
            &NewUser {
                username: "eli".to_string(),
                password_hash: "x".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let token = start_session(pool, user.id, -10).await.unwrap();
        assert!(resolve_session(pool, &token).await.unwrap().is_none());
        let purged = sessions::purge_expired_sessions(pool, Utc::now()).await.unwrap();
        assert_eq!(purged, 1);
    }
}
