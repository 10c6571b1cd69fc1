use super::users::user_from_row;
use crate::models::User;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub async fn create_session(
    pool: &SqlitePool,
    token_digest: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO sessions (token_digest, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(token_digest)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Active user owning an unexpired session
pub async fn find_session_user(
    pool: &SqlitePool,
    token_digest: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.password_hash, u.is_staff,
                u.is_superuser, u.is_active, u.date_joined, u.last_login
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token_digest = ? AND s.expires_at > ? AND u.is_active = 1",
    )
    .bind(token_digest)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn delete_session(pool: &SqlitePool, token_digest: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token_digest = ?")
        .bind(token_digest)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop every session of a user, e.g. after a password reset
pub async fn delete_user_sessions(pool: &SqlitePool, user_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Remove expired sessions; returns how many were deleted
pub async fn purge_expired_sessions(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
