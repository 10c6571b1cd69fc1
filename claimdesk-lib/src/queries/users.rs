use crate::models::User;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash, is_staff, is_superuser, is_active, date_joined, last_login";

/// Values for a new account; the password must already be hashed
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get::<i64, _>("id")?,
        username: row.try_get::<String, _>("username")?,
        email: row.try_get::<String, _>("email")?,
        first_name: row.try_get::<String, _>("first_name")?,
        last_name: row.try_get::<String, _>("last_name")?,
        password_hash: row.try_get::<String, _>("password_hash")?,
        is_staff: row.try_get::<bool, _>("is_staff")?,
        is_superuser: row.try_get::<bool, _>("is_superuser")?,
        is_active: row.try_get::<bool, _>("is_active")?,
        date_joined: row.try_get::<DateTime<Utc>, _>("date_joined")?,
        last_login: row.try_get::<Option<DateTime<Utc>>, _>("last_login")?,
    })
}

/// Create a user and its empty profile in one transaction
pub async fn create_user(pool: &SqlitePool, new_user: &NewUser) -> Result<User, sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let sql = format!(
        "INSERT INTO users (username, email, first_name, last_name, password_hash, is_staff, is_superuser, is_active, date_joined)
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
         RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.password_hash)
        .bind(new_user.is_staff)
        .bind(new_user.is_superuser)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
    let user = user_from_row(&row)?;

    sqlx::query("INSERT INTO user_profiles (user_id, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(user.id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(username).fetch_optional(pool).await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Active users registered with `email` (case-insensitive)
pub async fn find_active_users_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Vec<User>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM users WHERE lower(email) = lower(?) AND is_active = 1 ORDER BY id",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(email).fetch_all(pool).await?;
    rows.iter().map(user_from_row).collect()
}

pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub async fn email_exists(pool: &SqlitePool, email: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE lower(email) = lower(?) LIMIT 1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Replace the password hash; this also invalidates outstanding reset tokens
pub async fn update_password(
    pool: &SqlitePool,
    user_id: i64,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_user_names(
    pool: &SqlitePool,
    user_id: i64,
    first_name: &str,
    last_name: &str,
    email: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET first_name = ?, last_name = ?, email = ? WHERE id = ?")
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_user_staff(pool: &SqlitePool, user_id: i64, is_staff: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_staff = ? WHERE id = ?")
        .bind(is_staff)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_user_active(
    pool: &SqlitePool,
    user_id: i64,
    is_active: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_last_login(pool: &SqlitePool, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All users, newest first
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM users ORDER BY date_joined DESC, id DESC",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(user_from_row).collect()
}

/// Totals shown on the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounts {
    pub total: i64,
    pub active: i64,
    pub staff: i64,
}

pub async fn count_users(pool: &SqlitePool) -> Result<UserCounts, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(SUM(CASE WHEN is_staff = 1 THEN 1 ELSE 0 END), 0) AS staff
         FROM users",
    )
    .fetch_one(pool)
    .await?;
    Ok(UserCounts {
        total: row.try_get::<i64, _>("total")?,
        active: row.try_get::<i64, _>("active")?,
        staff: row.try_get::<i64, _>("staff")?,
    })
}
