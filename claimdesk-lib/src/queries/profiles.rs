use crate::models::UserProfile;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const PROFILE_COLUMNS: &str = "id, user_id, profile_picture, bio, phone_number, created_at, updated_at";

fn profile_from_row(row: &SqliteRow) -> Result<UserProfile, sqlx::Error> {
    Ok(UserProfile {
        id: row.try_get::<i64, _>("id")?,
        user_id: row.try_get::<i64, _>("user_id")?,
        profile_picture: row.try_get::<Option<String>, _>("profile_picture")?,
        bio: row.try_get::<String, _>("bio")?,
        phone_number: row.try_get::<String, _>("phone_number")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Fetch the profile of a user, creating an empty one if it is missing
pub async fn get_or_create_profile(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<UserProfile, sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO user_profiles (user_id, created_at, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let sql = format!("SELECT {} FROM user_profiles WHERE user_id = ?", PROFILE_COLUMNS);
    let row = sqlx::query(&sql).bind(user_id).fetch_one(pool).await?;
    profile_from_row(&row)
}

pub async fn update_profile_details(
    pool: &SqlitePool,
    user_id: i64,
    bio: &str,
    phone_number: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE user_profiles SET bio = ?, phone_number = ?, updated_at = ? WHERE user_id = ?")
        .bind(bio)
        .bind(phone_number)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Point the profile at a stored picture (path relative to the media root)
pub async fn set_profile_picture(
    pool: &SqlitePool,
    user_id: i64,
    picture: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE user_profiles SET profile_picture = ?, updated_at = ? WHERE user_id = ?")
        .bind(picture)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
