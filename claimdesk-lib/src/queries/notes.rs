use super::parse_text_enum;
use crate::models::{ClaimNote, NoteType};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const NOTE_SELECT: &str = "SELECT n.id, n.claim_id, n.note_type, n.content, n.created_by, u.username AS author_username, n.created_at
     FROM claim_notes n LEFT JOIN users u ON u.id = n.created_by";

/// A note together with the public id of the claim it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct RecentNote {
    pub note: ClaimNote,
    pub claim_id: String,
}

fn note_from_row(row: &SqliteRow) -> Result<ClaimNote, sqlx::Error> {
    Ok(ClaimNote {
        id: row.try_get::<i64, _>("id")?,
        claim_pk: row.try_get::<i64, _>("claim_id")?,
        note_type: parse_text_enum::<NoteType>(&row.try_get::<String, _>("note_type")?)?,
        content: row.try_get::<String, _>("content")?,
        created_by: row.try_get::<Option<i64>, _>("created_by")?,
        author_username: row.try_get::<Option<String>, _>("author_username")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Append a note to a claim and return it with its author resolved
pub async fn insert_note(
    pool: &SqlitePool,
    claim_pk: i64,
    note_type: NoteType,
    content: &str,
    created_by: Option<i64>,
) -> Result<ClaimNote, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO claim_notes (claim_id, note_type, content, created_by, created_at)
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(claim_pk)
    .bind(note_type.as_str())
    .bind(content)
    .bind(created_by)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    let sql = format!("{} WHERE n.id = ?", NOTE_SELECT);
    let row = sqlx::query(&sql).bind(id).fetch_one(pool).await?;
    note_from_row(&row)
}

/// Notes of one claim, oldest first unless `newest_first`
pub async fn list_notes_for_claim(
    pool: &SqlitePool,
    claim_pk: i64,
    newest_first: bool,
) -> Result<Vec<ClaimNote>, sqlx::Error> {
    let order = if newest_first { "DESC" } else { "ASC" };
    let sql = format!(
        "{} WHERE n.claim_id = ? ORDER BY n.created_at {}, n.id {}",
        NOTE_SELECT, order, order
    );
    let rows = sqlx::query(&sql).bind(claim_pk).fetch_all(pool).await?;
    rows.iter().map(note_from_row).collect()
}

/// Latest notes across all claims
pub async fn recent_notes(pool: &SqlitePool, limit: i64) -> Result<Vec<RecentNote>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT n.id, n.claim_id, n.note_type, n.content, n.created_by, u.username AS author_username,
                n.created_at, c.claim_id AS public_claim_id
         FROM claim_notes n
         JOIN claims c ON c.id = n.claim_id
         LEFT JOIN users u ON u.id = n.created_by
         ORDER BY n.created_at DESC, n.id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(RecentNote {
                note: note_from_row(row)?,
                claim_id: row.try_get::<String, _>("public_claim_id")?,
            })
        })
        .collect()
}

pub async fn count_notes(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM claim_notes")
        .fetch_one(pool)
        .await
}

/// Number of notes per note type
pub async fn count_notes_by_type(pool: &SqlitePool) -> Result<Vec<(NoteType, i64)>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT note_type, COUNT(*) AS n FROM claim_notes GROUP BY note_type ORDER BY note_type",
    )
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| {
            Ok((
                parse_text_enum::<NoteType>(&row.try_get::<String, _>("note_type")?)?,
                row.try_get::<i64, _>("n")?,
            ))
        })
        .collect()
}
