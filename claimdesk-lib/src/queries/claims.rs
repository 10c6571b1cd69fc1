use super::{parse_decimal, parse_text_enum, store_decimal};
use crate::models::{Claim, ClaimStatus, NewClaim};
use crate::pagination::{self, Page};
use crate::search::ClaimFilter;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

const CLAIM_COLUMNS: &str = "id, claim_id, patient_name, billed_amount, paid_amount, status, insurer, discharge_date, cpt_codes, denial_reason, is_flagged, created_at, updated_at";

/// Bulk statements bind at most this many ids at once
const ID_CHUNK: usize = 500;

pub(crate) fn claim_from_row(row: &SqliteRow) -> Result<Claim, sqlx::Error> {
    Ok(Claim {
        id: row.try_get::<i64, _>("id")?,
        claim_id: row.try_get::<String, _>("claim_id")?,
        patient_name: row.try_get::<String, _>("patient_name")?,
        billed_amount: parse_decimal(&row.try_get::<String, _>("billed_amount")?)?,
        paid_amount: parse_decimal(&row.try_get::<String, _>("paid_amount")?)?,
        status: parse_text_enum::<ClaimStatus>(&row.try_get::<String, _>("status")?)?,
        insurer: row.try_get::<String, _>("insurer")?,
        discharge_date: row.try_get::<NaiveDate, _>("discharge_date")?,
        cpt_codes: row.try_get::<String, _>("cpt_codes")?,
        denial_reason: row.try_get::<Option<String>, _>("denial_reason")?,
        is_flagged: row.try_get::<bool, _>("is_flagged")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Count claims matching a filter
pub async fn count_claims(pool: &SqlitePool, filter: &ClaimFilter) -> Result<i64, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM claims");
    filter.push_conditions(&mut qb);
    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// List claims matching a filter, ordered by claim id ascending
pub async fn list_claims(
    pool: &SqlitePool,
    filter: &ClaimFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Claim>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM claims", CLAIM_COLUMNS));
    filter.push_conditions(&mut qb);
    qb.push(" ORDER BY claim_id ASC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(claim_from_row).collect()
}

/// Resolve the requested page for a filter and fetch it
pub async fn paginate_claims(
    pool: &SqlitePool,
    filter: &ClaimFilter,
    raw_page: Option<&str>,
    page_size: u32,
) -> Result<Page<Claim>, sqlx::Error> {
    let total = count_claims(pool, filter).await?;
    let number = pagination::resolve_page(raw_page, total, page_size);
    let items = list_claims(
        pool,
        filter,
        i64::from(page_size),
        pagination::offset(number, page_size),
    )
    .await?;

    Ok(Page {
        items,
        number,
        num_pages: pagination::num_pages(total, page_size),
        total,
        page_size,
    })
}

/// Find a claim by its public claim id
pub async fn find_claim_by_claim_id(
    pool: &SqlitePool,
    claim_id: &str,
) -> Result<Option<Claim>, sqlx::Error> {
    let sql = format!("SELECT {} FROM claims WHERE claim_id = ?", CLAIM_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(claim_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(claim_from_row).transpose()
}

/// Set the review flag to an explicit value; `None` when the claim does not exist
pub async fn set_claim_flag(
    pool: &SqlitePool,
    claim_id: &str,
    flagged: bool,
) -> Result<Option<Claim>, sqlx::Error> {
    let sql = format!(
        "UPDATE claims SET is_flagged = ?, updated_at = ? WHERE claim_id = ? RETURNING {}",
        CLAIM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(flagged)
        .bind(Utc::now())
        .bind(claim_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(claim_from_row).transpose()
}

/// Flip the review flag in a single statement
pub async fn toggle_claim_flag(
    pool: &SqlitePool,
    claim_id: &str,
) -> Result<Option<Claim>, sqlx::Error> {
    let sql = format!(
        "UPDATE claims SET is_flagged = NOT is_flagged, updated_at = ? WHERE claim_id = ? RETURNING {}",
        CLAIM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(Utc::now())
        .bind(claim_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(claim_from_row).transpose()
}

/// Insert a new claim and return it
pub async fn insert_claim(
    conn: &mut SqliteConnection,
    claim: &NewClaim,
) -> Result<Claim, sqlx::Error> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO claims (claim_id, patient_name, billed_amount, paid_amount, status, insurer, discharge_date, cpt_codes, denial_reason, is_flagged, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
         RETURNING {}",
        CLAIM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&claim.claim_id)
        .bind(&claim.patient_name)
        .bind(store_decimal(claim.billed_amount))
        .bind(store_decimal(claim.paid_amount))
        .bind(claim.status.as_str())
        .bind(&claim.insurer)
        .bind(claim.discharge_date)
        .bind(&claim.cpt_codes)
        .bind(&claim.denial_reason)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
    claim_from_row(&row)
}

/// Insert or fully overwrite a claim keyed by claim id; returns true when created
pub async fn upsert_claim(
    conn: &mut SqliteConnection,
    claim: &NewClaim,
) -> Result<bool, sqlx::Error> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM claims WHERE claim_id = ?")
        .bind(&claim.claim_id)
        .fetch_optional(&mut *conn)
        .await?;

    if exists.is_none() {
        insert_claim(conn, claim).await?;
        return Ok(true);
    }

    sqlx::query(
        "UPDATE claims SET patient_name = ?, billed_amount = ?, paid_amount = ?, status = ?, insurer = ?,
                discharge_date = ?, cpt_codes = ?, denial_reason = ?, updated_at = ?
         WHERE claim_id = ?",
    )
    .bind(&claim.patient_name)
    .bind(store_decimal(claim.billed_amount))
    .bind(store_decimal(claim.paid_amount))
    .bind(claim.status.as_str())
    .bind(&claim.insurer)
    .bind(claim.discharge_date)
    .bind(&claim.cpt_codes)
    .bind(&claim.denial_reason)
    .bind(Utc::now())
    .bind(&claim.claim_id)
    .execute(&mut *conn)
    .await?;
    Ok(false)
}

/// Update the detail columns of an existing claim; returns false when it does not exist
pub async fn update_claim_details(
    conn: &mut SqliteConnection,
    claim_id: &str,
    cpt_codes: Option<&str>,
    denial_reason: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE claims SET cpt_codes = COALESCE(?, cpt_codes), denial_reason = COALESCE(?, denial_reason), updated_at = ?
         WHERE claim_id = ?",
    )
    .bind(cpt_codes)
    .bind(denial_reason)
    .bind(Utc::now())
    .bind(claim_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Write back the mutable columns of a loaded claim
pub async fn update_claim_fields(
    conn: &mut SqliteConnection,
    claim: &Claim,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE claims SET patient_name = ?, billed_amount = ?, paid_amount = ?, status = ?, insurer = ?,
                cpt_codes = ?, denial_reason = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&claim.patient_name)
    .bind(store_decimal(claim.billed_amount))
    .bind(store_decimal(claim.paid_amount))
    .bind(claim.status.as_str())
    .bind(&claim.insurer)
    .bind(&claim.cpt_codes)
    .bind(&claim.denial_reason)
    .bind(Utc::now())
    .bind(claim.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Load every claim whose claim id is in `ids`
pub async fn find_claims_by_ids(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<Vec<Claim>, sqlx::Error> {
    let mut claims = Vec::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM claims WHERE claim_id IN (",
            CLAIM_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&mut *conn).await?;
        for row in &rows {
            claims.push(claim_from_row(row)?);
        }
    }
    Ok(claims)
}

/// Most recently created claims
pub async fn recent_claims(pool: &SqlitePool, limit: i64) -> Result<Vec<Claim>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM claims ORDER BY created_at DESC, id DESC LIMIT ?",
        CLAIM_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;
    rows.iter().map(claim_from_row).collect()
}

/// Billed and paid amount of every claim
pub async fn claim_amounts(pool: &SqlitePool) -> Result<Vec<(Decimal, Decimal)>, sqlx::Error> {
    let rows = sqlx::query("SELECT billed_amount, paid_amount FROM claims")
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| {
            Ok((
                parse_decimal(&row.try_get::<String, _>("billed_amount")?)?,
                parse_decimal(&row.try_get::<String, _>("paid_amount")?)?,
            ))
        })
        .collect()
}

pub async fn count_all_claims(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM claims")
        .fetch_one(pool)
        .await
}

pub async fn count_flagged_claims(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM claims WHERE is_flagged = 1")
        .fetch_one(pool)
        .await
}

/// Number of claims per status, most common first
pub async fn count_claims_by_status(
    pool: &SqlitePool,
) -> Result<Vec<(ClaimStatus, i64)>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM claims GROUP BY status ORDER BY n DESC, status ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| {
            Ok((
                parse_text_enum::<ClaimStatus>(&row.try_get::<String, _>("status")?)?,
                row.try_get::<i64, _>("n")?,
            ))
        })
        .collect()
}

/// Number of claims per insurer, most common first
pub async fn count_claims_by_insurer(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT insurer, COUNT(*) AS n FROM claims GROUP BY insurer ORDER BY n DESC, insurer ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| Ok((row.try_get::<String, _>("insurer")?, row.try_get::<i64, _>("n")?)))
        .collect()
}
