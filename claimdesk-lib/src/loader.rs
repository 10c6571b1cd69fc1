//! Bulk import of claims from CSV or JSON exports.
//!
//! Two row shapes are understood. "Main" rows carry `patient_name` and
//! describe a whole claim; "detail" rows only carry `claim_id` plus
//! `cpt_codes`/`denial_reason` and enrich claims that already exist.
//!
//! [`load_records`] upserts main rows and applies detail rows.
//! [`merge_csv_files`] is the admin upload path: every row is read as a
//! main row with `N/A` placeholders for missing values, new claims are
//! created and existing claims only get their placeholder fields filled.

use crate::models::{Claim, ClaimStatus, NewClaim};
use crate::queries::claims;
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Placeholder used for missing text values in merge uploads
pub const PLACEHOLDER: &str = "N/A";

/// Number of error messages kept in a summary
pub const MAX_ERROR_DETAILS: usize = 10;

const SNIFF_BYTES: usize = 1024;

/// One input row keyed by column name
pub type Record = HashMap<String, String>;

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(DataFormat::Csv),
            "json" => Ok(DataFormat::Json),
            _ => Err(format!("Invalid DataFormat variant: {}", s)),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFormat::Csv => write!(f, "csv"),
            DataFormat::Json => write!(f, "json"),
        }
    }
}

/// Outcome of a load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub created: usize,
    pub updated: usize,
    /// Rows that referenced unknown claims or changed nothing
    pub skipped: usize,
    pub errors: usize,
    /// First few error messages
    pub error_details: Vec<String>,
}

impl LoadSummary {
    fn record_error(&mut self, message: String) {
        warn!(%message, "row rejected");
        self.errors += 1;
        if self.error_details.len() < MAX_ERROR_DETAILS {
            self.error_details.push(message);
        }
    }

    fn absorb(&mut self, other: LoadSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        for message in other.error_details {
            if self.error_details.len() < MAX_ERROR_DETAILS {
                self.error_details.push(message);
            }
        }
        self.errors += other.errors;
    }
}

/// `|` when the first KiB mentions it, otherwise `,`
pub fn detect_delimiter(data: &[u8]) -> u8 {
    let sample = &data[..data.len().min(SNIFF_BYTES)];
    if sample.contains(&b'|') {
        b'|'
    } else {
        b','
    }
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data)
}

/// Parse delimited text into records
pub fn parse_csv(data: &[u8]) -> Result<Vec<Record>> {
    let data = strip_bom(data);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(data))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| "Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Failed to read CSV row {}", index + 1))?;
        let record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Parse a JSON array of objects into records
pub fn parse_json(data: &[u8]) -> Result<Vec<Record>> {
    let value: serde_json::Value =
        serde_json::from_slice(strip_bom(data)).with_context(|| "Invalid JSON document")?;
    let serde_json::Value::Array(items) = value else {
        bail!("JSON input must be an array of objects");
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let serde_json::Value::Object(map) = item else {
            bail!("JSON item {} is not an object", index + 1);
        };
        let record = map
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => String::new(),
                    serde_json::Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();
        records.push(record);
    }
    Ok(records)
}

fn field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_amount(raw: Option<&str>, column: &str) -> Result<Decimal, String> {
    match raw {
        None => Ok(Decimal::ZERO),
        Some(raw) => Decimal::from_str(&raw.replace(',', ""))
            .map(|d| d.round_dp(2))
            .map_err(|_| format!("invalid {} '{}'", column, raw)),
    }
}

fn parse_status(raw: Option<&str>) -> Result<ClaimStatus, String> {
    match raw {
        None => Ok(ClaimStatus::UnderReview),
        Some(raw) => {
            ClaimStatus::normalize(raw).ok_or_else(|| format!("invalid status '{}'", raw))
        }
    }
}

fn parse_discharge_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    raw.and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .unwrap_or(today)
}

fn check_claim_id(claim_id: &str) -> Result<(), String> {
    if claim_id.chars().count() > 20 {
        return Err(format!("claim id '{}' is longer than 20 characters", claim_id));
    }
    Ok(())
}

/// Build a claim from a main row
pub fn claim_from_main_row(record: &Record, today: NaiveDate) -> Result<NewClaim, String> {
    let claim_id = field(record, "id")
        .or_else(|| field(record, "claim_id"))
        .ok_or_else(|| "no claim id".to_string())?;
    check_claim_id(claim_id)?;

    Ok(NewClaim {
        claim_id: claim_id.to_string(),
        patient_name: field(record, "patient_name").unwrap_or_default().to_string(),
        billed_amount: parse_amount(field(record, "billed_amount"), "billed_amount")?,
        paid_amount: parse_amount(field(record, "paid_amount"), "paid_amount")?,
        status: parse_status(field(record, "status"))?,
        insurer: field(record, "insurer_name")
            .or_else(|| field(record, "insurer"))
            .unwrap_or_default()
            .to_string(),
        discharge_date: parse_discharge_date(field(record, "discharge_date"), today),
        cpt_codes: field(record, "cpt_codes").unwrap_or_default().to_string(),
        denial_reason: field(record, "denial_reason").map(str::to_string),
    })
}

/// Build a claim from an admin upload row, using placeholders for gaps
pub fn claim_from_upload_row(record: &Record, today: NaiveDate) -> Result<NewClaim, String> {
    let claim_id = field(record, "claim_id")
        .or_else(|| field(record, "id"))
        .ok_or_else(|| "No claim ID found".to_string())?;
    check_claim_id(claim_id)?;

    let text = |key: &str| field(record, key).unwrap_or(PLACEHOLDER).to_string();
    Ok(NewClaim {
        claim_id: claim_id.to_string(),
        patient_name: text("patient_name"),
        billed_amount: parse_amount(field(record, "billed_amount"), "billed_amount")?,
        paid_amount: parse_amount(field(record, "paid_amount"), "paid_amount")?,
        status: parse_status(field(record, "status"))?,
        insurer: text("insurer_name"),
        discharge_date: parse_discharge_date(field(record, "discharge_date"), today),
        cpt_codes: text("cpt_codes"),
        denial_reason: Some(text("denial_reason")),
    })
}

/// Fill placeholder fields of `existing` from `incoming`; true when anything changed
pub fn merge_placeholders(existing: &mut Claim, incoming: &NewClaim) -> bool {
    let mut changed = false;

    if incoming.patient_name != PLACEHOLDER && existing.patient_name == PLACEHOLDER {
        existing.patient_name = incoming.patient_name.clone();
        changed = true;
    }
    if !incoming.billed_amount.is_zero() && existing.billed_amount.is_zero() {
        existing.billed_amount = incoming.billed_amount;
        changed = true;
    }
    if !incoming.paid_amount.is_zero() && existing.paid_amount.is_zero() {
        existing.paid_amount = incoming.paid_amount;
        changed = true;
    }
    if incoming.status != ClaimStatus::UnderReview && existing.status == ClaimStatus::UnderReview {
        existing.status = incoming.status;
        changed = true;
    }
    if incoming.insurer != PLACEHOLDER && existing.insurer == PLACEHOLDER {
        existing.insurer = incoming.insurer.clone();
        changed = true;
    }
    if incoming.cpt_codes != PLACEHOLDER && existing.cpt_codes == PLACEHOLDER {
        existing.cpt_codes = incoming.cpt_codes.clone();
        changed = true;
    }
    let incoming_reason = incoming.denial_reason.as_deref().unwrap_or(PLACEHOLDER);
    if incoming_reason != PLACEHOLDER && existing.denial_reason.as_deref() == Some(PLACEHOLDER) {
        existing.denial_reason = Some(incoming_reason.to_string());
        changed = true;
    }

    changed
}

async fn apply_record(
    conn: &mut SqliteConnection,
    record: &Record,
    today: NaiveDate,
    summary: &mut LoadSummary,
    row_number: usize,
) -> Result<()> {
    if record.contains_key("patient_name") {
        let claim = match claim_from_main_row(record, today) {
            Ok(claim) => claim,
            Err(message) => {
                summary.record_error(format!("Row {}: {}", row_number, message));
                return Ok(());
            }
        };
        match claims::upsert_claim(conn, &claim).await {
            Ok(true) => {
                debug!(claim_id = %claim.claim_id, "created claim");
                summary.created += 1;
            }
            Ok(false) => {
                debug!(claim_id = %claim.claim_id, "updated claim");
                summary.updated += 1;
            }
            Err(e) => summary.record_error(format!("Row {}: {}", row_number, e)),
        }
        return Ok(());
    }

    let Some(claim_id) = field(record, "claim_id") else {
        summary.skipped += 1;
        return Ok(());
    };
    let cpt_codes = field(record, "cpt_codes");
    let denial_reason = field(record, "denial_reason").filter(|r| *r != PLACEHOLDER);

    let found = claims::update_claim_details(conn, claim_id, cpt_codes, denial_reason)
        .await
        .with_context(|| format!("Failed to update details of claim {}", claim_id))?;
    if found {
        summary.updated += 1;
    } else {
        debug!(%claim_id, "claim not found, skipping detail row");
        summary.skipped += 1;
    }
    Ok(())
}

/// Upsert main rows and apply detail rows inside one transaction
pub async fn load_records(pool: &SqlitePool, records: &[Record]) -> Result<LoadSummary> {
    let today = Utc::now().date_naive();
    let mut summary = LoadSummary::default();
    let mut tx = pool.begin().await?;

    for (index, record) in records.iter().enumerate() {
        apply_record(&mut tx, record, today, &mut summary, index + 1).await?;
    }

    tx.commit().await.with_context(|| "Failed to commit claim load")?;
    info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors,
        "claims loaded"
    );
    Ok(summary)
}

/// Read a CSV or JSON file and load it
pub async fn load_file(pool: &SqlitePool, path: &Path, format: DataFormat) -> Result<LoadSummary> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read data file: {}", path.display()))?;
    let records = match format {
        DataFormat::Csv => parse_csv(&data)?,
        DataFormat::Json => parse_json(&data)?,
    };
    info!(path = %path.display(), %format, rows = records.len(), "loading claims");
    load_records(pool, &records).await
}

async fn merge_records(
    conn: &mut SqliteConnection,
    label: &str,
    records: &[Record],
    today: NaiveDate,
) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();
    let mut parsed = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match claim_from_upload_row(record, today) {
            Ok(claim) => parsed.push(claim),
            Err(message) => {
                summary.record_error(format!("{} row {}: {}", label, index + 1, message))
            }
        }
    }

    let ids: Vec<String> = parsed.iter().map(|c| c.claim_id.clone()).collect();
    let mut existing: HashMap<String, Claim> = claims::find_claims_by_ids(conn, &ids)
        .await?
        .into_iter()
        .map(|claim| (claim.claim_id.clone(), claim))
        .collect();

    for incoming in &parsed {
        match existing.get_mut(&incoming.claim_id) {
            Some(claim) => {
                if merge_placeholders(claim, incoming) {
                    claims::update_claim_fields(conn, claim).await?;
                    summary.updated += 1;
                } else {
                    summary.skipped += 1;
                }
            }
            None => {
                let created = claims::insert_claim(conn, incoming)
                    .await
                    .with_context(|| format!("Failed to create claim {}", incoming.claim_id))?;
                existing.insert(created.claim_id.clone(), created);
                summary.created += 1;
            }
        }
    }

    Ok(summary)
}

/// Merge uploaded CSV files (name, contents) into the claims table
pub async fn merge_csv_files(pool: &SqlitePool, files: &[(String, Vec<u8>)]) -> Result<LoadSummary> {
    let today = Utc::now().date_naive();
    let mut total = LoadSummary::default();
    let mut tx = pool.begin().await?;

    for (name, data) in files {
        let records = parse_csv(data).with_context(|| format!("Failed to parse {}", name))?;
        let summary = merge_records(&mut tx, name, &records, today).await?;
        info!(
            file = %name,
            created = summary.created,
            updated = summary.updated,
            errors = summary.errors,
            "csv merged"
        );
        total.absorb(summary);
    }

    tx.commit().await.with_context(|| "Failed to commit CSV upload")?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_connection::DatabaseConnection;

    const MAIN_CSV: &str = "id|patient_name|billed_amount|paid_amount|status|insurer_name|discharge_date\n\
30001|Virginia Rhodes|1200.50|200.25|Denied|United Healthcare|2024-03-01\n\
30002|Tom Baker|500|500|Paid|Aetna|not-a-date\n";

    const DETAIL_CSV: &str = "claim_id,denial_reason,cpt_codes\n\
30001,Missing documentation,\"99213,82947\"\n\
30002,N/A,99214\n\
99999,Whatever,11111\n";

    async fn pool() -> SqlitePool {
        DatabaseConnection::open_and_migrate("sqlite::memory:")
            .await
            .unwrap()
            .into_pool()
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(b"a|b|c\n1|2|3"), b'|');
        assert_eq!(detect_delimiter(b"a,b,c\n1,2,3"), b',');
        let mut late_pipe = vec![b'a'; 2000];
        late_pipe.push(b'|');
        assert_eq!(detect_delimiter(&late_pipe), b',');
    }

    #[test]
    fn test_parse_csv_and_json() {
        let records = parse_csv(MAIN_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["patient_name"], "Virginia Rhodes");

        let records = parse_json(br#"[{"id": 30003, "patient_name": "Ann", "billed_amount": 10.5, "denial_reason": null}]"#).unwrap();
        assert_eq!(records[0]["id"], "30003");
        assert_eq!(records[0]["billed_amount"], "10.5");
        assert_eq!(records[0]["denial_reason"], "");

        assert!(parse_json(br#"{"id": 1}"#).is_err());
    }

    #[test]
    fn test_main_row_defaults() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let claim = claim_from_main_row(
            &record(&[("id", "1"), ("patient_name", "Ann"), ("status", "Under Review")]),
            today,
        )
        .unwrap();
        assert_eq!(claim.status, ClaimStatus::UnderReview);
        assert_eq!(claim.discharge_date, today);
        assert_eq!(claim.billed_amount, Decimal::ZERO);
        assert_eq!(claim.denial_reason, None);

        assert!(claim_from_main_row(&record(&[("patient_name", "Ann")]), today).is_err());
        assert!(claim_from_main_row(
            &record(&[("id", "1"), ("patient_name", "Ann"), ("status", "lost")]),
            today
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_load_main_then_detail() {
        let pool = pool().await;

        let summary = load_records(&pool, &parse_csv(MAIN_CSV.as_bytes()).unwrap())
            .await
            .unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(summary.errors, 0);

        let summary = load_records(&pool, &parse_csv(DETAIL_CSV.as_bytes()).unwrap())
            .await
            .unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.skipped, 1);

        let first = claims::find_claim_by_claim_id(&pool, "30001").await.unwrap().unwrap();
        assert_eq!(first.status, ClaimStatus::Denied);
        assert_eq!(first.cpt_codes, "99213,82947");
        assert_eq!(first.denial_reason.as_deref(), Some("Missing documentation"));
        assert_eq!(first.billed_amount, Decimal::from_str("1200.50").unwrap());

        let second = claims::find_claim_by_claim_id(&pool, "30002").await.unwrap().unwrap();
        assert_eq!(second.denial_reason, None);
        assert_eq!(second.discharge_date, Utc::now().date_naive());

        let summary = load_records(&pool, &parse_csv(MAIN_CSV.as_bytes()).unwrap())
            .await
            .unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.updated, 2);
    }

    #[tokio::test]
    async fn test_merge_fills_only_placeholders() {
        let pool = pool().await;
        let first = b"claim_id,patient_name,billed_amount,status\n\
40001,,0,\n\
40002,Known Name,100,paid\n\
,Orphan,1,\n"
            .to_vec();
        let summary = merge_csv_files(&pool, &[("first.csv".to_string(), first)])
            .await
            .unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(summary.errors, 1);
        assert!(summary.error_details[0].contains("No claim ID found"));

        let placeholder = claims::find_claim_by_claim_id(&pool, "40001").await.unwrap().unwrap();
        assert_eq!(placeholder.patient_name, PLACEHOLDER);
        assert_eq!(placeholder.denial_reason.as_deref(), Some(PLACEHOLDER));

        let second = b"claim_id|patient_name|billed_amount|status|denial_reason\n\
40001|Filled Later|250|denied|Late filing\n\
40002|Other Name|999|denied|Ignored\n"
            .to_vec();
        let summary = merge_csv_files(&pool, &[("second.csv".to_string(), second)])
            .await
            .unwrap();
        assert_eq!(summary.updated, 2);

        let filled = claims::find_claim_by_claim_id(&pool, "40001").await.unwrap().unwrap();
        assert_eq!(filled.patient_name, "Filled Later");
        assert_eq!(filled.billed_amount, Decimal::from(250));
        assert_eq!(filled.status, ClaimStatus::Denied);
        assert_eq!(filled.denial_reason.as_deref(), Some("Late filing"));

        let kept = claims::find_claim_by_claim_id(&pool, "40002").await.unwrap().unwrap();
        assert_eq!(kept.patient_name, "Known Name");
        assert_eq!(kept.billed_amount, Decimal::from(100));
        assert_eq!(kept.status, ClaimStatus::Paid);
        assert_eq!(kept.denial_reason.as_deref(), Some("Ignored"));
    }
}
