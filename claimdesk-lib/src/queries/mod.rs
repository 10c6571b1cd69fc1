//! Typed database access, one async function per statement.
//!
//! Functions take a `&SqlitePool` (or a `&mut SqliteConnection` when they
//! must run inside a caller's transaction) and return `sqlx::Error` so
//! callers decide how failures surface.

pub mod claims;
pub mod notes;
pub mod profiles;
pub mod sessions;
pub mod users;

use rust_decimal::Decimal;
use std::str::FromStr;

pub(crate) fn decode_error<E>(err: E) -> sqlx::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    sqlx::Error::Decode(err.into())
}

/// Parse a decimal stored as text
pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw.trim())
        .map_err(|e| decode_error(format!("invalid decimal '{}': {}", raw, e)))
}

/// Canonical text form for storing money (two decimal places)
pub(crate) fn store_decimal(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

/// Parse an enum stored as text through its `FromStr`
pub(crate) fn parse_text_enum<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(decode_error)
}
