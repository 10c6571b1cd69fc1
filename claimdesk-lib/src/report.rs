use crate::models::{Claim, ClaimNote, User};
use crate::queries::{claims, notes};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::SqlitePool;

/// Everything shown on a printable claim report
#[derive(Debug, Clone)]
pub struct ClaimReport {
    pub claim: Claim,
    /// Oldest first
    pub notes: Vec<ClaimNote>,
    pub underpayment: Decimal,
    pub underpayment_percentage: Decimal,
    pub cpt_codes: Vec<String>,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

/// Underpayment as a share of the billed amount, 0 when nothing was billed
pub fn underpayment_percentage(billed: Decimal, paid: Decimal) -> Decimal {
    if billed <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((billed - paid) / billed * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// File name offered when the report is requested for printing
pub fn report_filename(claim_id: &str) -> String {
    format!("claim_{}_report.html", claim_id)
}

/// Assemble the report for a claim; `None` when the claim does not exist
pub async fn build_report(
    pool: &SqlitePool,
    claim_id: &str,
    requested_by: &User,
) -> Result<Option<ClaimReport>> {
    let Some(claim) = claims::find_claim_by_claim_id(pool, claim_id)
        .await
        .with_context(|| format!("Failed to load claim {}", claim_id))?
    else {
        return Ok(None);
    };
    let notes = notes::list_notes_for_claim(pool, claim.id, false)
        .await
        .with_context(|| format!("Failed to load notes of claim {}", claim_id))?;

    Ok(Some(ClaimReport {
        underpayment: claim.underpayment(),
        underpayment_percentage: underpayment_percentage(claim.billed_amount, claim.paid_amount),
        cpt_codes: claim.cpt_code_list(),
        generated_by: requested_by.display_name(),
        generated_at: Utc::now(),
        notes,
        claim,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_underpayment_percentage() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert_eq!(underpayment_percentage(d("1000"), d("250")), d("75"));
        assert_eq!(underpayment_percentage(d("300"), d("200")), d("33.33"));
        assert_eq!(underpayment_percentage(d("100"), d("150")), d("-50"));
        assert_eq!(underpayment_percentage(Decimal::ZERO, d("10")), Decimal::ZERO);
        assert_eq!(underpayment_percentage(d("-5"), d("0")), Decimal::ZERO);
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(report_filename("30001"), "claim_30001_report.html");
    }
}
