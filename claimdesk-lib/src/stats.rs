use crate::models::{Claim, ClaimStatus, NoteType};
use crate::queries::notes::RecentNote;
use crate::queries::users::UserCounts;
use crate::queries::{claims, notes, users};
use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::SqlitePool;

/// Share of claims in one status
#[derive(Debug, Clone, PartialEq)]
pub struct StatusShare {
    pub status: ClaimStatus,
    pub count: i64,
    /// Percent of all claims, one decimal place
    pub percentage: Decimal,
}

#[derive(Debug, Clone)]
pub struct DashboardStats {
    pub total_claims: i64,
    pub flagged_claims: i64,
    pub avg_underpayment: Decimal,
    pub total_underpayment: Decimal,
    pub status_stats: Vec<StatusShare>,
    pub recent_notes: Vec<RecentNote>,
    pub recent_claims: Vec<Claim>,
    pub users: UserCounts,
}

#[derive(Debug, Clone)]
pub struct SystemStats {
    pub total_claims: i64,
    pub flagged_claims: i64,
    pub by_status: Vec<(ClaimStatus, i64)>,
    /// Ten most common insurers
    pub by_insurer: Vec<(String, i64)>,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    pub avg_claim_amount: Decimal,
    pub users: UserCounts,
    pub total_notes: i64,
    pub notes_by_type: Vec<(NoteType, i64)>,
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Average and total of the positive underpayments over claims with a
/// non-zero billed amount
pub fn underpayment_summary(amounts: &[(Decimal, Decimal)]) -> (Decimal, Decimal) {
    let underpayments: Vec<Decimal> = amounts
        .iter()
        .filter(|(billed, _)| !billed.is_zero())
        .map(|(billed, paid)| billed - paid)
        .filter(|under| *under > Decimal::ZERO)
        .collect();

    let total: Decimal = underpayments.iter().sum();
    let avg = if underpayments.is_empty() {
        Decimal::ZERO
    } else {
        round_money(total / Decimal::from(underpayments.len()))
    };
    (avg, total)
}

/// Attach percentages to per-status counts
pub fn status_shares(counts: &[(ClaimStatus, i64)], total: i64) -> Vec<StatusShare> {
    counts
        .iter()
        .map(|(status, count)| {
            let percentage = if total > 0 {
                (Decimal::from(*count) * Decimal::ONE_HUNDRED / Decimal::from(total))
                    .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
            } else {
                Decimal::ZERO
            };
            StatusShare {
                status: *status,
                count: *count,
                percentage,
            }
        })
        .collect()
}

/// Figures for the staff dashboard
pub async fn dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats> {
    let total_claims = claims::count_all_claims(pool).await?;
    let flagged_claims = claims::count_flagged_claims(pool).await?;
    let amounts = claims::claim_amounts(pool)
        .await
        .with_context(|| "Failed to load claim amounts")?;
    let (avg_underpayment, total_underpayment) = underpayment_summary(&amounts);
    let by_status = claims::count_claims_by_status(pool).await?;

    Ok(DashboardStats {
        total_claims,
        flagged_claims,
        avg_underpayment,
        total_underpayment,
        status_stats: status_shares(&by_status, total_claims),
        recent_notes: notes::recent_notes(pool, 10).await?,
        recent_claims: claims::recent_claims(pool, 5).await?,
        users: users::count_users(pool).await?,
    })
}

/// Detailed statistics page
pub async fn system_stats(pool: &SqlitePool) -> Result<SystemStats> {
    let amounts = claims::claim_amounts(pool)
        .await
        .with_context(|| "Failed to load claim amounts")?;
    let total_billed: Decimal = amounts.iter().map(|(billed, _)| *billed).sum();
    let total_paid: Decimal = amounts.iter().map(|(_, paid)| *paid).sum();
    let avg_claim_amount = if amounts.is_empty() {
        Decimal::ZERO
    } else {
        round_money(total_billed / Decimal::from(amounts.len()))
    };

    Ok(SystemStats {
        total_claims: claims::count_all_claims(pool).await?,
        flagged_claims: claims::count_flagged_claims(pool).await?,
        by_status: claims::count_claims_by_status(pool).await?,
        by_insurer: claims::count_claims_by_insurer(pool, 10).await?,
        total_billed,
        total_paid,
        avg_claim_amount,
        users: users::count_users(pool).await?,
        total_notes: notes::count_notes(pool).await?,
        notes_by_type: notes::count_notes_by_type(pool).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_underpayment_summary_ignores_zero_billed_and_overpaid() {
        let amounts = vec![
            (d("100"), d("40")),
            (d("200"), d("100")),
            (d("0"), d("0")),
            (d("50"), d("80")),
        ];
        let (avg, total) = underpayment_summary(&amounts);
        assert_eq!(total, d("160"));
        assert_eq!(avg, d("80"));
        assert_eq!(underpayment_summary(&[]), (Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn test_status_shares_round_to_one_decimal() {
        let shares = status_shares(
            &[(ClaimStatus::Paid, 2), (ClaimStatus::Denied, 1)],
            3,
        );
        assert_eq!(shares[0].percentage, d("66.7"));
        assert_eq!(shares[1].percentage, d("33.3"));
        assert!(status_shares(&[(ClaimStatus::Paid, 0)], 0)[0].percentage.is_zero());
    }
}
