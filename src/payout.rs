//! Candidate outcomes per market and the tentative-winner recomputation.

use std::collections::BTreeMap;

use ethers::types::{Address, U256};
use sqlx::Row;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{parse_u256, Db};
use crate::types::hex_id;

/// Returns the payout id for (market, numerators, invalid), inserting it on
/// first sight. Payouts are never deleted.
pub async fn insert_payout(
    db: &Db,
    market: Address,
    numerators: &[U256],
    invalid: bool,
) -> Result<i64> {
    let market_id = hex_id(market);
    let key = numerator_key(numerators)?;

    sqlx::query(
        r#"
        INSERT INTO payouts (market_id, numerators, is_invalid, tentative_winning)
        VALUES (?, ?, ?, 0)
        ON CONFLICT (market_id, numerators, is_invalid) DO NOTHING
        "#,
    )
    .bind(&market_id)
    .bind(&key)
    .bind(invalid)
    .execute(db)
    .await?;

    let row = sqlx::query(
        "SELECT payout_id FROM payouts WHERE market_id = ? AND numerators = ? AND is_invalid = ?",
    )
    .bind(&market_id)
    .bind(&key)
    .bind(invalid)
    .fetch_one(db)
    .await?;

    Ok(row.get("payout_id"))
}

fn numerator_key(numerators: &[U256]) -> Result<String> {
    let decimal: Vec<String> = numerators.iter().map(U256::to_string).collect();
    serde_json::to_string(&decimal).map_err(Error::from)
}

/// Payout with the most stake across completed rounds and the initial report.
///
/// Ties go to the lowest payout id.
pub async fn leading_payout(db: &Db, market: Address) -> Result<Option<(i64, U256)>> {
    let market_id = hex_id(market);
    let rows = sqlx::query(
        r#"
        SELECT payout_id, amount_staked FROM crowdsourcers
        WHERE market_id = ? AND completed = 1
        UNION ALL
        SELECT payout_id, amount_staked FROM initial_reports
        WHERE market_id = ?
        "#,
    )
    .bind(&market_id)
    .bind(&market_id)
    .fetch_all(db)
    .await?;

    let mut totals: BTreeMap<i64, U256> = BTreeMap::new();
    for row in rows {
        let payout_id: i64 = row.get("payout_id");
        let staked = parse_u256("amount_staked", row.get::<&str, _>("amount_staked"))?;
        let total = totals.entry(payout_id).or_default();
        *total = total
            .checked_add(staked)
            .ok_or_else(|| Error::Overflow(format!("stake total for payout {payout_id}")))?;
    }

    // BTreeMap iterates ascending, so keeping the first maximum keeps the lowest id.
    let mut leader: Option<(i64, U256)> = None;
    for (payout_id, total) in totals {
        if leader.map_or(true, |(_, best)| total > best) {
            leader = Some((payout_id, total));
        }
    }
    Ok(leader)
}

/// Marks the leading payout tentative-winning and clears every other payout
/// of the market, in one statement.
pub async fn update_tentative_winning(db: &Db, market: Address) -> Result<()> {
    let leader = leading_payout(db, market).await?;
    let leader_id = leader.map(|(id, _)| id);

    sqlx::query(
        r#"
        UPDATE payouts
        SET tentative_winning = CASE WHEN payout_id IS ? THEN 1 ELSE 0 END
        WHERE market_id = ?
        "#,
    )
    .bind(leader_id)
    .bind(hex_id(market))
    .execute(db)
    .await?;

    debug!(market = %hex_id(market), leader = ?leader_id, "tentative winning payout updated");
    Ok(())
}

/// Payout ids currently flagged tentative-winning for `market`.
pub async fn tentative_winners(db: &Db, market: Address) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT payout_id FROM payouts WHERE market_id = ? AND tentative_winning = 1 ORDER BY payout_id",
    )
    .bind(hex_id(market))
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|r| r.get::<i64, _>("payout_id")).collect())
}
