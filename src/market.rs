//! Reporting-state transitions and the completed-rounds counter.
//!
//! No transition table is enforced and no history is kept. Whoever calls
//! [`rollback_state`] must pass the state the market held before the matching
//! [`advance_state`], which only holds if retractions arrive in exact reverse
//! order of their applies.

use ethers::types::Address;
use sqlx::Row;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::Db;
use crate::types::{hex_id, ReportingState};

pub async fn advance_state(
    db: &Db,
    market: Address,
    block_number: u64,
    state: ReportingState,
) -> Result<()> {
    set_state(db, market, state).await?;
    debug!(market = %hex_id(market), block_number, %state, "market state advanced");
    Ok(())
}

pub async fn rollback_state(db: &Db, market: Address, prior: ReportingState) -> Result<()> {
    set_state(db, market, prior).await?;
    debug!(market = %hex_id(market), %prior, "market state rolled back");
    Ok(())
}

async fn set_state(db: &Db, market: Address, state: ReportingState) -> Result<()> {
    let market_id = hex_id(market);
    let res = sqlx::query("UPDATE markets SET reporting_state = ? WHERE market_id = ?")
        .bind(state.as_str())
        .bind(&market_id)
        .execute(db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(Error::MissingDependency(format!("market {market_id} is not mirrored")));
    }
    Ok(())
}

pub async fn reporting_state(db: &Db, market: Address) -> Result<ReportingState> {
    let market_id = hex_id(market);
    let row = sqlx::query("SELECT reporting_state FROM markets WHERE market_id = ?")
        .bind(&market_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::MissingDependency(format!("market {market_id} is not mirrored")))?;

    let text: String = row.get("reporting_state");
    text.parse()
        .map_err(|e: String| Error::Store(sqlx::Error::Decode(e.into())))
}

/// Recounts completed rounds from `crowdsourcers`. Idempotent.
pub async fn update_rounds_completed(db: &Db, market: Address) -> Result<()> {
    let market_id = hex_id(market);
    sqlx::query(
        r#"
        UPDATE markets
        SET reporting_rounds_completed = (
            SELECT COUNT(*) FROM crowdsourcers
            WHERE market_id = ? AND completed = 1
        )
        WHERE market_id = ?
        "#,
    )
    .bind(&market_id)
    .bind(&market_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn rounds_completed(db: &Db, market: Address) -> Result<i64> {
    let row = sqlx::query("SELECT reporting_rounds_completed FROM markets WHERE market_id = ?")
        .bind(hex_id(market))
        .fetch_one(db)
        .await?;
    Ok(row.get("reporting_rounds_completed"))
}
