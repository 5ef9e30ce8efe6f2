//! Dispute crowdsourcer lifecycle: creation, contributions, completion.

use ethers::types::{Address, U256};
use serde_json::json;
use sqlx::Row;
use tracing::{debug, warn};

use super::{assigned, first_failure, Assigned};
use crate::error::{Error, Result};
use crate::market::{advance_state, rollback_state, update_rounds_completed};
use crate::payout::{insert_payout, update_tentative_winning};
use crate::state::AppState;
use crate::store::{active_fee_window, parse_u256, Db};
use crate::types::{
    hex_id, CrowdsourcerCompleted, CrowdsourcerContribution, CrowdsourcerCreated, EventLog,
};

pub async fn created(state: &AppState, log: &EventLog, ev: &CrowdsourcerCreated) -> Result<Assigned> {
    let db = &state.db;
    let crowdsourcer_id = hex_id(ev.dispute_crowdsourcer);
    let market_id = hex_id(ev.market);

    let payout_id = insert_payout(db, ev.market, &ev.payout_numerators, ev.invalid).await?;

    let fee_window = active_fee_window(db, ev.universe).await?.ok_or_else(|| {
        Error::MissingDependency(format!(
            "could not retrieve fee window for crowdsourcer {crowdsourcer_id}"
        ))
    })?;

    let tx_hash = log.tx_hash();
    sqlx::query(
        r#"
        INSERT INTO crowdsourcers
        (crowdsourcer_id, market_id, fee_window, payout_id, size, amount_staked, completed,
         block_number, transaction_hash, log_index)
        VALUES (?, ?, ?, ?, ?, '0', NULL, ?, ?, ?)
        "#,
    )
    .bind(&crowdsourcer_id)
    .bind(&market_id)
    .bind(&fee_window)
    .bind(payout_id)
    .bind(ev.size.to_string())
    .bind(log.block_number as i64)
    .bind(&tx_hash)
    .bind(log.log_index as i64)
    .execute(db)
    .await
    .map_err(|e| Error::on_insert(e, "crowdsourcers", &tx_hash, log.log_index))?;

    debug!(crowdsourcer = %crowdsourcer_id, market = %market_id, payout_id, %fee_window, "crowdsourcer created");

    Ok(assigned(json!({
        "crowdsourcerId": crowdsourcer_id,
        "marketId": market_id,
        "feeWindow": fee_window,
        "payoutId": payout_id,
        "size": ev.size.to_string(),
        "amountStaked": "0",
        "completed": null,
    })))
}

/// Drops the round row. The payout stays; other rounds may point at it.
pub async fn created_removal(state: &AppState, ev: &CrowdsourcerCreated) -> Result<Assigned> {
    let crowdsourcer_id = hex_id(ev.dispute_crowdsourcer);
    let res = sqlx::query("DELETE FROM crowdsourcers WHERE crowdsourcer_id = ?")
        .bind(&crowdsourcer_id)
        .execute(&state.db)
        .await?;

    if res.rows_affected() == 0 {
        warn!(crowdsourcer = %crowdsourcer_id, "retracted creation of unknown crowdsourcer");
    }

    Ok(assigned(json!({ "marketId": hex_id(ev.market) })))
}

pub async fn contribution(
    state: &AppState,
    log: &EventLog,
    ev: &CrowdsourcerContribution,
) -> Result<Assigned> {
    let db = &state.db;
    let crowdsourcer_id = hex_id(ev.dispute_crowdsourcer);

    let staked = amount_staked(db, ev.dispute_crowdsourcer).await?;
    let next = staked.checked_add(ev.amount_staked).ok_or_else(|| {
        Error::Overflow(format!("stake of crowdsourcer {crowdsourcer_id}"))
    })?;

    let tx_hash = log.tx_hash();
    sqlx::query(
        r#"
        INSERT INTO disputes
        (transaction_hash, log_index, block_number, reporter, crowdsourcer_id, amount_staked)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx_hash)
    .bind(log.log_index as i64)
    .bind(log.block_number as i64)
    .bind(hex_id(ev.reporter))
    .bind(&crowdsourcer_id)
    .bind(ev.amount_staked.to_string())
    .execute(db)
    .await
    .map_err(|e| Error::on_insert(e, "disputes", &tx_hash, log.log_index))?;

    set_amount_staked(db, ev.dispute_crowdsourcer, next).await?;

    Ok(assigned(json!({
        "marketId": hex_id(ev.market),
        "reporter": hex_id(ev.reporter),
        "crowdsourcerId": crowdsourcer_id,
        "amountStaked": ev.amount_staked.to_string(),
    })))
}

/// Removes the contribution identified by (transaction hash, log index) and
/// takes its amount back off the round. Refuses without writing if the row is
/// absent or the stake would go negative.
pub async fn contribution_removal(
    state: &AppState,
    log: &EventLog,
    ev: &CrowdsourcerContribution,
) -> Result<Assigned> {
    let db = &state.db;
    let crowdsourcer_id = hex_id(ev.dispute_crowdsourcer);
    let tx_hash = log.tx_hash();

    let existing = sqlx::query("SELECT 1 FROM disputes WHERE transaction_hash = ? AND log_index = ?")
        .bind(&tx_hash)
        .bind(log.log_index as i64)
        .fetch_optional(db)
        .await?;
    if existing.is_none() {
        return Err(Error::NotFound {
            table: "disputes",
            transaction_hash: tx_hash,
            log_index: log.log_index,
        });
    }

    let staked = amount_staked(db, ev.dispute_crowdsourcer).await?;
    let next = staked.checked_sub(ev.amount_staked).ok_or_else(|| Error::NegativeStake {
        crowdsourcer: crowdsourcer_id.clone(),
        staked: staked.to_string(),
        amount: ev.amount_staked.to_string(),
    })?;

    sqlx::query("DELETE FROM disputes WHERE transaction_hash = ? AND log_index = ?")
        .bind(&tx_hash)
        .bind(log.log_index as i64)
        .execute(db)
        .await?;

    set_amount_staked(db, ev.dispute_crowdsourcer, next).await?;

    Ok(assigned(json!({ "marketId": hex_id(ev.market) })))
}

pub async fn completed(state: &AppState, log: &EventLog, ev: &CrowdsourcerCompleted) -> Result<Assigned> {
    let db = &state.db;
    set_completed(db, ev.dispute_crowdsourcer, Some(true)).await?;

    let (state_res, payout_res, rounds_res) = tokio::join!(
        advance_state(db, ev.market, log.block_number, state.constants.awaiting_next_window),
        update_tentative_winning(db, ev.market),
        update_rounds_completed(db, ev.market),
    );
    first_failure([state_res, payout_res, rounds_res])?;

    Ok(assigned(json!({ "marketId": hex_id(ev.market) })))
}

/// Reopens the round and puts the market back into the dispute state.
pub async fn completed_removal(state: &AppState, ev: &CrowdsourcerCompleted) -> Result<Assigned> {
    let db = &state.db;
    set_completed(db, ev.dispute_crowdsourcer, None).await?;

    let (state_res, payout_res, rounds_res) = tokio::join!(
        rollback_state(db, ev.market, state.constants.crowdsourcing_dispute),
        update_tentative_winning(db, ev.market),
        update_rounds_completed(db, ev.market),
    );
    first_failure([state_res, payout_res, rounds_res])?;

    Ok(assigned(json!({ "marketId": hex_id(ev.market) })))
}

pub async fn amount_staked(db: &Db, crowdsourcer: Address) -> Result<U256> {
    let crowdsourcer_id = hex_id(crowdsourcer);
    let row = sqlx::query("SELECT amount_staked FROM crowdsourcers WHERE crowdsourcer_id = ?")
        .bind(&crowdsourcer_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| {
            Error::MissingDependency(format!("crowdsourcer {crowdsourcer_id} is not mirrored"))
        })?;

    parse_u256("amount_staked", row.get::<&str, _>("amount_staked"))
}

async fn set_amount_staked(db: &Db, crowdsourcer: Address, amount: U256) -> Result<()> {
    sqlx::query("UPDATE crowdsourcers SET amount_staked = ? WHERE crowdsourcer_id = ?")
        .bind(amount.to_string())
        .bind(hex_id(crowdsourcer))
        .execute(db)
        .await?;
    Ok(())
}

async fn set_completed(db: &Db, crowdsourcer: Address, completed: Option<bool>) -> Result<()> {
    let crowdsourcer_id = hex_id(crowdsourcer);
    let res = sqlx::query("UPDATE crowdsourcers SET completed = ? WHERE crowdsourcer_id = ?")
        .bind(completed)
        .bind(&crowdsourcer_id)
        .execute(db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(Error::MissingDependency(format!(
            "crowdsourcer {crowdsourcer_id} is not mirrored"
        )));
    }
    Ok(())
}
