//! Append-only record of stake redeemed from resolved crowdsourcers.

use serde_json::json;
use tracing::debug;

use super::{assigned, Assigned};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::types::{hex_id, CrowdsourcerRedeemed, EventLog};

pub async fn record(state: &AppState, log: &EventLog, ev: &CrowdsourcerRedeemed) -> Result<Assigned> {
    let tx_hash = log.tx_hash();
    let crowdsourcer = hex_id(ev.dispute_crowdsourcer);

    sqlx::query(
        r#"
        INSERT INTO crowdsourcer_redeemed
        (transaction_hash, log_index, block_number, reporter, crowdsourcer,
         amount_redeemed, rep_received, reporting_fees_received)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx_hash)
    .bind(log.log_index as i64)
    .bind(log.block_number as i64)
    .bind(hex_id(ev.reporter))
    .bind(&crowdsourcer)
    .bind(ev.amount_redeemed.to_string())
    .bind(ev.rep_received.to_string())
    .bind(ev.reporting_fees_received.to_string())
    .execute(&state.db)
    .await
    .map_err(|e| Error::on_insert(e, "crowdsourcer_redeemed", &tx_hash, log.log_index))?;

    debug!(%crowdsourcer, reporter = %hex_id(ev.reporter), "redemption recorded");
    Ok(assigned(json!({ "marketId": hex_id(ev.market) })))
}

pub async fn unrecord(state: &AppState, log: &EventLog) -> Result<Assigned> {
    let tx_hash = log.tx_hash();
    let res = sqlx::query(
        "DELETE FROM crowdsourcer_redeemed WHERE transaction_hash = ? AND log_index = ?",
    )
    .bind(&tx_hash)
    .bind(log.log_index as i64)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(Error::NotFound {
            table: "crowdsourcer_redeemed",
            transaction_hash: tx_hash,
            log_index: log.log_index,
        });
    }
    Ok(Assigned::new())
}
