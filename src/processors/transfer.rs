//! Token transfers and the balance ledger they drive.

use ethers::types::{Address, I256, U256};
use serde_json::json;
use tracing::{debug, error};

use super::{assigned, first_failure, Assigned};
use crate::config::FailurePolicy;
use crate::error::{Error, Result};
use crate::ledger::{decrease_balance, increase_balance};
use crate::state::AppState;
use crate::store::Db;
use crate::types::{hex_id, EventLog, TokenType, TokensTransferred};

pub async fn transferred(state: &AppState, log: &EventLog, ev: &TokensTransferred) -> Result<Assigned> {
    let db = &state.db;
    let tx_hash = log.tx_hash();

    sqlx::query(
        r#"
        INSERT INTO transfers
        (transaction_hash, log_index, block_number, sender, recipient, token, value)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx_hash)
    .bind(log.log_index as i64)
    .bind(log.block_number as i64)
    .bind(hex_id(ev.from))
    .bind(hex_id(ev.to))
    .bind(hex_id(ev.token))
    .bind(ev.value.to_string())
    .execute(db)
    .await
    .map_err(|e| Error::on_insert(e, "transfers", &tx_hash, log.log_index))?;

    let results = move_balance(db, ev.token, ev.from, ev.to, ev.value).await;
    settle_balances(state.transfer_policy.apply_balances, log, results)?;

    settle_shares(state, ev).await?;

    Ok(assigned(json!({
        "sender": hex_id(ev.from),
        "recipient": hex_id(ev.to),
        "token": hex_id(ev.token),
        "value": ev.value.to_string(),
    })))
}

/// Mirror of [`transferred`]: the row goes and both balances move back.
pub async fn transferred_removal(
    state: &AppState,
    log: &EventLog,
    ev: &TokensTransferred,
) -> Result<Assigned> {
    let db = &state.db;
    let tx_hash = log.tx_hash();

    let res = sqlx::query("DELETE FROM transfers WHERE transaction_hash = ? AND log_index = ?")
        .bind(&tx_hash)
        .bind(log.log_index as i64)
        .execute(db)
        .await?;

    if res.rows_affected() == 0 {
        return Err(Error::NotFound {
            table: "transfers",
            transaction_hash: tx_hash,
            log_index: log.log_index,
        });
    }

    let results = move_balance(db, ev.token, ev.to, ev.from, ev.value).await;
    settle_balances(state.transfer_policy.retract_balances, log, results)?;

    settle_shares(state, ev).await?;

    Ok(Assigned::new())
}

/// Debits `from` and credits `to`, concurrently when they are different rows.
async fn move_balance(
    db: &Db,
    token: Address,
    from: Address,
    to: Address,
    value: U256,
) -> [Result<I256>; 2] {
    if from == to {
        // Both read-then-write the same row; they must not interleave.
        let credit = increase_balance(db, token, to, value).await;
        let debit = decrease_balance(db, token, from, value).await;
        return [credit, debit];
    }
    let (credit, debit) = tokio::join!(
        increase_balance(db, token, to, value),
        decrease_balance(db, token, from, value),
    );
    [credit, debit]
}

fn settle_balances<T>(
    policy: FailurePolicy,
    log: &EventLog,
    results: [Result<T>; 2],
) -> Result<()> {
    let results = results.map(|r| r.map(|_| ()));
    match policy {
        FailurePolicy::FailFast => first_failure(results),
        FailurePolicy::LogAndContinue => {
            for err in results.into_iter().filter_map(|r| r.err()) {
                error!(
                    transaction_hash = %log.tx_hash(),
                    log_index = log.log_index,
                    error = %err,
                    "balance update failed, continuing"
                );
            }
            Ok(())
        }
    }
}

/// Outcome-share transfers also move the holders' market positions, unless
/// the shares are going back to the market itself.
async fn settle_shares(state: &AppState, ev: &TokensTransferred) -> Result<()> {
    let Some(market) = ev.market else {
        return Ok(());
    };
    if ev.token_type != Some(TokenType::ShareToken) || ev.to == market {
        return Ok(());
    }

    state.settlement.settle(&state.db, market, ev.from, ev.to).await?;
    debug!(market = %hex_id(market), "share transfer settled");
    Ok(())
}
