//! Per-(token, owner) balances derived from the applied transfers.
//!
//! A missing row means a zero balance. Rows that return to zero are removed
//! so an apply followed by its retraction leaves `balances` exactly as it was.
//! Balances may go negative while events are in flight; nothing here refuses
//! that.

use ethers::types::{Address, I256, U256};
use sqlx::Row;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{parse_i256, Db};
use crate::types::hex_id;

/// Adds a signed `delta` to `balance`.
pub fn apply_delta(balance: I256, delta: I256) -> Result<I256> {
    balance
        .checked_add(delta)
        .ok_or_else(|| Error::Overflow(format!("{balance} + {delta}")))
}

pub fn credit(balance: I256, amount: U256) -> Result<I256> {
    apply_delta(balance, signed(amount)?)
}

pub fn debit(balance: I256, amount: U256) -> Result<I256> {
    let delta = signed(amount)?;
    balance
        .checked_sub(delta)
        .ok_or_else(|| Error::Overflow(format!("{balance} - {delta}")))
}

fn signed(amount: U256) -> Result<I256> {
    I256::try_from(amount).map_err(|_| Error::Overflow(format!("{amount} exceeds int256")))
}

pub async fn balance_of(db: &Db, token: Address, owner: Address) -> Result<I256> {
    let row = sqlx::query("SELECT balance FROM balances WHERE token = ? AND owner = ?")
        .bind(hex_id(token))
        .bind(hex_id(owner))
        .fetch_optional(db)
        .await?;

    match row {
        Some(row) => parse_i256("balance", row.get::<&str, _>("balance")),
        None => Ok(I256::zero()),
    }
}

pub async fn increase_balance(db: &Db, token: Address, owner: Address, amount: U256) -> Result<I256> {
    let current = balance_of(db, token, owner).await?;
    let next = credit(current, amount)?;
    store_balance(db, token, owner, next).await?;
    Ok(next)
}

pub async fn decrease_balance(db: &Db, token: Address, owner: Address, amount: U256) -> Result<I256> {
    let current = balance_of(db, token, owner).await?;
    let next = debit(current, amount)?;
    store_balance(db, token, owner, next).await?;
    Ok(next)
}

async fn store_balance(db: &Db, token: Address, owner: Address, balance: I256) -> Result<()> {
    let token_id = hex_id(token);
    let owner_id = hex_id(owner);

    if balance.is_zero() {
        sqlx::query("DELETE FROM balances WHERE token = ? AND owner = ?")
            .bind(&token_id)
            .bind(&owner_id)
            .execute(db)
            .await?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO balances (token, owner, balance)
            VALUES (?, ?, ?)
            ON CONFLICT (token, owner) DO UPDATE SET balance = excluded.balance
            "#,
        )
        .bind(&token_id)
        .bind(&owner_id)
        .bind(balance.to_string())
        .execute(db)
        .await?;
    }

    debug!(token = %token_id, owner = %owner_id, %balance, "balance updated");
    Ok(())
}
