//! Pool setup and the small read helpers shared by every handler.

use ethers::types::{Address, I256, U256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::error::Result;
use crate::types::hex_id;

/// Store handle passed to every handler.
pub type Db = SqlitePool;

/// Opens the pool. An in-memory database lives only as long as its
/// connection, so memory URLs get exactly one connection that is never
/// recycled, whatever `max_connections` says.
pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Db, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(pool_size(url, max_connections));
    let pool = if is_memory_url(url) {
        pool.idle_timeout(None).max_lifetime(None)
    } else {
        pool
    };
    pool.connect_with(options).await
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn pool_size(url: &str, requested: u32) -> u32 {
    if is_memory_url(url) {
        1
    } else {
        requested.max(1)
    }
}

pub async fn migrate(db: &Db) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(db).await
}

/// Active fee window for `universe`, if one is open.
pub async fn active_fee_window(db: &Db, universe: Address) -> Result<Option<String>> {
    let row = sqlx::query(
        r#"
        SELECT fee_window FROM fee_windows
        WHERE universe = ? AND is_active = 1
        LIMIT 1
        "#,
    )
    .bind(hex_id(universe))
    .fetch_optional(db)
    .await?;

    Ok(row.map(|r| r.get::<String, _>("fee_window")))
}

pub(crate) fn parse_u256(column: &str, text: &str) -> Result<U256> {
    U256::from_dec_str(text).map_err(|e| decode_error(column, text, e))
}

pub(crate) fn parse_i256(column: &str, text: &str) -> Result<I256> {
    I256::from_dec_str(text).map_err(|e| decode_error(column, text, e))
}

fn decode_error(column: &str, text: &str, err: impl std::fmt::Debug) -> crate::error::Error {
    sqlx::Error::Decode(format!("bad {column} value {text:?}: {err:?}").into()).into()
}
