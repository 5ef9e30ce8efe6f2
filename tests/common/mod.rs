#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;

use augur_mirror::notify::Publisher;
use augur_mirror::settlement::ShareSettlement;
use augur_mirror::store::{self, Db};
use augur_mirror::types::{
    hex_id, CrowdsourcerCompleted, CrowdsourcerContribution, CrowdsourcerCreated, Direction,
    EventLog, EventPayload, ReportingState,
};
use augur_mirror::{route, AppState, Error};

pub const UNIVERSE: u64 = 0xa0;
pub const FEE_WINDOW: u64 = 0xfe;

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, Value)>>,
}

impl RecordingPublisher {
    pub fn names(&self) -> Vec<String> {
        self.published.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn last(&self) -> (String, Value) {
        self.published.lock().unwrap().last().cloned().expect("nothing published")
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, name: &str, payload: Value) {
        self.published.lock().unwrap().push((name.to_string(), payload));
    }
}

#[derive(Default)]
pub struct RecordingSettlement {
    pub calls: Mutex<Vec<(Address, Address, Address)>>,
    /// When set, every settlement call fails after being recorded.
    pub fail: AtomicBool,
}

#[async_trait]
impl ShareSettlement for RecordingSettlement {
    async fn settle(
        &self,
        _db: &Db,
        market: Address,
        from: Address,
        to: Address,
    ) -> augur_mirror::Result<()> {
        self.calls.lock().unwrap().push((market, from, to));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Settlement(format!(
                "positions for market {} unavailable",
                hex_id(market)
            )));
        }
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub publisher: Arc<RecordingPublisher>,
    pub settlement: Arc<RecordingSettlement>,
}

impl Harness {
    pub fn db(&self) -> &Db {
        &self.state.db
    }

    pub async fn apply(&self, log: &EventLog) -> Result<(), Error> {
        route(&self.state, Direction::Apply, log).await
    }

    pub async fn retract(&self, log: &EventLog) -> Result<(), Error> {
        route(&self.state, Direction::Retract, log).await
    }
}

/// Single-connection in-memory store so every query sees the same database.
pub async fn setup() -> Harness {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    store::migrate(&db).await.expect("migrations");

    sqlx::query("INSERT INTO fee_windows (fee_window, universe, is_active) VALUES (?, ?, 1)")
        .bind(hex_id(addr(FEE_WINDOW)))
        .bind(hex_id(addr(UNIVERSE)))
        .execute(&db)
        .await
        .unwrap();

    let publisher = Arc::new(RecordingPublisher::default());
    let settlement = Arc::new(RecordingSettlement::default());
    let state = AppState::new(db, settlement.clone(), publisher.clone());

    Harness {
        state,
        publisher,
        settlement,
    }
}

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn log(block_number: u64, tx: u64, log_index: u64, payload: EventPayload) -> EventLog {
    EventLog {
        block_number,
        transaction_hash: H256::from_low_u64_be(tx),
        log_index,
        payload,
    }
}

pub async fn seed_market(db: &Db, market: Address, state: ReportingState) {
    sqlx::query("INSERT INTO markets (market_id, universe, reporting_state) VALUES (?, ?, ?)")
        .bind(hex_id(market))
        .bind(hex_id(addr(UNIVERSE)))
        .bind(state.as_str())
        .execute(db)
        .await
        .unwrap();
}

pub async fn seed_initial_report(db: &Db, market: Address, payout_id: i64, amount: u64) {
    sqlx::query("INSERT INTO initial_reports (market_id, payout_id, amount_staked) VALUES (?, ?, ?)")
        .bind(hex_id(market))
        .bind(payout_id)
        .bind(amount.to_string())
        .execute(db)
        .await
        .unwrap();
}

pub fn created(market: Address, crowdsourcer: Address, numerators: &[u64]) -> EventPayload {
    EventPayload::DisputeCrowdsourcerCreated(CrowdsourcerCreated {
        universe: addr(UNIVERSE),
        market,
        dispute_crowdsourcer: crowdsourcer,
        payout_numerators: numerators.iter().map(|n| U256::from(*n)).collect(),
        size: U256::from(1_000u64),
        invalid: false,
    })
}

pub fn contribution(
    market: Address,
    crowdsourcer: Address,
    reporter: Address,
    amount: u64,
) -> EventPayload {
    EventPayload::DisputeCrowdsourcerContribution(CrowdsourcerContribution {
        universe: addr(UNIVERSE),
        reporter,
        market,
        dispute_crowdsourcer: crowdsourcer,
        amount_staked: U256::from(amount),
    })
}

pub fn completed(market: Address, crowdsourcer: Address) -> EventPayload {
    EventPayload::DisputeCrowdsourcerCompleted(CrowdsourcerCompleted {
        universe: addr(UNIVERSE),
        market,
        dispute_crowdsourcer: crowdsourcer,
    })
}

/// Creates, funds and completes a round in consecutive blocks starting at `block`.
pub async fn completed_round(
    h: &Harness,
    block: u64,
    market: Address,
    crowdsourcer: Address,
    numerators: &[u64],
    stake: u64,
) {
    h.apply(&log(block, block, 0, created(market, crowdsourcer, numerators)))
        .await
        .unwrap();
    h.apply(&log(block + 1, block + 1, 0, contribution(market, crowdsourcer, addr(0x5e), stake)))
        .await
        .unwrap();
    h.apply(&log(block + 2, block + 2, 0, completed(market, crowdsourcer)))
        .await
        .unwrap();
}

pub async fn payout_id(db: &Db, crowdsourcer: Address) -> i64 {
    sqlx::query("SELECT payout_id FROM crowdsourcers WHERE crowdsourcer_id = ?")
        .bind(hex_id(crowdsourcer))
        .fetch_one(db)
        .await
        .unwrap()
        .get("payout_id")
}

pub async fn count(db: &Db, table: &str) -> i64 {
    sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
        .fetch_one(db)
        .await
        .unwrap()
        .get("n")
}

const TABLES: &[(&str, &[&str])] = &[
    ("markets", &["market_id", "reporting_state", "reporting_rounds_completed"]),
    ("payouts", &["payout_id", "market_id", "numerators", "is_invalid", "tentative_winning"]),
    (
        "crowdsourcers",
        &["crowdsourcer_id", "market_id", "fee_window", "payout_id", "size", "amount_staked", "completed"],
    ),
    ("disputes", &["transaction_hash", "log_index", "reporter", "crowdsourcer_id", "amount_staked"]),
    ("crowdsourcer_redeemed", &["transaction_hash", "log_index", "crowdsourcer", "amount_redeemed"]),
    ("transfers", &["transaction_hash", "log_index", "sender", "recipient", "token", "value"]),
    ("balances", &["token", "owner", "balance"]),
];

/// Every mirrored row, rendered as text, for before/after comparisons.
pub async fn snapshot(db: &Db) -> Vec<String> {
    let mut rows = Vec::new();
    for (table, columns) in TABLES {
        let expr = columns
            .iter()
            .map(|c| format!("quote({c})"))
            .collect::<Vec<_>>()
            .join(" || '|' || ");
        let sql = format!("SELECT {expr} AS row FROM {table} ORDER BY row");
        for row in sqlx::query(&sql).fetch_all(db).await.unwrap() {
            rows.push(format!("{table}: {}", row.get::<String, _>("row")));
        }
    }
    rows
}
