use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use augur_mirror::config::Config;
use augur_mirror::notify::LogPublisher;
use augur_mirror::settlement::NoopSettlement;
use augur_mirror::types::{Direction, EventLog};
use augur_mirror::{route, store, AppState};

/// One line of the replay stream.
#[derive(Deserialize)]
struct Record {
    direction: Direction,
    log: EventLog,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;

    let db = store::connect(&cfg.database_url, cfg.max_connections)
        .await
        .context("failed to connect DB")?;
    store::migrate(&db).await.context("failed to apply migrations")?;

    let state = AppState::new(db, Arc::new(NoopSettlement), Arc::new(LogPublisher))
        .with_transfer_policy(cfg.transfer_policy);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handled: u64 = 0;
    let mut skipped: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Record =
            serde_json::from_str(line).with_context(|| format!("bad event record: {line}"))?;
        let log = &record.log;

        match route(&state, record.direction, log).await {
            Ok(()) => handled += 1,
            Err(e) if !e.is_fatal() => {
                skipped += 1;
                warn!(
                    block_number = log.block_number,
                    log_index = log.log_index,
                    error = %e,
                    "event skipped"
                );
            }
            Err(e) => {
                error!(
                    block_number = log.block_number,
                    log_index = log.log_index,
                    error = %e,
                    "event failed, halting"
                );
                return Err(e).with_context(|| {
                    format!("halted at block {} log {}", log.block_number, log.log_index)
                });
            }
        }
    }

    info!(handled, skipped, "replay finished");
    Ok(())
}
