//! Apply/retract handlers per event type, and the router in front of them.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::state::AppState;
use crate::types::{Direction, EventLog, EventPayload};

pub mod crowdsourcer;
pub mod redeemed;
pub mod transfer;

/// Fields a handler computed, merged into the notification payload.
pub type Assigned = Map<String, Value>;

/// Runs the handler for `log` in `direction`, then publishes its notification.
///
/// Callers must deliver events one at a time in block/log-index order, and
/// only retract an event they previously applied. Nothing is published when
/// the handler fails; store writes it already made are not undone.
pub async fn route(state: &AppState, direction: Direction, log: &EventLog) -> Result<()> {
    let kind = log.kind();
    let mut payload = serde_json::to_value(log)?;

    let assigned = match (&log.payload, direction) {
        (EventPayload::DisputeCrowdsourcerCreated(ev), Direction::Apply) => {
            crowdsourcer::created(state, log, ev).await?
        }
        (EventPayload::DisputeCrowdsourcerCreated(ev), Direction::Retract) => {
            crowdsourcer::created_removal(state, ev).await?
        }
        (EventPayload::DisputeCrowdsourcerContribution(ev), Direction::Apply) => {
            crowdsourcer::contribution(state, log, ev).await?
        }
        (EventPayload::DisputeCrowdsourcerContribution(ev), Direction::Retract) => {
            crowdsourcer::contribution_removal(state, log, ev).await?
        }
        (EventPayload::DisputeCrowdsourcerCompleted(ev), Direction::Apply) => {
            crowdsourcer::completed(state, log, ev).await?
        }
        (EventPayload::DisputeCrowdsourcerCompleted(ev), Direction::Retract) => {
            crowdsourcer::completed_removal(state, ev).await?
        }
        (EventPayload::DisputeCrowdsourcerRedeemed(ev), Direction::Apply) => {
            redeemed::record(state, log, ev).await?
        }
        (EventPayload::DisputeCrowdsourcerRedeemed(_), Direction::Retract) => {
            redeemed::unrecord(state, log).await?
        }
        (EventPayload::TokensTransferred(ev), Direction::Apply) => {
            transfer::transferred(state, log, ev).await?
        }
        (EventPayload::TokensTransferred(ev), Direction::Retract) => {
            transfer::transferred_removal(state, log, ev).await?
        }
    };

    if let Value::Object(fields) = &mut payload {
        fields.extend(assigned);
    }

    let name = kind.notification(direction);
    debug!(
        notification = name,
        ?direction,
        block_number = log.block_number,
        transaction_hash = %log.tx_hash(),
        log_index = log.log_index,
        "event handled"
    );
    state.publisher.publish(name, payload).await;
    Ok(())
}

/// Surfaces the first failure among sub-operations that all ran to completion.
pub(crate) fn first_failure<const N: usize>(results: [Result<()>; N]) -> Result<()> {
    results.into_iter().collect()
}

pub(crate) fn assigned(value: Value) -> Assigned {
    match value {
        Value::Object(fields) => fields,
        _ => Assigned::new(),
    }
}
