use std::fmt;
use std::str::FromStr;

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Whether an event is newly confirmed or undone by a reorg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Apply,
    Retract,
}

/// A decoded log, in chain delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub block_number: u64,
    pub transaction_hash: H256,
    pub log_index: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventLog {
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::DisputeCrowdsourcerCreated(_) => EventKind::CrowdsourcerCreated,
            EventPayload::DisputeCrowdsourcerContribution(_) => EventKind::CrowdsourcerContribution,
            EventPayload::DisputeCrowdsourcerCompleted(_) => EventKind::CrowdsourcerCompleted,
            EventPayload::DisputeCrowdsourcerRedeemed(_) => EventKind::CrowdsourcerRedeemed,
            EventPayload::TokensTransferred(_) => EventKind::TokensTransferred,
        }
    }

    /// Transaction hash as stored in the `transaction_hash` columns.
    pub fn tx_hash(&self) -> String {
        hex_id(self.transaction_hash)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventName")]
pub enum EventPayload {
    DisputeCrowdsourcerCreated(CrowdsourcerCreated),
    DisputeCrowdsourcerContribution(CrowdsourcerContribution),
    DisputeCrowdsourcerCompleted(CrowdsourcerCompleted),
    DisputeCrowdsourcerRedeemed(CrowdsourcerRedeemed),
    TokensTransferred(TokensTransferred),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdsourcerCreated {
    pub universe: Address,
    pub market: Address,
    pub dispute_crowdsourcer: Address,
    pub payout_numerators: Vec<U256>,
    pub size: U256,
    pub invalid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdsourcerContribution {
    pub universe: Address,
    pub reporter: Address,
    pub market: Address,
    pub dispute_crowdsourcer: Address,
    pub amount_staked: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdsourcerCompleted {
    pub universe: Address,
    pub market: Address,
    pub dispute_crowdsourcer: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdsourcerRedeemed {
    pub universe: Address,
    pub reporter: Address,
    pub market: Address,
    pub dispute_crowdsourcer: Address,
    pub amount_redeemed: U256,
    pub rep_received: U256,
    pub reporting_fees_received: U256,
    #[serde(default)]
    pub payout_numerators: Vec<U256>,
}

/// ERC20-style transfer. Older decoders emit `address`/`amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensTransferred {
    #[serde(alias = "address")]
    pub token: Address,
    pub from: Address,
    pub to: Address,
    #[serde(alias = "amount")]
    pub value: U256,
    #[serde(default)]
    pub token_type: Option<TokenType>,
    #[serde(default)]
    pub market: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CrowdsourcerCreated,
    CrowdsourcerContribution,
    CrowdsourcerCompleted,
    CrowdsourcerRedeemed,
    TokensTransferred,
}

impl EventKind {
    /// Notification published after a successful handler run.
    ///
    /// Redemption retractions are announced as `FeeWindowRedeemed`, which is
    /// what downstream listeners already subscribe to.
    pub fn notification(self, direction: Direction) -> &'static str {
        match (self, direction) {
            (EventKind::CrowdsourcerCreated, _) => "DisputeCrowdsourcerCreated",
            (EventKind::CrowdsourcerContribution, _) => "DisputeCrowdsourcerContribution",
            (EventKind::CrowdsourcerCompleted, _) => "DisputeCrowdsourcerCompleted",
            (EventKind::CrowdsourcerRedeemed, Direction::Apply) => "DisputeCrowdsourcerRedeemedLog",
            (EventKind::CrowdsourcerRedeemed, Direction::Retract) => "FeeWindowRedeemed",
            (EventKind::TokensTransferred, _) => "TokensTransferred",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    ReputationToken,
    ShareToken,
    FeeWindow,
    FeeToken,
}

/// Market reporting lifecycle as tracked in `markets.reporting_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportingState {
    PreReporting,
    DesignatedReporting,
    OpenReporting,
    CrowdsourcingDispute,
    AwaitingNextWindow,
    AwaitingFinalization,
    Finalized,
    Forking,
    AwaitingNoReportMigration,
    AwaitingForkMigration,
}

impl ReportingState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportingState::PreReporting => "PRE_REPORTING",
            ReportingState::DesignatedReporting => "DESIGNATED_REPORTING",
            ReportingState::OpenReporting => "OPEN_REPORTING",
            ReportingState::CrowdsourcingDispute => "CROWDSOURCING_DISPUTE",
            ReportingState::AwaitingNextWindow => "AWAITING_NEXT_WINDOW",
            ReportingState::AwaitingFinalization => "AWAITING_FINALIZATION",
            ReportingState::Finalized => "FINALIZED",
            ReportingState::Forking => "FORKING",
            ReportingState::AwaitingNoReportMigration => "AWAITING_NO_REPORT_MIGRATION",
            ReportingState::AwaitingForkMigration => "AWAITING_FORK_MIGRATION",
        }
    }
}

impl fmt::Display for ReportingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "PRE_REPORTING" => ReportingState::PreReporting,
            "DESIGNATED_REPORTING" => ReportingState::DesignatedReporting,
            "OPEN_REPORTING" => ReportingState::OpenReporting,
            "CROWDSOURCING_DISPUTE" => ReportingState::CrowdsourcingDispute,
            "AWAITING_NEXT_WINDOW" => ReportingState::AwaitingNextWindow,
            "AWAITING_FINALIZATION" => ReportingState::AwaitingFinalization,
            "FINALIZED" => ReportingState::Finalized,
            "FORKING" => ReportingState::Forking,
            "AWAITING_NO_REPORT_MIGRATION" => ReportingState::AwaitingNoReportMigration,
            "AWAITING_FORK_MIGRATION" => ReportingState::AwaitingForkMigration,
            other => return Err(format!("unknown reporting state: {other}")),
        };
        Ok(state)
    }
}

/// Protocol constants handlers read but never change.
#[derive(Debug, Clone)]
pub struct ProtocolConstants {
    /// State a market enters once a dispute round fills.
    pub awaiting_next_window: ReportingState,
    /// State a market is in while a dispute round is open.
    pub crowdsourcing_dispute: ReportingState,
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self {
            awaiting_next_window: ReportingState::AwaitingNextWindow,
            crowdsourcing_dispute: ReportingState::CrowdsourcingDispute,
        }
    }
}

/// `0x`-prefixed lowercase hex, the key format for addresses and hashes.
pub fn hex_id(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}
