mod common;

use ethers::types::U256;
use serde_json::json;

use augur_mirror::types::{hex_id, CrowdsourcerRedeemed, EventPayload, ReportingState};
use augur_mirror::Error;
use common::*;

fn redeemed(market: u64, crowdsourcer: u64) -> EventPayload {
    EventPayload::DisputeCrowdsourcerRedeemed(CrowdsourcerRedeemed {
        universe: addr(UNIVERSE),
        reporter: addr(0xa),
        market: addr(market),
        dispute_crowdsourcer: addr(crowdsourcer),
        amount_redeemed: U256::from(100),
        rep_received: U256::from(110),
        reporting_fees_received: U256::from(3),
        payout_numerators: vec![U256::zero(), U256::from(1)],
    })
}

#[tokio::test]
async fn created_notification_carries_assigned_fields() {
    let h = setup().await;
    let market = addr(0x100);
    let round = addr(0x200);

    h.apply(&log(10, 1, 4, created(market, round, &[0, 1]))).await.unwrap();

    let (name, payload) = h.publisher.last();
    assert_eq!(name, "DisputeCrowdsourcerCreated");
    assert_eq!(payload["eventName"], json!("DisputeCrowdsourcerCreated"));
    assert_eq!(payload["blockNumber"], json!(10));
    assert_eq!(payload["logIndex"], json!(4));
    assert_eq!(payload["crowdsourcerId"], json!(hex_id(round)));
    assert_eq!(payload["marketId"], json!(hex_id(market)));
    assert_eq!(payload["feeWindow"], json!(hex_id(addr(FEE_WINDOW))));
    assert_eq!(payload["payoutId"], json!(payout_id(h.db(), round).await));
    assert_eq!(payload["completed"], json!(null));
}

#[tokio::test]
async fn notification_names_follow_direction() {
    let h = setup().await;
    let market = addr(0x100);
    let round = addr(0x200);
    seed_market(h.db(), market, ReportingState::CrowdsourcingDispute).await;

    let events = [
        log(10, 1, 0, created(market, round, &[0, 1])),
        log(11, 2, 0, contribution(market, round, addr(0xa), 10)),
        log(12, 3, 0, completed(market, round)),
        log(13, 4, 0, redeemed(0x100, 0x200)),
    ];
    for event in &events {
        h.apply(event).await.unwrap();
    }
    for event in events.iter().rev() {
        h.retract(event).await.unwrap();
    }

    assert_eq!(
        h.publisher.names(),
        vec![
            "DisputeCrowdsourcerCreated",
            "DisputeCrowdsourcerContribution",
            "DisputeCrowdsourcerCompleted",
            "DisputeCrowdsourcerRedeemedLog",
            "FeeWindowRedeemed",
            "DisputeCrowdsourcerCompleted",
            "DisputeCrowdsourcerContribution",
            "DisputeCrowdsourcerCreated",
        ]
    );
}

#[tokio::test]
async fn full_lifecycle_round_trip_restores_store() {
    let h = setup().await;
    let market = addr(0x100);
    seed_market(h.db(), market, ReportingState::CrowdsourcingDispute).await;
    let before = snapshot(h.db()).await;

    let events = [
        log(10, 1, 0, created(market, addr(0x201), &[0, 1])),
        log(10, 1, 1, contribution(market, addr(0x201), addr(0xa), 400)),
        log(11, 2, 0, contribution(market, addr(0x201), addr(0xb), 600)),
        log(11, 2, 1, completed(market, addr(0x201))),
        log(12, 3, 0, created(market, addr(0x202), &[1, 0])),
        log(12, 3, 1, contribution(market, addr(0x202), addr(0xc), 2_000)),
        log(13, 4, 0, completed(market, addr(0x202))),
        log(14, 5, 0, redeemed(0x100, 0x201)),
    ];
    for event in &events {
        h.apply(event).await.unwrap();
    }
    assert_eq!(
        augur_mirror::market::rounds_completed(h.db(), market).await.unwrap(),
        2
    );
    for event in events.iter().rev() {
        h.retract(event).await.unwrap();
    }

    // Payouts are kept by design; everything else must match.
    let after: Vec<String> = snapshot(h.db())
        .await
        .into_iter()
        .filter(|row| !row.starts_with("payouts:"))
        .collect();
    assert_eq!(after, before);
    assert_eq!(
        augur_mirror::market::reporting_state(h.db(), market).await.unwrap(),
        ReportingState::CrowdsourcingDispute
    );
}

#[tokio::test]
async fn redemption_is_append_only_by_log_position() {
    let h = setup().await;
    let entry = log(20, 7, 1, redeemed(0x100, 0x200));

    h.apply(&entry).await.unwrap();
    let err = h.apply(&entry).await.unwrap_err();
    assert!(
        matches!(err, Error::DuplicateKey { table: "crowdsourcer_redeemed", .. }),
        "got {err:?}"
    );
    assert_eq!(count(h.db(), "crowdsourcer_redeemed").await, 1);

    h.retract(&entry).await.unwrap();
    assert_eq!(count(h.db(), "crowdsourcer_redeemed").await, 0);

    let err = h.retract(&entry).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
    assert!(!err.is_fatal());
    assert_eq!(
        h.publisher.names(),
        vec!["DisputeCrowdsourcerRedeemedLog", "FeeWindowRedeemed"]
    );
}
