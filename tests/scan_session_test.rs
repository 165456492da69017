//! End-to-end scan sessions against the in-memory store.
//!
//! Covers:
//! - Filling a group and completing it
//! - Over-quantity scans after the declared total is reached
//! - SKU mismatches and operator confirmation
//! - Two devices scanning the same tracking number
//! - Force completion and the configurable over-quantity ceiling

mod common;

use assert_matches::assert_matches;
use common::{lines_for, trk1_store, Harness, TRACKING};
use returns_intake::{
    events::IntakeEvent,
    intake::{Discrepancy, IntakeDetails, MismatchFinding, SessionState},
    models::{Grade, OrderRecord, ShipmentStatus},
    services::{EngineSettings, InMemorySessionStore, LpnOutcome, ScanOutcome},
    IntakeError,
};
use std::sync::Arc;

async fn commit(harness: &mut Harness, lpn: &str) -> returns_intake::services::CommitReceipt {
    match harness.engine.handle_scan(lpn).await {
        Ok(ScanOutcome::Lpn(LpnOutcome::Committed(receipt))) => receipt,
        other => panic!("expected {lpn} to commit, got {other:?}"),
    }
}

#[tokio::test]
async fn full_group_reaches_ready_and_completes() {
    let mut harness = Harness::new(trk1_store());

    let matched = harness.engine.handle_scan(TRACKING).await.unwrap();
    assert_matches!(matched, ScanOutcome::Tracking(m) => {
        assert_eq!(m.declared, 5);
        assert_eq!(m.inbounded, 0);
        assert_eq!(m.lines, 2);
        assert_eq!(m.carrier.as_deref(), Some("UPS"));
    });
    assert_eq!(harness.engine.state(), SessionState::AwaitingLpn);

    for lpn in ["A1", "A2", "A3", "B1"] {
        let receipt = commit(&mut harness, lpn).await;
        assert_eq!(receipt.state, SessionState::AwaitingLpn);
        assert!(!receipt.over_quantity);
    }
    let last = commit(&mut harness, "B2").await;
    assert_eq!(last.state, SessionState::ReadyToComplete);
    assert_eq!(last.inbounded, 5);
    assert_eq!(last.session_scanned, 5);

    let report = harness.engine.complete_package().await.unwrap();
    assert_eq!(report.discrepancy, Discrepancy::Exact);
    assert_eq!(harness.engine.state(), SessionState::Idle);

    let lines = lines_for(&harness.store, TRACKING).await;
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.status == ShipmentStatus::Inbound));
    assert!(harness.sessions.current().is_none());
}

#[tokio::test]
async fn lines_are_credited_by_order_sku() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();

    commit(&mut harness, "B1").await;
    let progress = harness.engine.progress().await.unwrap();

    assert_eq!(progress.inbounded, 1);
    assert_eq!(progress.remaining, 4);
    let sku_b = progress.lines.iter().find(|line| line.sku == "SKU-B").unwrap();
    assert_eq!(sku_b.inbounded, 1);
    let sku_a = progress.lines.iter().find(|line| line.sku == "SKU-A").unwrap();
    assert_eq!(sku_a.inbounded, 0);
}

#[tokio::test]
async fn scan_past_declared_total_is_accepted_with_advisory() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();
    for lpn in ["A1", "A2", "A3", "B1", "B2"] {
        commit(&mut harness, lpn).await;
    }
    assert_eq!(harness.engine.state(), SessionState::ReadyToComplete);
    harness.drain_events();

    let sixth = commit(&mut harness, "A4").await;

    assert!(sixth.over_quantity);
    assert_eq!(sixth.inbounded, 6);
    assert_eq!(sixth.state, SessionState::ReadyToComplete);
    assert!(harness
        .drain_events()
        .iter()
        .any(|event| matches!(event, IntakeEvent::OverQuantityDetected { declared: 5, inbounded: 6, .. })));

    let report = harness.engine.complete_package().await.unwrap();
    assert_eq!(report.discrepancy, Discrepancy::Surplus(1));
}

#[tokio::test]
async fn same_lpn_twice_in_a_session_is_rejected() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();
    commit(&mut harness, "A1").await;

    assert_matches!(
        harness.engine.handle_scan(" a1 ").await,
        Err(IntakeError::AlreadyScannedThisSession(lpn)) if lpn == "A1"
    );
    assert_eq!(harness.engine.scanned_lpns(), vec!["A1".to_string()]);
    assert_eq!(harness.store.inbound_record_count(), 1);
}

#[tokio::test]
async fn order_sku_mismatch_blocks_until_operator_picks() {
    let store = trk1_store();
    store.insert_order(OrderRecord::new("ORD-200", "C1", "SKU-C", "Floor Lamp"));
    let mut harness = Harness::new(store);
    harness.engine.scan_tracking(TRACKING).await.unwrap();

    let outcome = harness.engine.scan_lpn("C1", IntakeDetails::default()).await.unwrap();
    let finding = assert_matches!(outcome, LpnOutcome::ConfirmationRequired { lpn, finding } => {
        assert_eq!(lpn, "C1");
        finding
    });
    assert_matches!(&finding, MismatchFinding::Mismatch { shipment_sku, order_skus, .. } => {
        assert_eq!(shipment_sku.as_str(), "SKU-A");
        assert_eq!(order_skus.len(), 1);
        assert_eq!(order_skus[0].as_str(), "SKU-C");
    });
    assert!(harness.store.inbound_record("C1").is_none());

    // Nothing else may be scanned while the pick is pending
    assert_matches!(
        harness.engine.scan_lpn("A1", IntakeDetails::default()).await,
        Err(IntakeError::ConfirmationPending { pending }) if pending == "C1"
    );
    assert_matches!(
        harness.engine.confirm_sku("SKU-Z", IntakeDetails::default()).await,
        Err(IntakeError::InvalidSkuSelection { .. })
    );

    let receipt = harness
        .engine
        .confirm_sku("sku-c", IntakeDetails::default())
        .await
        .unwrap();
    assert_eq!(receipt.record.sku, "SKU-C");
    assert!(harness.engine.staged().is_none());
    assert_eq!(harness.store.inbound_record("C1").unwrap().sku, "SKU-C");
}

#[tokio::test]
async fn lpn_without_order_needs_confirmation() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();

    let outcome = harness.engine.scan_lpn("X9", IntakeDetails::default()).await.unwrap();
    assert_matches!(outcome, LpnOutcome::ConfirmationRequired { finding, .. } => {
        assert!(finding.order_sku_missing());
    });

    assert_eq!(harness.engine.cancel_pending(), Some("X9".to_string()));
    assert!(harness.store.inbound_record("X9").is_none());
    assert_eq!(harness.engine.state(), SessionState::AwaitingLpn);
}

#[tokio::test]
async fn graded_unit_with_photo_records_missing_parts() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();

    let checklist = harness.engine.parts_checklist("sku-a").await.unwrap();
    assert_eq!(checklist, vec!["Base", "Arm", "Bulb"]);

    let details = IntakeDetails::graded(Grade::B)
        .with_missing_parts(["Bulb"])
        .with_photos(1);
    let outcome = harness.engine.scan_lpn("A1", details).await.unwrap();
    assert_matches!(outcome, LpnOutcome::Committed(receipt) => {
        assert_eq!(receipt.record.grade, Grade::B);
        assert_eq!(receipt.record.missing_parts(), vec!["Bulb".to_string()]);
    });
}

#[tokio::test]
async fn two_devices_share_the_live_count() {
    let store = trk1_store();
    let mut first = Harness::new(store.clone());
    let mut second = Harness::new(store.clone());

    first.engine.scan_tracking(TRACKING).await.unwrap();
    second.engine.scan_tracking(TRACKING).await.unwrap();

    for lpn in ["A1", "A2", "A3"] {
        commit(&mut first, lpn).await;
    }
    // Committed elsewhere; this device has never seen it
    assert_matches!(
        second.engine.handle_scan("A1").await,
        Err(IntakeError::AlreadyInbounded(lpn)) if lpn == "A1"
    );

    commit(&mut second, "B1").await;
    let filled = commit(&mut second, "B2").await;
    assert_eq!(filled.inbounded, 5);
    assert_eq!(filled.state, SessionState::ReadyToComplete);

    // The first device only saw three units, but completion reads the live count
    assert_eq!(first.engine.state(), SessionState::AwaitingLpn);
    let report = first.engine.complete_package().await.unwrap();
    assert_eq!(report.inbounded, 5);
    assert_eq!(first.engine.state(), SessionState::Idle);

    // A third device arriving late is told the group is done
    let mut third = Harness::new(store);
    assert_matches!(
        third.engine.scan_tracking(TRACKING).await,
        Err(IntakeError::AlreadyComplete { declared: 5, inbounded: 5, .. })
    );
    assert_eq!(third.engine.state(), SessionState::Idle);
}

#[tokio::test]
async fn unknown_tracking_is_not_found() {
    let mut harness = Harness::new(trk1_store());
    let err = harness.engine.scan_tracking("1Z-NOT-DECLARED").await.unwrap_err();
    assert_matches!(err, IntakeError::NotFound(_));
    assert_eq!(harness.engine.state(), SessionState::Idle);
}

#[tokio::test]
async fn force_complete_records_shortfall_on_every_line() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();
    for lpn in ["A1", "A2", "B1"] {
        commit(&mut harness, lpn).await;
    }

    let report = harness
        .engine
        .force_complete(Some("carrier lost a box"))
        .await
        .unwrap();

    assert_eq!(report.discrepancy, Discrepancy::Shortfall(2));
    assert_eq!(
        report.note.as_deref(),
        Some("Force completed: declared 5, inbounded 3, short 2; reason: carrier lost a box")
    );
    assert_eq!(harness.engine.state(), SessionState::ForceCompleted);

    for line in lines_for(&harness.store, TRACKING).await {
        assert_eq!(line.status, ShipmentStatus::Inbound);
        assert_eq!(line.note, report.note);
    }

    // Still short by count, so the group can be reopened straight from the terminal state
    let reopened = harness.engine.scan_tracking(TRACKING).await.unwrap();
    assert_eq!(reopened.inbounded, 3);
    assert_eq!(harness.engine.state(), SessionState::AwaitingLpn);
}

#[tokio::test]
async fn completion_refused_while_pick_is_pending() {
    let store = trk1_store();
    store.insert_order(OrderRecord::new("ORD-200", "C1", "SKU-C", "Floor Lamp"));
    let mut harness = Harness::new(store);
    harness.engine.scan_tracking(TRACKING).await.unwrap();
    harness.engine.scan_lpn("C1", IntakeDetails::default()).await.unwrap();

    assert_matches!(
        harness.engine.force_complete(None).await,
        Err(IntakeError::ConfirmationPending { .. })
    );
    assert_eq!(harness.engine.state(), SessionState::AwaitingLpn);
}

#[tokio::test]
async fn configured_ceiling_refuses_excess_units() {
    let store = trk1_store();
    store.insert_order(OrderRecord::new("ORD-100", "A7", "SKU-A", "Desk Lamp"));
    let settings = EngineSettings {
        over_quantity_ceiling_ratio: Some(1.5),
        ..EngineSettings::default()
    };
    let mut harness = Harness::with(store, Arc::new(InMemorySessionStore::new()), settings);
    harness.engine.scan_tracking(TRACKING).await.unwrap();

    // ceil(5 * 1.5) = 8
    for lpn in ["A1", "A2", "A3", "A4", "A5", "A6", "B1", "B2"] {
        commit(&mut harness, lpn).await;
    }
    assert_matches!(
        harness.engine.handle_scan("A7").await,
        Err(IntakeError::OverQuantityLimit { ceiling: 8, .. })
    );
    assert!(harness.store.inbound_record("A7").is_none());
    assert_eq!(harness.engine.state(), SessionState::ReadyToComplete);
}

#[tokio::test]
async fn reset_keeps_committed_records() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();
    commit(&mut harness, "A1").await;

    harness.engine.reset().await.unwrap();

    assert_eq!(harness.engine.state(), SessionState::Idle);
    assert!(harness.engine.group().is_none());
    assert!(harness.store.inbound_record("A1").is_some());
    assert!(harness
        .drain_events()
        .iter()
        .any(|event| matches!(event, IntakeEvent::SessionReset { tracking_number: Some(t) } if t == TRACKING)));
}

#[tokio::test]
async fn undrained_event_channel_does_not_stall_scanning() {
    let store = trk1_store();
    let (sender, _events) = returns_intake::events::EventSender::channel(1);
    let mut engine = returns_intake::ScanSession::new(
        store.clone(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(sender),
        EngineSettings::default(),
    );

    let scanned = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        engine.scan_tracking(TRACKING).await?;
        engine.scan_lpn("A1", IntakeDetails::default()).await?;
        engine.scan_lpn("A2", IntakeDetails::default()).await
    })
    .await
    .expect("scanning stalled on a full event channel");

    assert!(scanned.is_ok());
    assert_eq!(store.inbound_record_count(), 2);
}

#[tokio::test]
async fn reconcile_keeps_force_completion_on_record() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();
    commit(&mut harness, "A1").await;
    harness.engine.force_complete(Some("box lost")).await.unwrap();
    let before = lines_for(&harness.store, TRACKING).await;

    let (sender, _rx) = returns_intake::events::EventSender::channel(8);
    let outcome = returns_intake::services::ShipmentReconciler::new(
        harness.store.clone(),
        Arc::new(sender),
    )
    .reconcile(TRACKING, 0)
    .await
    .unwrap();

    assert_eq!(outcome.reverted, 0);
    let after = lines_for(&harness.store, TRACKING).await;
    assert_eq!(after, before);
    for line in after {
        assert_eq!(line.status, ShipmentStatus::Inbound);
        assert_eq!(
            line.note.as_deref(),
            Some("Force completed: declared 5, inbounded 1, short 4; reason: box lost")
        );
    }
}

#[tokio::test]
async fn reversion_note_is_appended_after_completion_note() {
    let mut harness = Harness::new(trk1_store());
    harness.engine.scan_tracking(TRACKING).await.unwrap();
    for lpn in ["A1", "A2", "A3", "B1", "B2"] {
        commit(&mut harness, lpn).await;
    }
    // Exactly declared, forced anyway so every line carries a note
    harness.engine.force_complete(Some("audit")).await.unwrap();

    harness.store.delete_inbound_record("B2").unwrap();
    let (sender, _rx) = returns_intake::events::EventSender::channel(8);
    let outcome = returns_intake::services::ShipmentReconciler::new(
        harness.store.clone(),
        Arc::new(sender),
    )
    .reconcile(TRACKING, 1)
    .await
    .unwrap();

    assert_eq!(outcome.reverted, 2);
    for line in lines_for(&harness.store, TRACKING).await {
        assert_eq!(line.status, ShipmentStatus::Arrived);
        assert_eq!(
            line.note.as_deref(),
            Some(
                "Force completed: declared 5, inbounded 5, short 0; reason: audit\n\
                 Reverted after record deletion: inbounded 4 of 5, short 1"
            )
        );
    }
}
