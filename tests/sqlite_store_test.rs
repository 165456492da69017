//! The SeaORM store against an in-memory SQLite database with migrations applied.

use assert_matches::assert_matches;
use chrono::Utc;
use returns_intake::{
    db::{self, DbConfig},
    events::EventSender,
    intake::{IntakeDetails, NormalizedKey, SessionState},
    models::{Grade, OrderRecord, ProductPart, ShipmentLine, ShipmentStatus},
    repositories::{InboundStore, NewInboundRecord, SeaOrmInboundStore, StoreError},
    services::{EngineSettings, InMemorySessionStore, ScanSession, ShipmentReconciler},
    IntakeError,
};
use std::sync::Arc;

async fn setup_store() -> Arc<SeaOrmInboundStore> {
    let pool = db::establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".to_string(),
        // Every connection to sqlite::memory: is its own database
        max_connections: 1,
        ..Default::default()
    })
    .await
    .expect("sqlite connection");
    db::run_migrations(&pool).await.expect("migrations");
    Arc::new(SeaOrmInboundStore::new(Arc::new(pool)))
}

async fn seed_trk1(store: &SeaOrmInboundStore) -> ShipmentLine {
    let line = store
        .insert_shipment_line(ShipmentLine::declared("trk-9 ", "ORD-9", "SKU-A", "Kettle", 2))
        .await
        .unwrap();
    for lpn in ["L1", "L2"] {
        store
            .insert_order(OrderRecord::new("ORD-9", lpn, "SKU-A", "Kettle"))
            .await
            .unwrap();
    }
    line
}

fn new_record(lpn: &str, line_id: uuid::Uuid) -> NewInboundRecord {
    NewInboundRecord {
        lpn: lpn.to_string(),
        shipment_line_id: line_id,
        tracking_number: "TRK-9".to_string(),
        sku: "SKU-A".to_string(),
        grade: Grade::A,
        missing_parts: vec![],
        processed_at: Utc::now(),
    }
}

#[tokio::test]
async fn tracking_lookup_uses_normalized_key() {
    let store = setup_store().await;
    let line = seed_trk1(&store).await;

    let lines = store
        .find_shipment_lines(&NormalizedKey::new("TRK-9"))
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].id, line.id);
    assert_eq!(lines[0].tracking_key, "TRK-9");
    assert_eq!(lines[0].status, ShipmentStatus::Shipping);
}

#[tokio::test]
async fn second_insert_of_an_lpn_is_a_unique_violation() {
    let store = setup_store().await;
    let line = seed_trk1(&store).await;

    store.create_inbound_record(new_record("L1", line.id)).await.unwrap();
    let err = store
        .create_inbound_record(new_record(" l1", line.id))
        .await
        .unwrap_err();

    assert_matches!(err, StoreError::UniqueViolation { lpn } if lpn == "L1");
    assert_eq!(
        store
            .count_inbounded_by_tracking(&NormalizedKey::new("trk-9"))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn parts_come_back_in_checklist_order() {
    let store = setup_store().await;
    for (position, part) in ["Lid", "Base", "Filter"].into_iter().enumerate() {
        store
            .insert_part(ProductPart::new("SKU-A", part, position as i32))
            .await
            .unwrap();
    }

    let parts = store
        .find_product_parts(&NormalizedKey::new("sku-a"))
        .await
        .unwrap();
    assert_eq!(parts, vec!["Lid", "Base", "Filter"]);
}

#[tokio::test]
async fn session_completes_and_deletion_reverts() {
    let store = setup_store().await;
    let line = seed_trk1(&store).await;
    let (sender, _rx) = EventSender::channel(64);
    let sender = Arc::new(sender);

    let mut engine = ScanSession::new(
        store.clone(),
        Arc::new(InMemorySessionStore::new()),
        sender.clone(),
        EngineSettings::default(),
    );
    engine.scan_tracking("TRK-9").await.unwrap();
    engine.scan_lpn("L1", IntakeDetails::default()).await.unwrap();
    engine.scan_lpn("L2", IntakeDetails::default()).await.unwrap();
    assert_eq!(engine.state(), SessionState::ReadyToComplete);
    engine.complete_package().await.unwrap();

    assert_matches!(
        engine.scan_tracking("TRK-9").await,
        Err(IntakeError::AlreadyComplete { .. })
    );

    // An inbound record is deleted from the records screen
    assert_eq!(
        store
            .delete_inbound_record(&NormalizedKey::new("L2"))
            .await
            .unwrap(),
        1
    );
    let outcome = ShipmentReconciler::new(store.clone(), sender)
        .reconcile("trk-9", 1)
        .await
        .unwrap();
    assert_eq!(outcome.reverted, 1);

    let lines = store
        .find_shipment_lines(&NormalizedKey::new("TRK-9"))
        .await
        .unwrap();
    assert_eq!(lines[0].id, line.id);
    assert_eq!(lines[0].status, ShipmentStatus::Arrived);
    assert_eq!(
        lines[0].note.as_deref(),
        Some("Reverted after record deletion: inbounded 1 of 2, short 1")
    );
}
