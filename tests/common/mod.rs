#![allow(dead_code)]

use std::sync::Arc;

use returns_intake::{
    events::{EventSender, IntakeEvent},
    intake::NormalizedKey,
    models::{OrderRecord, ShipmentLine},
    repositories::{InMemoryInboundStore, InboundStore},
    services::{EngineSettings, InMemorySessionStore, ScanSession},
};
use tokio::sync::mpsc;

pub const TRACKING: &str = "TRK1";

/// Engine wired to shared in-memory collaborators, with the event receiver kept alive.
pub struct Harness {
    pub engine: ScanSession,
    pub store: Arc<InMemoryInboundStore>,
    pub sessions: Arc<InMemorySessionStore>,
    pub events: mpsc::Receiver<IntakeEvent>,
}

impl Harness {
    pub fn new(store: Arc<InMemoryInboundStore>) -> Self {
        Self::with(store, Arc::new(InMemorySessionStore::new()), EngineSettings::default())
    }

    pub fn with(
        store: Arc<InMemoryInboundStore>,
        sessions: Arc<InMemorySessionStore>,
        settings: EngineSettings,
    ) -> Self {
        let (sender, events) = EventSender::channel(256);
        let engine = ScanSession::new(store.clone(), sessions.clone(), Arc::new(sender), settings);
        Self {
            engine,
            store,
            sessions,
            events,
        }
    }

    /// Everything emitted so far.
    pub fn drain_events(&mut self) -> Vec<IntakeEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }
}

/// "TRK1" declaring SKU-A x3 and SKU-B x2, with return orders for LPNs A1..A6 (SKU-A)
/// and B1..B2 (SKU-B).
pub fn trk1_store() -> Arc<InMemoryInboundStore> {
    let store = Arc::new(InMemoryInboundStore::new());
    store.insert_shipment_line(
        ShipmentLine::declared(TRACKING, "ORD-100", "SKU-A", "Desk Lamp", 3).with_carrier("UPS"),
    );
    store.insert_shipment_line(
        ShipmentLine::declared(TRACKING, "ORD-100", "SKU-B", "Lamp Shade", 2).with_carrier("UPS"),
    );
    for n in 1..=6 {
        store.insert_order(OrderRecord::new(
            "ORD-100",
            format!("A{n}"),
            "SKU-A",
            "Desk Lamp",
        ));
    }
    for n in 1..=2 {
        store.insert_order(OrderRecord::new(
            "ORD-100",
            format!("B{n}"),
            "SKU-B",
            "Lamp Shade",
        ));
    }
    store.insert_parts("SKU-A", ["Base", "Arm", "Bulb"]);
    store
}

pub async fn lines_for(store: &InMemoryInboundStore, tracking: &str) -> Vec<ShipmentLine> {
    store
        .find_shipment_lines(&NormalizedKey::new(tracking))
        .await
        .unwrap()
}
