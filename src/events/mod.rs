use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::ShipmentStatus;

/// Audit trail of what the intake engine did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntakeEvent {
    TrackingMatched {
        tracking_number: String,
        declared: u64,
        inbounded: u64,
    },
    LpnCommitted {
        lpn: String,
        tracking_number: String,
        sku: String,
        shipment_line_id: Uuid,
    },
    OverQuantityDetected {
        tracking_number: String,
        declared: u64,
        inbounded: u64,
    },
    SkuMismatchDetected {
        lpn: String,
        shipment_sku: String,
        candidate_skus: Vec<String>,
        order_sku_missing: bool,
    },
    PackageCompleted {
        tracking_number: String,
        declared: u64,
        inbounded: u64,
    },
    PackageForceCompleted {
        tracking_number: String,
        declared: u64,
        inbounded: u64,
        note: String,
    },
    ShipmentStatusChanged {
        line_id: Uuid,
        status: ShipmentStatus,
    },
    ShipmentStatusReverted {
        tracking_number: String,
        line_ids: Vec<Uuid>,
        note: String,
    },
    SessionResumed {
        tracking_number: String,
        saved_at: DateTime<Utc>,
    },
    SessionReset {
        tracking_number: Option<String>,
    },
    DuplicateConfirmed(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<IntakeEvent>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<IntakeEvent>) -> Self {
        Self { sender }
    }

    /// Builds a sender plus the receiver to hand to [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<IntakeEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: IntakeEvent) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends without waiting. A full or closed audit channel drops the event
    /// with a warning and never stalls intake.
    pub fn send_or_log(&self, event: IntakeEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                counter!("returns_intake.events.dropped", 1);
                warn!(event = ?event, "Event channel full, dropping intake event");
            }
            Err(TrySendError::Closed(event)) => {
                counter!("returns_intake.events.dropped", 1);
                warn!(event = ?event, "Event channel closed, dropping intake event");
            }
        }
    }
}

/// Drains the channel and writes every event to the log.
pub async fn process_events(mut rx: mpsc::Receiver<IntakeEvent>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            IntakeEvent::OverQuantityDetected {
                tracking_number,
                declared,
                inbounded,
            } => {
                warn!(
                    tracking = %tracking_number,
                    declared,
                    inbounded,
                    "Over-quantity scan recorded"
                );
            }
            IntakeEvent::PackageForceCompleted {
                tracking_number,
                note,
                ..
            } => {
                warn!(tracking = %tracking_number, note = %note, "Package force completed");
            }
            IntakeEvent::ShipmentStatusReverted {
                tracking_number,
                note,
                ..
            } => {
                warn!(tracking = %tracking_number, note = %note, "Shipment status reverted");
            }
            other => {
                info!(event = ?other, "Intake event");
            }
        }
    }

    warn!("Event processing loop has ended");
}
