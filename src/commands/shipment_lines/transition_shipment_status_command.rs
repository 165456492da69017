use crate::{
    commands::Command,
    errors::IntakeError,
    events::{EventSender, IntakeEvent},
    models::ShipmentStatus,
    repositories::InboundStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Moves every line of a shipment group to `status`, optionally writing an audit note.
///
/// Shared by package completion, force completion and deletion reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransitionShipmentStatusCommand {
    #[validate(length(min = 1, message = "Tracking number cannot be empty"))]
    pub tracking_number: String,
    #[validate(length(min = 1, message = "At least one shipment line is required"))]
    pub line_ids: Vec<Uuid>,
    pub status: ShipmentStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionShipmentStatusResult {
    pub tracking_number: String,
    pub updated: usize,
    pub status: ShipmentStatus,
}

#[async_trait::async_trait]
impl Command for TransitionShipmentStatusCommand {
    type Result = TransitionShipmentStatusResult;

    #[instrument(skip(self, store, event_sender), fields(tracking = %self.tracking_number, status = %self.status))]
    async fn execute(
        &self,
        store: Arc<dyn InboundStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, IntakeError> {
        self.validate()?;

        for line_id in &self.line_ids {
            store
                .update_shipment_line_status(*line_id, self.status, self.note.clone())
                .await
                .map_err(|e| {
                    error!(line_id = %line_id, error = %e, "Failed to update shipment line status");
                    IntakeError::from(e)
                })?;

            event_sender
                .send_or_log(IntakeEvent::ShipmentStatusChanged {
                    line_id: *line_id,
                    status: self.status,
                });
        }

        info!(lines = self.line_ids.len(), "Shipment lines transitioned");
        Ok(TransitionShipmentStatusResult {
            tracking_number: self.tracking_number.clone(),
            updated: self.line_ids.len(),
            status: self.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShipmentLine;
    use crate::repositories::InMemoryInboundStore;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn updates_every_line_with_note() {
        let store = Arc::new(InMemoryInboundStore::new());
        let a = ShipmentLine::declared("TRK1", "ORD-1", "SKU-A", "Widget", 3);
        let b = ShipmentLine::declared("TRK1", "ORD-1", "SKU-B", "Gadget", 2);
        store.insert_shipment_line(a.clone());
        store.insert_shipment_line(b.clone());
        let (sender, _rx) = EventSender::channel(8);

        let result = TransitionShipmentStatusCommand {
            tracking_number: "TRK1".into(),
            line_ids: vec![a.id, b.id],
            status: ShipmentStatus::Inbound,
            note: Some("done".into()),
        }
        .execute(store.clone(), Arc::new(sender))
        .await
        .unwrap();

        assert_eq!(result.updated, 2);
        for id in [a.id, b.id] {
            let line = store.shipment_line(id).unwrap();
            assert_eq!(line.status, ShipmentStatus::Inbound);
            assert_eq!(line.note.as_deref(), Some("done"));
        }
    }

    #[tokio::test]
    async fn empty_line_set_is_rejected() {
        let store: Arc<dyn InboundStore> = Arc::new(InMemoryInboundStore::new());
        let (sender, _rx) = EventSender::channel(1);
        let result = TransitionShipmentStatusCommand {
            tracking_number: "TRK1".into(),
            line_ids: vec![],
            status: ShipmentStatus::Inbound,
            note: None,
        }
        .execute(store, Arc::new(sender))
        .await;
        assert_matches!(result, Err(IntakeError::Validation(_)));
    }
}
