use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::{
    commands::{Command, TransitionShipmentStatusCommand},
    errors::IntakeError,
    events::{EventSender, IntakeEvent},
    intake::{force_completion::reversion_note, NormalizedKey},
    models::ShipmentStatus,
    repositories::InboundStore,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    pub tracking_number: String,
    pub declared: u64,
    pub inbounded: u64,
    /// Lines moved from `inbound` back to `arrived`.
    pub reverted: usize,
    pub note: Option<String>,
}

/// Re-checks a group after inbound records were deleted elsewhere.
///
/// Called by whatever deleted the records, with how many it deleted. Only a deletion that
/// takes the live count from at least the declared total to below it reverts the group:
/// every `inbound` line goes back to `arrived` with the new shortfall appended to its note,
/// using the same status command as package completion. A group that was already short
/// (force completed) keeps its status and note.
#[derive(Clone)]
pub struct ShipmentReconciler {
    store: Arc<dyn InboundStore>,
    event_sender: Arc<EventSender>,
}

impl ShipmentReconciler {
    pub fn new(store: Arc<dyn InboundStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        tracking_number: &str,
        deleted: u64,
    ) -> Result<ReconciliationOutcome, IntakeError> {
        let tracking = NormalizedKey::parse(tracking_number)
            .ok_or_else(|| IntakeError::InvalidInput("Tracking number is empty".to_string()))?;

        let lines = self.store.find_shipment_lines(&tracking).await?;
        if lines.is_empty() {
            return Err(IntakeError::NotFound(tracking.into_inner()));
        }
        let declared: u64 = lines.iter().map(|line| line.declared_quantity()).sum();
        let inbounded = self.store.count_inbounded_by_tracking(&tracking).await?;

        let inbound_ids: Vec<_> = lines
            .iter()
            .filter(|line| line.status == ShipmentStatus::Inbound)
            .map(|line| line.id)
            .collect();

        let dropped_below = inbounded < declared && inbounded + deleted >= declared;
        if !dropped_below || inbound_ids.is_empty() {
            debug!(tracking = %tracking, inbounded, declared, deleted, "Nothing to revert");
            return Ok(ReconciliationOutcome {
                tracking_number: tracking.into_inner(),
                declared,
                inbounded,
                reverted: 0,
                note: None,
            });
        }

        let note = reversion_note(declared, inbounded);
        let result = TransitionShipmentStatusCommand {
            tracking_number: tracking.to_string(),
            line_ids: inbound_ids.clone(),
            status: ShipmentStatus::Arrived,
            note: Some(note.clone()),
        }
        .execute(self.store.clone(), self.event_sender.clone())
        .await?;

        info!(tracking = %tracking, reverted = result.updated, inbounded, declared, "Shipment reverted to arrived");
        self.event_sender
            .send_or_log(IntakeEvent::ShipmentStatusReverted {
                tracking_number: tracking.to_string(),
                line_ids: inbound_ids,
                note: note.clone(),
            });

        Ok(ReconciliationOutcome {
            tracking_number: tracking.into_inner(),
            declared,
            inbounded,
            reverted: result.updated,
            note: Some(note),
        })
    }
}
