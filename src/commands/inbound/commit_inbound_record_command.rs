use crate::{
    commands::Command,
    errors::IntakeError,
    events::{EventSender, IntakeEvent},
    models::InboundRecord,
    repositories::{InboundStore, NewInboundRecord, StoreError},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

/// Writes one inbound record. The store's unique index on `lpn` is the final arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInboundRecordCommand {
    pub record: NewInboundRecord,
}

#[async_trait::async_trait]
impl Command for CommitInboundRecordCommand {
    type Result = InboundRecord;

    #[instrument(skip(self, store, event_sender), fields(lpn = %self.record.lpn))]
    async fn execute(
        &self,
        store: Arc<dyn InboundStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, IntakeError> {
        self.record.validate()?;

        let created = store
            .create_inbound_record(self.record.clone())
            .await
            .map_err(|e| {
                match &e {
                    StoreError::UniqueViolation { lpn } => {
                        warn!(lpn = %lpn, "LPN committed concurrently by another device")
                    }
                    other => error!(error = %other, "Failed to create inbound record"),
                }
                IntakeError::from(e)
            })?;

        event_sender
            .send_or_log(IntakeEvent::LpnCommitted {
                lpn: created.lpn.clone(),
                tracking_number: created.tracking_number.clone(),
                sku: created.sku.clone(),
                shipment_line_id: created.shipment_line_id,
            });

        info!(lpn = %created.lpn, sku = %created.sku, "Inbound record committed");
        Ok(created)
    }
}
