use crate::{
    commands::Command,
    errors::IntakeError,
    events::{EventSender, IntakeEvent},
    repositories::InboundStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Marks a flagged declaration as reviewed so it drops out of the unconfirmed view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmDuplicateCommand {
    pub line_id: Uuid,
}

#[async_trait::async_trait]
impl Command for ConfirmDuplicateCommand {
    type Result = Uuid;

    #[instrument(skip(self, store, event_sender))]
    async fn execute(
        &self,
        store: Arc<dyn InboundStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, IntakeError> {
        store
            .set_duplicate_confirmed(self.line_id, true)
            .await
            .map_err(|e| match e {
                crate::repositories::StoreError::NotFound(msg) => IntakeError::NotFound(msg),
                other => IntakeError::from(other),
            })?;

        event_sender
            .send_or_log(IntakeEvent::DuplicateConfirmed(self.line_id));

        info!(line_id = %self.line_id, "Duplicate declaration confirmed");
        Ok(self.line_id)
    }
}
