use crate::{errors::IntakeError, events::EventSender, repositories::InboundStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Command trait for store mutations made on behalf of the intake engine.
///
/// Each command validates its own payload, performs the mutation through the
/// [`InboundStore`] and publishes the matching audit event.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `store` - Authoritative data store
    /// * `event_sender` - Channel to publish intake events
    async fn execute(
        &self,
        store: Arc<dyn InboundStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, IntakeError>;
}

pub mod inbound;
pub mod shipment_lines;

pub use inbound::commit_inbound_record_command::CommitInboundRecordCommand;
pub use shipment_lines::confirm_duplicate_command::ConfirmDuplicateCommand;
pub use shipment_lines::transition_shipment_status_command::{
    TransitionShipmentStatusCommand, TransitionShipmentStatusResult,
};
