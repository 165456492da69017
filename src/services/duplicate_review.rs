use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::{Command, ConfirmDuplicateCommand},
    errors::IntakeError,
    events::EventSender,
    intake::duplicates::{flag_duplicates, DuplicateFilter},
    models::ShipmentLine,
    repositories::InboundStore,
};

/// A declared line surfaced by the duplicate filter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlaggedLine {
    pub line: ShipmentLine,
    pub confirmed: bool,
}

/// Advisory review of declared lines that share a declaration key. Never blocks import.
#[derive(Clone)]
pub struct DuplicateReview {
    store: Arc<dyn InboundStore>,
    event_sender: Arc<EventSender>,
}

impl DuplicateReview {
    pub fn new(store: Arc<dyn InboundStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: DuplicateFilter) -> Result<Vec<FlaggedLine>, IntakeError> {
        let lines = self.store.list_shipment_lines().await?;
        let flags = flag_duplicates(&lines);

        Ok(lines
            .into_iter()
            .zip(flags)
            .filter(|(_, flag)| filter.includes(flag))
            .map(|(line, flag)| FlaggedLine {
                line,
                confirmed: flag.confirmed,
            })
            .collect())
    }

    pub async fn confirm(&self, line_id: Uuid) -> Result<Uuid, IntakeError> {
        ConfirmDuplicateCommand { line_id }
            .execute(self.store.clone(), self.event_sender.clone())
            .await
    }
}
