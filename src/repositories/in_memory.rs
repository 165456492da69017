use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{InboundStore, NewInboundRecord, StoreError};
use crate::intake::normalize::{normalize_identifier, NormalizedKey};
use crate::models::{InboundRecord, OrderRecord, ShipmentLine, ShipmentStatus};

#[derive(Debug, Default)]
struct StoreState {
    lines: Vec<ShipmentLine>,
    records: HashMap<String, InboundRecord>,
    orders: Vec<OrderRecord>,
    parts: HashMap<String, Vec<String>>,
}

/// Mutex-guarded store used by tests, demos and single-device setups.
///
/// LPN uniqueness is enforced on insert the same way the database's unique index does.
#[derive(Debug, Default)]
pub struct InMemoryInboundStore {
    state: Mutex<StoreState>,
}

impl InMemoryInboundStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn insert_shipment_line(&self, line: ShipmentLine) {
        let mut line = line;
        line.tracking_key = normalize_identifier(&line.tracking_number);
        self.state().lines.push(line);
    }

    pub fn insert_order(&self, order: OrderRecord) {
        let mut order = order;
        order.lpn_key = normalize_identifier(&order.lpn);
        self.state().orders.push(order);
    }

    pub fn insert_parts<I, S>(&self, sku: &str, parts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state()
            .parts
            .insert(normalize_identifier(sku), parts.into_iter().map(Into::into).collect());
    }

    /// Removes a committed record, as the external record-deletion screen would.
    pub fn delete_inbound_record(&self, lpn: &str) -> Option<InboundRecord> {
        self.state().records.remove(&normalize_identifier(lpn))
    }

    pub fn shipment_line(&self, id: Uuid) -> Option<ShipmentLine> {
        self.state().lines.iter().find(|line| line.id == id).cloned()
    }

    pub fn inbound_record(&self, lpn: &str) -> Option<InboundRecord> {
        self.state().records.get(&normalize_identifier(lpn)).cloned()
    }

    pub fn inbound_record_count(&self) -> usize {
        self.state().records.len()
    }
}

#[async_trait]
impl InboundStore for InMemoryInboundStore {
    async fn find_shipment_lines(
        &self,
        tracking: &NormalizedKey,
    ) -> Result<Vec<ShipmentLine>, StoreError> {
        Ok(self
            .state()
            .lines
            .iter()
            .filter(|line| line.tracking_key == tracking.as_str())
            .cloned()
            .collect())
    }

    async fn list_shipment_lines(&self) -> Result<Vec<ShipmentLine>, StoreError> {
        Ok(self.state().lines.clone())
    }

    async fn count_inbounded_by_tracking(
        &self,
        tracking: &NormalizedKey,
    ) -> Result<u64, StoreError> {
        let count = self
            .state()
            .records
            .values()
            .filter(|record| record.tracking_number == tracking.as_str())
            .count();
        Ok(count as u64)
    }

    async fn count_inbounded_by_sku_and_tracking(
        &self,
        tracking: &NormalizedKey,
        sku: &NormalizedKey,
    ) -> Result<u64, StoreError> {
        let count = self
            .state()
            .records
            .values()
            .filter(|record| {
                record.tracking_number == tracking.as_str() && record.sku == sku.as_str()
            })
            .count();
        Ok(count as u64)
    }

    async fn find_orders_by_lpn(&self, lpn: &NormalizedKey) -> Result<Vec<OrderRecord>, StoreError> {
        Ok(self
            .state()
            .orders
            .iter()
            .filter(|order| order.lpn_key == lpn.as_str())
            .cloned()
            .collect())
    }

    async fn exists_inbound_record(&self, lpn: &NormalizedKey) -> Result<bool, StoreError> {
        Ok(self.state().records.contains_key(lpn.as_str()))
    }

    async fn create_inbound_record(
        &self,
        record: NewInboundRecord,
    ) -> Result<InboundRecord, StoreError> {
        let lpn = normalize_identifier(&record.lpn);
        let mut state = self.state();
        if state.records.contains_key(&lpn) {
            return Err(StoreError::UniqueViolation { lpn });
        }

        let created = InboundRecord {
            id: Uuid::new_v4(),
            lpn: lpn.clone(),
            shipment_line_id: record.shipment_line_id,
            tracking_number: normalize_identifier(&record.tracking_number),
            sku: normalize_identifier(&record.sku),
            grade: record.grade,
            missing_parts: serde_json::json!(record.missing_parts),
            processed_at: record.processed_at,
        };
        state.records.insert(lpn, created.clone());
        Ok(created)
    }

    async fn update_shipment_line_status(
        &self,
        line_id: Uuid,
        status: ShipmentStatus,
        note: Option<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let line = state
            .lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or_else(|| StoreError::NotFound(format!("Shipment line {} not found", line_id)))?;
        line.status = status;
        if let Some(note) = note {
            line.note = Some(line.appended_note(&note));
        }
        line.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn set_duplicate_confirmed(
        &self,
        line_id: Uuid,
        confirmed: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let line = state
            .lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or_else(|| StoreError::NotFound(format!("Shipment line {} not found", line_id)))?;
        line.duplicate_confirmed = confirmed;
        line.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn find_product_parts(&self, sku: &NormalizedKey) -> Result<Vec<String>, StoreError> {
        Ok(self.state().parts.get(sku.as_str()).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grade;
    use assert_matches::assert_matches;

    fn record(lpn: &str, tracking: &str, sku: &str) -> NewInboundRecord {
        NewInboundRecord {
            lpn: lpn.to_string(),
            shipment_line_id: Uuid::new_v4(),
            tracking_number: tracking.to_string(),
            sku: sku.to_string(),
            grade: Grade::A,
            missing_parts: vec![],
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_lpn_is_a_unique_violation() {
        let store = InMemoryInboundStore::new();
        store.create_inbound_record(record("lpn1", "trk", "sku")).await.unwrap();

        let err = store
            .create_inbound_record(record(" LPN1 ", "trk", "sku"))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::UniqueViolation { lpn } if lpn == "LPN1");
    }

    #[tokio::test]
    async fn counts_are_scoped_by_tracking_and_sku() {
        let store = InMemoryInboundStore::new();
        store.create_inbound_record(record("L1", "trk1", "sku-a")).await.unwrap();
        store.create_inbound_record(record("L2", "trk1", "sku-b")).await.unwrap();
        store.create_inbound_record(record("L3", "trk2", "sku-a")).await.unwrap();

        let trk1 = NormalizedKey::new("TRK1");
        assert_eq!(store.count_inbounded_by_tracking(&trk1).await.unwrap(), 2);
        assert_eq!(
            store
                .count_inbounded_by_sku_and_tracking(&trk1, &NormalizedKey::new("SKU-A"))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn status_update_on_unknown_line_is_not_found() {
        let store = InMemoryInboundStore::new();
        let err = store
            .update_shipment_line_status(Uuid::new_v4(), ShipmentStatus::Inbound, None)
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::NotFound(_));
    }
}
