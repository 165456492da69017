use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::{InboundStore, NewInboundRecord, StoreError};
use crate::intake::normalize::{normalize_identifier, NormalizedKey};
use crate::models::{
    inbound_record, order_record, product_part, shipment_line, InboundRecord, OrderRecord,
    ProductPart, ShipmentLine, ShipmentStatus,
};

/// [`InboundStore`] backed by a SeaORM connection. Every call is a live query.
#[derive(Debug, Clone)]
pub struct SeaOrmInboundStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmInboundStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Imports a declared line, deriving its lookup key.
    pub async fn insert_shipment_line(&self, line: ShipmentLine) -> Result<ShipmentLine, StoreError> {
        let mut line = line;
        line.tracking_key = normalize_identifier(&line.tracking_number);
        shipment_line::ActiveModel::from(line)
            .reset_all()
            .insert(self.db())
            .await
            .map_err(StoreError::from)
    }

    pub async fn insert_order(&self, order: OrderRecord) -> Result<OrderRecord, StoreError> {
        let mut order = order;
        order.lpn_key = normalize_identifier(&order.lpn);
        order_record::ActiveModel::from(order)
            .reset_all()
            .insert(self.db())
            .await
            .map_err(StoreError::from)
    }

    pub async fn insert_part(&self, part: ProductPart) -> Result<ProductPart, StoreError> {
        let mut part = part;
        part.sku_key = normalize_identifier(&part.sku);
        product_part::ActiveModel::from(part)
            .reset_all()
            .insert(self.db())
            .await
            .map_err(StoreError::from)
    }

    /// Deletes a committed record by LPN. Returns the number of rows removed.
    pub async fn delete_inbound_record(&self, lpn: &NormalizedKey) -> Result<u64, StoreError> {
        let result = inbound_record::Entity::delete_many()
            .filter(inbound_record::Column::Lpn.eq(lpn.as_str()))
            .exec(self.db())
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected)
    }

    async fn find_line(&self, line_id: Uuid) -> Result<ShipmentLine, StoreError> {
        shipment_line::Entity::find_by_id(line_id)
            .one(self.db())
            .await
            .map_err(StoreError::from)?
            .ok_or_else(|| StoreError::NotFound(format!("Shipment line {} not found", line_id)))
    }
}

#[async_trait]
impl InboundStore for SeaOrmInboundStore {
    async fn find_shipment_lines(
        &self,
        tracking: &NormalizedKey,
    ) -> Result<Vec<ShipmentLine>, StoreError> {
        shipment_line::Entity::find()
            .filter(shipment_line::Column::TrackingKey.eq(tracking.as_str()))
            .order_by_asc(shipment_line::Column::CreatedAt)
            .all(self.db())
            .await
            .map_err(|e| {
                error!(tracking = %tracking, error = %e, "Failed to load shipment lines");
                StoreError::from(e)
            })
    }

    async fn list_shipment_lines(&self) -> Result<Vec<ShipmentLine>, StoreError> {
        shipment_line::Entity::find()
            .order_by_asc(shipment_line::Column::CreatedAt)
            .all(self.db())
            .await
            .map_err(StoreError::from)
    }

    async fn count_inbounded_by_tracking(
        &self,
        tracking: &NormalizedKey,
    ) -> Result<u64, StoreError> {
        inbound_record::Entity::find()
            .filter(inbound_record::Column::TrackingNumber.eq(tracking.as_str()))
            .count(self.db())
            .await
            .map_err(StoreError::from)
    }

    async fn count_inbounded_by_sku_and_tracking(
        &self,
        tracking: &NormalizedKey,
        sku: &NormalizedKey,
    ) -> Result<u64, StoreError> {
        inbound_record::Entity::find()
            .filter(inbound_record::Column::TrackingNumber.eq(tracking.as_str()))
            .filter(inbound_record::Column::Sku.eq(sku.as_str()))
            .count(self.db())
            .await
            .map_err(StoreError::from)
    }

    async fn find_orders_by_lpn(&self, lpn: &NormalizedKey) -> Result<Vec<OrderRecord>, StoreError> {
        order_record::Entity::find()
            .filter(order_record::Column::LpnKey.eq(lpn.as_str()))
            .order_by_asc(order_record::Column::CreatedAt)
            .all(self.db())
            .await
            .map_err(StoreError::from)
    }

    async fn exists_inbound_record(&self, lpn: &NormalizedKey) -> Result<bool, StoreError> {
        let count = inbound_record::Entity::find()
            .filter(inbound_record::Column::Lpn.eq(lpn.as_str()))
            .count(self.db())
            .await
            .map_err(StoreError::from)?;
        Ok(count > 0)
    }

    async fn create_inbound_record(
        &self,
        record: NewInboundRecord,
    ) -> Result<InboundRecord, StoreError> {
        let lpn = normalize_identifier(&record.lpn);
        let active = inbound_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            lpn: Set(lpn.clone()),
            shipment_line_id: Set(record.shipment_line_id),
            tracking_number: Set(normalize_identifier(&record.tracking_number)),
            sku: Set(normalize_identifier(&record.sku)),
            grade: Set(record.grade),
            missing_parts: Set(serde_json::json!(record.missing_parts)),
            processed_at: Set(record.processed_at),
        };

        let created = active
            .insert(self.db())
            .await
            .map_err(|e| StoreError::from_db(e, Some(&lpn)))?;
        debug!(lpn = %created.lpn, "Inbound record inserted");
        Ok(created)
    }

    async fn update_shipment_line_status(
        &self,
        line_id: Uuid,
        status: ShipmentStatus,
        note: Option<String>,
    ) -> Result<(), StoreError> {
        let line = self.find_line(line_id).await?;
        let note = note.map(|note| line.appended_note(&note));
        let mut active: shipment_line::ActiveModel = line.into();
        active.status = Set(status);
        if let Some(note) = note {
            active.note = Set(Some(note));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.update(self.db()).await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn set_duplicate_confirmed(
        &self,
        line_id: Uuid,
        confirmed: bool,
    ) -> Result<(), StoreError> {
        let mut active: shipment_line::ActiveModel = self.find_line(line_id).await?.into();
        active.duplicate_confirmed = Set(confirmed);
        active.updated_at = Set(Some(Utc::now()));
        active.update(self.db()).await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn find_product_parts(&self, sku: &NormalizedKey) -> Result<Vec<String>, StoreError> {
        let parts = product_part::Entity::find()
            .filter(product_part::Column::SkuKey.eq(sku.as_str()))
            .order_by_asc(product_part::Column::Position)
            .all(self.db())
            .await
            .map_err(StoreError::from)?;
        Ok(parts.into_iter().map(|part| part.part_name).collect())
    }
}
