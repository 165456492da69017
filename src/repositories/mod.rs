use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::intake::normalize::NormalizedKey;
use crate::models::{Grade, InboundRecord, OrderRecord, ShipmentLine, ShipmentStatus};

pub mod in_memory;
pub mod sea_orm_store;

pub use in_memory::InMemoryInboundStore;
pub use sea_orm_store::SeaOrmInboundStore;

/// Errors raised by an [`InboundStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store already holds a record for this LPN.
    #[error("Inbound record already exists for LPN {lpn}")]
    UniqueViolation { lpn: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl StoreError {
    /// Maps a SeaORM error, recognising unique-constraint violations on `lpn`.
    pub fn from_db(err: DbErr, lpn: Option<&str>) -> Self {
        match (err.sql_err(), lpn) {
            (Some(SqlErr::UniqueConstraintViolation(_)), Some(lpn)) => StoreError::UniqueViolation {
                lpn: lpn.to_string(),
            },
            _ => StoreError::Database(err),
        }
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        StoreError::from_db(err, None)
    }
}

/// Payload for committing one scanned unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewInboundRecord {
    #[validate(length(min = 1, message = "LPN cannot be empty"))]
    pub lpn: String,
    pub shipment_line_id: Uuid,
    #[validate(length(min = 1, message = "Tracking number cannot be empty"))]
    pub tracking_number: String,
    #[validate(length(min = 1, message = "SKU cannot be empty"))]
    pub sku: String,
    pub grade: Grade,
    pub missing_parts: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

/// Narrow interface onto the shared data store.
///
/// Every count and existence query must be answered live. The engine relies on these
/// answers for admission and completion decisions while other devices may be committing
/// against the same tracking number.
#[async_trait]
pub trait InboundStore: Send + Sync {
    /// Declared lines whose tracking number normalizes to `tracking`.
    async fn find_shipment_lines(
        &self,
        tracking: &NormalizedKey,
    ) -> Result<Vec<ShipmentLine>, StoreError>;

    /// Every declared line, for duplicate review.
    async fn list_shipment_lines(&self) -> Result<Vec<ShipmentLine>, StoreError>;

    async fn count_inbounded_by_tracking(&self, tracking: &NormalizedKey)
        -> Result<u64, StoreError>;

    async fn count_inbounded_by_sku_and_tracking(
        &self,
        tracking: &NormalizedKey,
        sku: &NormalizedKey,
    ) -> Result<u64, StoreError>;

    async fn find_orders_by_lpn(&self, lpn: &NormalizedKey) -> Result<Vec<OrderRecord>, StoreError>;

    async fn exists_inbound_record(&self, lpn: &NormalizedKey) -> Result<bool, StoreError>;

    /// Inserts the record. A duplicate LPN must surface as [`StoreError::UniqueViolation`].
    async fn create_inbound_record(
        &self,
        record: NewInboundRecord,
    ) -> Result<InboundRecord, StoreError>;

    async fn update_shipment_line_status(
        &self,
        line_id: Uuid,
        status: ShipmentStatus,
        note: Option<String>,
    ) -> Result<(), StoreError>;

    async fn set_duplicate_confirmed(&self, line_id: Uuid, confirmed: bool)
        -> Result<(), StoreError>;

    /// Parts checklist for a SKU, in display order.
    async fn find_product_parts(&self, sku: &NormalizedKey) -> Result<Vec<String>, StoreError>;
}
