use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle of a declared shipment line.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShipmentStatus {
    #[sea_orm(string_value = "shipping")]
    Shipping,
    #[sea_orm(string_value = "arrived")]
    Arrived,
    #[sea_orm(string_value = "inbound")]
    Inbound,
    #[sea_orm(string_value = "shelved")]
    Shelved,
}

/// The `shipment_lines` table: one declared (SKU, quantity) expectation under a tracking number.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "shipment_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Carrier tracking number as declared.
    #[validate(length(min = 1, max = 100, message = "Tracking number must be 1-100 characters"))]
    pub tracking_number: String,

    /// Normalized form of `tracking_number`, used for lookups.
    #[serde(skip)]
    pub tracking_key: String,

    /// Marketplace order identifier the line was declared against.
    pub order_id: String,

    #[validate(length(min = 1, message = "SKU cannot be empty"))]
    pub sku: String,

    /// Marketplace fulfillment SKU, when the manifest carries one.
    pub fnsku: Option<String>,

    /// Product name as declared on the manifest.
    pub declared_name: String,

    #[validate(range(min = 1, message = "Declared quantity must be positive"))]
    pub quantity: i32,

    pub status: ShipmentStatus,

    pub carrier: Option<String>,

    /// Operator has reviewed this line's duplicate flag and accepted it.
    pub duplicate_confirmed: bool,

    /// Audit note written by completion, force-completion or reconciliation.
    pub note: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inbound_record::Entity")]
    InboundRecords,
}

impl Related<super::inbound_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InboundRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Builds a freshly declared line in `shipping` status.
    pub fn declared(
        tracking_number: impl Into<String>,
        order_id: impl Into<String>,
        sku: impl Into<String>,
        declared_name: impl Into<String>,
        quantity: i32,
    ) -> Self {
        let tracking_number = tracking_number.into();
        let tracking_key = crate::intake::normalize::normalize_identifier(&tracking_number);
        Self {
            id: Uuid::new_v4(),
            tracking_number,
            tracking_key,
            order_id: order_id.into(),
            sku: sku.into(),
            fnsku: None,
            declared_name: declared_name.into(),
            quantity,
            status: ShipmentStatus::Shipping,
            carrier: None,
            duplicate_confirmed: false,
            note: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn with_fnsku(mut self, fnsku: impl Into<String>) -> Self {
        self.fnsku = Some(fnsku.into());
        self
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = Some(carrier.into());
        self
    }

    pub fn with_status(mut self, status: ShipmentStatus) -> Self {
        self.status = status;
        self
    }

    /// SKU used for duplicate detection: the FNSKU when present, otherwise the SKU.
    pub fn sku_or_fnsku(&self) -> &str {
        match self.fnsku.as_deref() {
            Some(fnsku) if !fnsku.trim().is_empty() => fnsku,
            _ => &self.sku,
        }
    }

    /// Declared quantity clamped at zero.
    pub fn declared_quantity(&self) -> u64 {
        u64::try_from(self.quantity).unwrap_or(0)
    }

    /// The line's note with `note` added on a new line. Earlier audit notes are kept.
    pub fn appended_note(&self, note: &str) -> String {
        match self.note.as_deref().map(str::trim_end) {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
            _ => note.to_string(),
        }
    }
}
