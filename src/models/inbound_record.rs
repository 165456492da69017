use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Post-inspection condition assigned at intake.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(1))")]
#[strum(ascii_case_insensitive)]
pub enum Grade {
    #[default]
    #[sea_orm(string_value = "A")]
    A,
    #[sea_orm(string_value = "B")]
    B,
    #[sea_orm(string_value = "C")]
    C,
}

/// The `inbound_records` table. One row per physical unit; `lpn` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inbound_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Normalized license-plate number.
    #[sea_orm(unique)]
    pub lpn: String,

    pub shipment_line_id: Uuid,

    /// Normalized tracking number of the package the unit arrived in.
    pub tracking_number: String,

    /// Confirmed SKU the unit was committed under, normalized.
    pub sku: String,

    pub grade: Grade,

    /// Missing parts recorded at inspection, as a JSON array of part names.
    pub missing_parts: Json,

    pub processed_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment_line::Entity",
        from = "Column::ShipmentLineId",
        to = "super::shipment_line::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    ShipmentLine,
}

impl Related<super::shipment_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Missing parts decoded from the JSON column. Malformed entries are skipped.
    pub fn missing_parts(&self) -> Vec<String> {
        self.missing_parts
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}
