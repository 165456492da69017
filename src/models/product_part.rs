use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `product_parts` table: the parts checklist shown for a SKU during missing-parts entry.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_parts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub sku: String,

    #[serde(skip)]
    pub sku_key: String,

    pub part_name: String,

    /// Display order within the checklist.
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(sku: impl Into<String>, part_name: impl Into<String>, position: i32) -> Self {
        let sku = sku.into();
        let sku_key = crate::intake::normalize::normalize_identifier(&sku);
        Self {
            id: Uuid::new_v4(),
            sku,
            sku_key,
            part_name: part_name.into(),
            position,
        }
    }
}
