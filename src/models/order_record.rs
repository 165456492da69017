use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `return_orders` table: marketplace return orders keyed by the LPN printed for the unit.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "return_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_number: String,

    pub lpn: String,

    /// Normalized form of `lpn`, used for lookups.
    #[serde(skip)]
    pub lpn_key: String,

    pub sku: String,

    pub product_name: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(
        order_number: impl Into<String>,
        lpn: impl Into<String>,
        sku: impl Into<String>,
        product_name: impl Into<String>,
    ) -> Self {
        let lpn = lpn.into();
        let lpn_key = crate::intake::normalize::normalize_identifier(&lpn);
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.into(),
            lpn,
            lpn_key,
            sku: sku.into(),
            product_name: product_name.into(),
            created_at: Utc::now(),
        }
    }
}
