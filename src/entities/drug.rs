use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Drug master data. `is_special` marks controlled substances whose stock
/// operations require a second operator.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drugs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub specification: Option<String>,
    pub manufacturer: Option<String>,
    pub storage_location: Option<String>,
    pub is_special: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_batch::Entity")]
    StockBatches,
}

impl Related<super::stock_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockBatches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
