use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One batch of one drug. The (drug_id, batch_number) pair is unique; the
/// row is created by the first qualified receipt and never deleted, so a
/// batch may sit at quantity zero. Quantity is kept non-negative by the
/// ledger's conditional updates.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub drug_id: i64,
    pub batch_number: String,
    pub quantity: i32,
    pub expiry_date: Option<Date>,
    pub production_date: Option<Date>,
    pub storage_location: Option<String>,
    pub manufacturer: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::drug::Entity",
        from = "Column::DrugId",
        to = "super::drug::Column::Id"
    )]
    Drug,
}

impl Related<super::drug::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drug.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
