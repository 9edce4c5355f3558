use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit row for a manual stock correction. The delta is
/// derived (`quantity_after - quantity_before`) at creation and the row is
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub adjustment_number: String,
    pub drug_id: i64,
    pub batch_number: String,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub adjustment_delta: i32,
    pub reason: String,
    pub operator_id: i64,
    pub second_operator_id: Option<i64>,
    pub created_at: DateTimeUtc,
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
