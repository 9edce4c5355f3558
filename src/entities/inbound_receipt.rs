use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Acceptance inspection outcome for a receipt. Only qualified receipts
/// touch the ledger and count toward purchase-order fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcceptanceStatus {
    #[default]
    Qualified,
    Unqualified,
}

impl AcceptanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptanceStatus::Qualified => "QUALIFIED",
            AcceptanceStatus::Unqualified => "UNQUALIFIED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUALIFIED" => Some(AcceptanceStatus::Qualified),
            "UNQUALIFIED" => Some(AcceptanceStatus::Unqualified),
            _ => None,
        }
    }
}

/// Immutable receipt event. `order_id` is set for purchase-order receipts
/// and absent for temporary (unplanned) intake.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inbound_receipts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub receipt_number: String,
    pub order_id: Option<i64>,
    pub drug_id: i64,
    pub batch_number: String,
    pub quantity: i32,
    pub expiry_date: Option<Date>,
    pub arrival_date: Date,
    pub production_date: Option<Date>,
    pub manufacturer: Option<String>,
    pub delivery_note_ref: Option<String>,
    pub operator_id: i64,
    pub second_operator_id: Option<i64>,
    /// AcceptanceStatus stored as string
    pub acceptance: String,
    /// Admission tier (PASS/WARNING/FORCE) stored as string
    pub expiry_tier: String,
    pub expiry_override_reason: Option<String>,
    pub warning_acknowledged: bool,
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
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::OrderId",
        to = "super::purchase_order::Column::Id"
    )]
    PurchaseOrder,
}

impl Related<super::drug::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drug.def()
    }
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
