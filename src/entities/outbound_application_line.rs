use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One requested drug on an outbound application. `batch_number` pins the
/// line to a specific batch; unpinned lines are satisfied FIFO at execution
/// time. `actual_quantity` is stamped when the application is executed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbound_application_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    pub drug_id: i64,
    pub batch_number: Option<String>,
    pub requested_quantity: i32,
    pub actual_quantity: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::outbound_application::Entity",
        from = "Column::ApplicationId",
        to = "super::outbound_application::Column::Id"
    )]
    Application,
    #[sea_orm(
        belongs_to = "super::drug::Entity",
        from = "Column::DrugId",
        to = "super::drug::Column::Id"
    )]
    Drug,
}

impl Related<super::outbound_application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl Related<super::drug::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drug.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
