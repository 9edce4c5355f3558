use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outbound application state machine.
///
/// ```text
/// PENDING ──► APPROVED ──► OUTBOUND
///    │            │
///    ├──► REJECTED│
///    └────────────┴──► CANCELLED
/// ```
///
/// OUTBOUND, REJECTED, and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Outbound,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Outbound => "OUTBOUND",
            ApplicationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ApplicationStatus::Pending),
            "APPROVED" => Some(ApplicationStatus::Approved),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            "OUTBOUND" => Some(ApplicationStatus::Outbound),
            "CANCELLED" => Some(ApplicationStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Outbound | ApplicationStatus::Rejected | ApplicationStatus::Cancelled
        )
    }

    pub fn can_transition(&self, to: ApplicationStatus) -> bool {
        matches!(
            (self, to),
            (ApplicationStatus::Pending, ApplicationStatus::Approved)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
                | (ApplicationStatus::Pending, ApplicationStatus::Cancelled)
                | (ApplicationStatus::Approved, ApplicationStatus::Outbound)
                | (ApplicationStatus::Approved, ApplicationStatus::Cancelled)
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbound_applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_number: String,
    pub applicant_id: i64,
    pub department: String,
    pub purpose: String,
    /// ApplicationStatus stored as string
    pub status: String,
    pub approver_id: Option<i64>,
    pub second_approver_id: Option<i64>,
    pub approved_at: Option<DateTimeUtc>,
    pub reject_reason: Option<String>,
    pub issued_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::outbound_application_line::Entity")]
    Lines,
}

impl Related<super::outbound_application_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
