use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        drug,
        outbound_application::{self, ApplicationStatus, Entity as OutboundApplication},
        outbound_application_line::{self, Entity as OutboundApplicationLine},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        approval, fulfillment,
        sequencer::{DocumentKind, DocumentSequencer},
        stock_ledger::StockLedger,
    },
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewOutboundApplication {
    pub applicant_id: i64,
    #[validate(length(min = 1, message = "department is required"))]
    pub department: String,
    #[validate(length(min = 1, message = "purpose is required"))]
    pub purpose: String,
    #[validate(length(min = 1, message = "an application needs at least one line"))]
    pub lines: Vec<NewOutboundLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewOutboundLine {
    pub drug_id: i64,
    /// Pins the line to one batch; unpinned lines are satisfied FIFO at
    /// execution time.
    pub batch_number: Option<String>,
    pub quantity: i32,
}

/// What actually leaves the warehouse for one application line.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundExecutionLine {
    pub drug_id: i64,
    pub batch_number: Option<String>,
    pub actual_quantity: i32,
}

/// Outbound application lifecycle: create → approve/reject → execute, with
/// cancellation from the two non-terminal states. Execution is
/// all-or-nothing across every line.
#[derive(Clone)]
pub struct OutboundService {
    db: Arc<DbPool>,
    sequencer: DocumentSequencer,
    event_sender: Option<EventSender>,
}

impl OutboundService {
    pub fn new(
        db: Arc<DbPool>,
        sequencer: DocumentSequencer,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            sequencer,
            event_sender,
        }
    }

    /// Creates a pending application with its lines under a fresh `OUT`
    /// number.
    #[instrument(skip(self, input), fields(applicant_id = input.applicant_id))]
    pub async fn create_application(
        &self,
        input: NewOutboundApplication,
    ) -> Result<outbound_application::Model, ServiceError> {
        input.validate()?;
        for (i, line) in input.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "line {}: quantity must be greater than zero",
                    i + 1
                )));
            }
        }

        let application = self
            .sequencer
            .execute_with_retry(|| self.try_create_application(&input))
            .await?;

        info!(
            application_number = %application.application_number,
            "outbound application created"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OutboundApplicationCreated {
                    application_number: application.application_number.clone(),
                    applicant_id: application.applicant_id,
                })
                .await;
        }
        Ok(application)
    }

    async fn try_create_application(
        &self,
        input: &NewOutboundApplication,
    ) -> Result<outbound_application::Model, ServiceError> {
        let txn = self.db.begin().await?;

        for line in &input.lines {
            drug::Entity::find_by_id(line.drug_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("drug {} not found", line.drug_id)))?;
        }

        let number = self
            .sequencer
            .next_number(&txn, DocumentKind::Outbound)
            .await?;
        let now = Utc::now();

        let application = outbound_application::ActiveModel {
            application_number: Set(number),
            applicant_id: Set(input.applicant_id),
            department: Set(input.department.clone()),
            purpose: Set(input.purpose.clone()),
            status: Set(ApplicationStatus::Pending.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for line in &input.lines {
            outbound_application_line::ActiveModel {
                application_id: Set(application.id),
                drug_id: Set(line.drug_id),
                batch_number: Set(line.batch_number.clone()),
                requested_quantity: Set(line.quantity),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(application)
    }

    /// Approves a pending application. The approver must not be the
    /// applicant; when any line is a special drug, a distinct second
    /// approver must countersign.
    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        application_id: i64,
        approver_id: i64,
        second_approver_id: Option<i64>,
    ) -> Result<(), ServiceError> {
        let application = self.load_application(application_id).await?;
        let status = parse_status(&application)?;
        if !status.can_transition(ApplicationStatus::Approved) {
            return Err(ServiceError::StateConflict(format!(
                "application {} is {}, only pending applications can be approved",
                application_id, application.status
            )));
        }

        approval::require_distinct_actors(
            application.applicant_id,
            approver_id,
            "applicant and approver",
        )?;

        let lines = self.application_lines(application_id).await?;
        let mut has_special_drug = false;
        for line in &lines {
            let drug = drug::Entity::find_by_id(line.drug_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("drug {} not found", line.drug_id)))?;
            if drug.is_special {
                has_special_drug = true;
                break;
            }
        }

        if has_special_drug {
            approval::require_second_actor(true, approver_id, second_approver_id)?;
            if let Some(second) = second_approver_id {
                approval::require_distinct_actors(
                    application.applicant_id,
                    second,
                    "applicant and second approver",
                )?;
            }
        }

        let mut active: outbound_application::ActiveModel = application.into();
        active.status = Set(ApplicationStatus::Approved.as_str().to_string());
        active.approver_id = Set(Some(approver_id));
        active.second_approver_id = Set(second_approver_id);
        active.approved_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(application_id, approver_id, "outbound application approved");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OutboundApplicationApproved {
                    application_id,
                    approver_id,
                    second_approver_id,
                })
                .await;
        }
        Ok(())
    }

    /// Rejects a pending application with a mandatory reason.
    #[instrument(skip(self))]
    pub async fn reject(
        &self,
        application_id: i64,
        approver_id: i64,
        reason: &str,
    ) -> Result<(), ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a rejection reason is required".to_string(),
            ));
        }

        let application = self.load_application(application_id).await?;
        let status = parse_status(&application)?;
        if !status.can_transition(ApplicationStatus::Rejected) {
            return Err(ServiceError::StateConflict(format!(
                "application {} is {}, only pending applications can be rejected",
                application_id, application.status
            )));
        }

        let mut active: outbound_application::ActiveModel = application.into();
        active.status = Set(ApplicationStatus::Rejected.as_str().to_string());
        active.approver_id = Set(Some(approver_id));
        active.reject_reason = Set(Some(reason.to_string()));
        active.approved_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(application_id, approver_id, "outbound application rejected");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OutboundApplicationRejected {
                    application_id,
                    approver_id,
                })
                .await;
        }
        Ok(())
    }

    /// Cancels a pending or approved application.
    #[instrument(skip(self))]
    pub async fn cancel(&self, application_id: i64) -> Result<(), ServiceError> {
        let application = self.load_application(application_id).await?;
        let status = parse_status(&application)?;
        if !status.can_transition(ApplicationStatus::Cancelled) {
            return Err(ServiceError::StateConflict(format!(
                "application {} is {} and can no longer be cancelled",
                application_id, application.status
            )));
        }

        let mut active: outbound_application::ActiveModel = application.into();
        active.status = Set(ApplicationStatus::Cancelled.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(application_id, "outbound application cancelled");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OutboundApplicationCancelled { application_id })
                .await;
        }
        Ok(())
    }

    /// Issues stock for an approved application. Pinned lines draw from
    /// their batch; unpinned lines are satisfied first-expiring-first-out.
    /// Every line succeeds or the whole execution rolls back untouched.
    #[instrument(skip(self, execution_lines))]
    pub async fn execute(
        &self,
        application_id: i64,
        execution_lines: Vec<OutboundExecutionLine>,
    ) -> Result<outbound_application::Model, ServiceError> {
        if execution_lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "execution needs at least one line".to_string(),
            ));
        }

        let application = self.load_application(application_id).await?;
        let status = parse_status(&application)?;
        if !status.can_transition(ApplicationStatus::Outbound) {
            return Err(ServiceError::StateConflict(format!(
                "application {} is {}, only approved applications can be executed",
                application_id, application.status
            )));
        }

        let application_lines = self.application_lines(application_id).await?;

        let txn = self.db.begin().await?;

        for (i, execution) in execution_lines.iter().enumerate() {
            if execution.actual_quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "line {}: actual quantity must be greater than zero",
                    i + 1
                )));
            }

            let line = application_lines
                .iter()
                .find(|l| l.drug_id == execution.drug_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "application {} has no line for drug {}",
                        application_id, execution.drug_id
                    ))
                })?;

            let pinned_batch = execution
                .batch_number
                .as_deref()
                .or(line.batch_number.as_deref());

            match pinned_batch {
                Some(batch_number) => {
                    StockLedger::decrease_in(
                        &txn,
                        execution.drug_id,
                        batch_number,
                        execution.actual_quantity,
                    )
                    .await?;
                    debug!(
                        drug_id = execution.drug_id,
                        batch = %batch_number,
                        quantity = execution.actual_quantity,
                        "issued from pinned batch"
                    );
                }
                None => {
                    let takes = fulfillment::consume_in(
                        &txn,
                        execution.drug_id,
                        execution.actual_quantity,
                    )
                    .await?;
                    debug!(drug_id = execution.drug_id, ?takes, "issued FIFO");
                }
            }

            let mut active: outbound_application_line::ActiveModel = line.clone().into();
            active.actual_quantity = Set(Some(execution.actual_quantity));
            active.update(&txn).await?;
        }

        let mut active: outbound_application::ActiveModel = application.into();
        active.status = Set(ApplicationStatus::Outbound.as_str().to_string());
        active.issued_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(application_id, "outbound executed");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OutboundExecuted { application_id })
                .await;
        }
        Ok(updated)
    }

    pub async fn get_application(
        &self,
        application_id: i64,
    ) -> Result<outbound_application::Model, ServiceError> {
        self.load_application(application_id).await
    }

    pub async fn application_lines(
        &self,
        application_id: i64,
    ) -> Result<Vec<outbound_application_line::Model>, ServiceError> {
        Ok(OutboundApplicationLine::find()
            .filter(outbound_application_line::Column::ApplicationId.eq(application_id))
            .all(&*self.db)
            .await?)
    }

    /// Applications waiting for a decision.
    pub async fn pending_count(&self) -> Result<u64, ServiceError> {
        use sea_orm::PaginatorTrait;

        Ok(OutboundApplication::find()
            .filter(
                outbound_application::Column::Status.eq(ApplicationStatus::Pending.as_str()),
            )
            .count(&*self.db)
            .await?)
    }

    async fn load_application(
        &self,
        application_id: i64,
    ) -> Result<outbound_application::Model, ServiceError> {
        OutboundApplication::find_by_id(application_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "outbound application {} not found",
                    application_id
                ))
            })
    }
}

fn parse_status(
    application: &outbound_application::Model,
) -> Result<ApplicationStatus, ServiceError> {
    ApplicationStatus::parse(&application.status).ok_or_else(|| {
        ServiceError::InternalError(format!(
            "application {} carries unknown status {:?}",
            application.id, application.status
        ))
    })
}
