use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{drug, stock_adjustment},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        approval,
        sequencer::{DocumentKind, DocumentSequencer},
        stock_ledger::StockLedger,
    },
};

/// A manual correction of one batch's quantity to an absolute value.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewStockAdjustment {
    pub drug_id: i64,
    #[validate(length(min = 1, message = "batch number is required"))]
    pub batch_number: String,
    pub quantity_after: i32,
    #[validate(length(min = 1, message = "an adjustment reason is required"))]
    pub reason: String,
    pub operator_id: i64,
    pub second_operator_id: Option<i64>,
}

/// Records stock corrections: the before/after snapshot and derived delta go
/// into an append-only audit row, and the ledger is set to the new absolute
/// quantity in the same transaction.
#[derive(Clone)]
pub struct AdjustmentService {
    db: Arc<DbPool>,
    sequencer: DocumentSequencer,
    event_sender: Option<EventSender>,
}

impl AdjustmentService {
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

    #[instrument(skip(self, input), fields(drug_id = input.drug_id, batch = %input.batch_number))]
    pub async fn create_adjustment(
        &self,
        input: NewStockAdjustment,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        input.validate()?;
        if input.quantity_after < 0 {
            return Err(ServiceError::ValidationError(
                "adjusted quantity cannot be negative".to_string(),
            ));
        }

        let drug = drug::Entity::find_by_id(input.drug_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("drug {} not found", input.drug_id)))?;
        approval::require_second_actor(
            drug.is_special,
            input.operator_id,
            input.second_operator_id,
        )?;

        let adjustment = self
            .sequencer
            .execute_with_retry(|| self.try_create(&input))
            .await?;

        info!(
            adjustment_number = %adjustment.adjustment_number,
            quantity_before = adjustment.quantity_before,
            quantity_after = adjustment.quantity_after,
            delta = adjustment.adjustment_delta,
            "stock adjustment recorded"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockAdjusted {
                    adjustment_number: adjustment.adjustment_number.clone(),
                    drug_id: adjustment.drug_id,
                    batch_number: adjustment.batch_number.clone(),
                    quantity_before: adjustment.quantity_before,
                    quantity_after: adjustment.quantity_after,
                })
                .await;
        }
        Ok(adjustment)
    }

    /// One attempt: snapshot + audit row + absolute set in a single
    /// transaction, retried wholesale on a number collision.
    async fn try_create(
        &self,
        input: &NewStockAdjustment,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let batch = StockLedger::find_batch_in(&txn, input.drug_id, &input.batch_number)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "no stock batch for drug {} batch {}",
                    input.drug_id, input.batch_number
                ))
            })?;

        let number = self
            .sequencer
            .next_number(&txn, DocumentKind::Adjustment)
            .await?;

        let adjustment = stock_adjustment::ActiveModel {
            adjustment_number: Set(number),
            drug_id: Set(input.drug_id),
            batch_number: Set(input.batch_number.clone()),
            quantity_before: Set(batch.quantity),
            quantity_after: Set(input.quantity_after),
            adjustment_delta: Set(input.quantity_after - batch.quantity),
            reason: Set(input.reason.clone()),
            operator_id: Set(input.operator_id),
            second_operator_id: Set(input.second_operator_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        StockLedger::set_absolute_in(&txn, input.drug_id, &input.batch_number, input.quantity_after)
            .await?;

        txn.commit().await?;
        Ok(adjustment)
    }
}
