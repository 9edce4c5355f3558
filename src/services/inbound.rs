use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        drug,
        inbound_receipt::{self, AcceptanceStatus, Entity as InboundReceipt},
        purchase_order::{self, OrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        admission::{self, ExpiryTier},
        approval,
        purchase_orders::PurchaseOrderService,
        sequencer::{DocumentKind, DocumentSequencer},
        settings::{self, SettingsProvider},
        stock_ledger::{StockLedger, StockReceipt},
    },
};

/// Typed receipt payload. The acceptance status defaults to QUALIFIED; an
/// UNQUALIFIED receipt is recorded for audit but never touches the ledger.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInboundReceipt {
    pub drug_id: i64,
    #[validate(length(min = 1, message = "batch number is required"))]
    pub batch_number: String,
    #[validate(range(min = 1, message = "quantity must be greater than zero"))]
    pub quantity: i32,
    pub expiry_date: Option<NaiveDate>,
    pub arrival_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub manufacturer: Option<String>,
    pub delivery_note_ref: Option<String>,
    pub operator_id: i64,
    pub second_operator_id: Option<i64>,
    #[serde(default)]
    pub acceptance: AcceptanceStatus,
    /// Caller's acknowledgement of a WARNING-tier shelf life; recorded with
    /// the receipt, never blocking.
    #[serde(default)]
    pub warning_acknowledged: bool,
    /// Mandatory justification for a FORCE-tier receipt.
    pub expiry_override_reason: Option<String>,
}

/// Receives goods into the warehouse, either against a shipped purchase
/// order or as a temporary (unplanned) intake.
#[derive(Clone)]
pub struct InboundService {
    db: Arc<DbPool>,
    settings: Arc<dyn SettingsProvider>,
    sequencer: DocumentSequencer,
    event_sender: Option<EventSender>,
}

impl InboundService {
    pub fn new(
        db: Arc<DbPool>,
        settings: Arc<dyn SettingsProvider>,
        sequencer: DocumentSequencer,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            settings,
            sequencer,
            event_sender,
        }
    }

    /// Receives against a purchase order line. The order must be SHIPPED,
    /// the cumulative qualified quantity stays within the ordered quantity,
    /// and special drugs need a second operator.
    #[instrument(skip(self, input), fields(drug_id = input.drug_id, batch = %input.batch_number))]
    pub async fn create_from_order(
        &self,
        order_id: i64,
        input: NewInboundReceipt,
    ) -> Result<inbound_receipt::Model, ServiceError> {
        input.validate()?;

        let drug = self.load_drug(input.drug_id).await?;
        approval::require_second_actor(
            drug.is_special,
            input.operator_id,
            input.second_operator_id,
        )?;

        let order = purchase_order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("purchase order {} not found", order_id))
            })?;
        let order_status = OrderStatus::parse(&order.status).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "purchase order {} carries unknown status {:?}",
                order_id, order.status
            ))
        })?;
        if order_status != OrderStatus::Shipped {
            return Err(ServiceError::StateConflict(format!(
                "order {} is {}, goods can only be received against a shipped order",
                order_id, order.status
            )));
        }

        let tier = self.classify_expiry(&input).await?;

        let (receipt, order_completed) = self
            .sequencer
            .execute_with_retry(|| self.try_create(Some(order_id), &input, &drug, tier))
            .await?;

        info!(
            receipt_number = %receipt.receipt_number,
            order_id,
            quantity = receipt.quantity,
            "inbound receipt recorded"
        );
        self.emit_events(&receipt, order_completed).await;
        Ok(receipt)
    }

    /// Temporary intake with no purchase order behind it. Same admission and
    /// dual-control rules; nothing to reconcile.
    #[instrument(skip(self, input), fields(drug_id = input.drug_id, batch = %input.batch_number))]
    pub async fn create_temporary(
        &self,
        input: NewInboundReceipt,
    ) -> Result<inbound_receipt::Model, ServiceError> {
        input.validate()?;

        let drug = self.load_drug(input.drug_id).await?;
        approval::require_second_actor(
            drug.is_special,
            input.operator_id,
            input.second_operator_id,
        )?;

        let tier = self.classify_expiry(&input).await?;

        let (receipt, _) = self
            .sequencer
            .execute_with_retry(|| self.try_create(None, &input, &drug, tier))
            .await?;

        info!(
            receipt_number = %receipt.receipt_number,
            quantity = receipt.quantity,
            "temporary inbound receipt recorded"
        );
        self.emit_events(&receipt, false).await;
        Ok(receipt)
    }

    pub async fn get_by_receipt_number(
        &self,
        receipt_number: &str,
    ) -> Result<Option<inbound_receipt::Model>, ServiceError> {
        Ok(InboundReceipt::find()
            .filter(inbound_receipt::Column::ReceiptNumber.eq(receipt_number))
            .one(&*self.db)
            .await?)
    }

    async fn classify_expiry(&self, input: &NewInboundReceipt) -> Result<ExpiryTier, ServiceError> {
        let windows = settings::expiry_windows(self.settings.as_ref()).await?;
        let tier = admission::classify(input.expiry_date, Utc::now().date_naive(), windows);
        admission::enforce(tier, input.expiry_override_reason.as_deref())?;
        Ok(tier)
    }

    /// One attempt: number + receipt row + ledger + reconciliation in a
    /// single transaction. A duplicate receipt number rolls the whole
    /// attempt back and the sequencer retries it.
    async fn try_create(
        &self,
        order_id: Option<i64>,
        input: &NewInboundReceipt,
        drug: &drug::Model,
        tier: ExpiryTier,
    ) -> Result<(inbound_receipt::Model, bool), ServiceError> {
        let txn = self.db.begin().await?;

        if let Some(order_id) = order_id {
            PurchaseOrderService::guard_receipt_within_order_in(
                &txn,
                order_id,
                input.drug_id,
                input.quantity,
            )
            .await?;
        }

        let number = self
            .sequencer
            .next_number(&txn, DocumentKind::Inbound)
            .await?;
        let now = Utc::now();
        let manufacturer = input
            .manufacturer
            .clone()
            .or_else(|| drug.manufacturer.clone());

        let receipt = inbound_receipt::ActiveModel {
            receipt_number: Set(number),
            order_id: Set(order_id),
            drug_id: Set(input.drug_id),
            batch_number: Set(input.batch_number.clone()),
            quantity: Set(input.quantity),
            expiry_date: Set(input.expiry_date),
            arrival_date: Set(input.arrival_date.unwrap_or_else(|| now.date_naive())),
            production_date: Set(input.production_date),
            manufacturer: Set(manufacturer.clone()),
            delivery_note_ref: Set(input.delivery_note_ref.clone()),
            operator_id: Set(input.operator_id),
            second_operator_id: Set(input.second_operator_id),
            acceptance: Set(input.acceptance.as_str().to_string()),
            expiry_tier: Set(tier.as_str().to_string()),
            expiry_override_reason: Set(input.expiry_override_reason.clone()),
            warning_acknowledged: Set(input.warning_acknowledged),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut order_completed = false;
        if input.acceptance == AcceptanceStatus::Qualified {
            StockLedger::increase_in(
                &txn,
                &StockReceipt {
                    drug_id: input.drug_id,
                    batch_number: input.batch_number.clone(),
                    quantity: input.quantity,
                    expiry_date: input.expiry_date,
                    storage_location: drug.storage_location.clone(),
                    production_date: input.production_date,
                    manufacturer,
                },
            )
            .await?;

            if let Some(order_id) = order_id {
                order_completed =
                    PurchaseOrderService::refresh_received_status_in(&txn, order_id).await?;
            }
        }

        txn.commit().await?;
        Ok((receipt, order_completed))
    }

    async fn load_drug(&self, drug_id: i64) -> Result<drug::Model, ServiceError> {
        drug::Entity::find_by_id(drug_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("drug {} not found", drug_id)))
    }

    async fn emit_events(&self, receipt: &inbound_receipt::Model, order_completed: bool) {
        let Some(sender) = &self.event_sender else {
            return;
        };

        sender
            .send_or_log(Event::InboundRecorded {
                receipt_number: receipt.receipt_number.clone(),
                order_id: receipt.order_id,
                drug_id: receipt.drug_id,
                batch_number: receipt.batch_number.clone(),
                quantity: receipt.quantity,
                acceptance: receipt.acceptance.clone(),
            })
            .await;

        if order_completed {
            if let Some(order_id) = receipt.order_id {
                sender
                    .send_or_log(Event::PurchaseOrderReceived { order_id })
                    .await;
            }
        }
    }
}
