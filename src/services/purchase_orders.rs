use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult,
    QueryFilter, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        drug,
        inbound_receipt::{self, AcceptanceStatus},
        purchase_order::{self, Entity as PurchaseOrder, OrderStatus},
        purchase_order_line::{self, Entity as PurchaseOrderLine},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::sequencer::{DocumentKind, DocumentSequencer},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPurchaseOrder {
    #[validate(length(min = 1, message = "supplier name is required"))]
    pub supplier_name: String,
    #[validate(length(min = 1, message = "a purchase order needs at least one line"))]
    pub lines: Vec<NewPurchaseOrderLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewPurchaseOrderLine {
    pub drug_id: i64,
    pub ordered_quantity: i32,
}

/// Purchase order lifecycle plus receipt reconciliation: cumulative
/// qualified receipts are capped per line, and a fully received order flips
/// to RECEIVED.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DbPool>,
    sequencer: DocumentSequencer,
    event_sender: Option<EventSender>,
}

impl PurchaseOrderService {
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

    /// Creates a pending order with its lines under a fresh `PO` number.
    #[instrument(skip(self, input))]
    pub async fn create_order(
        &self,
        input: NewPurchaseOrder,
    ) -> Result<purchase_order::Model, ServiceError> {
        input.validate()?;
        for (i, line) in input.lines.iter().enumerate() {
            if line.ordered_quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "line {}: ordered quantity must be greater than zero",
                    i + 1
                )));
            }
        }

        let order = self
            .sequencer
            .execute_with_retry(|| self.try_create_order(&input))
            .await?;

        info!(order_number = %order.order_number, "purchase order created");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderCreated {
                    order_number: order.order_number.clone(),
                })
                .await;
        }
        Ok(order)
    }

    async fn try_create_order(
        &self,
        input: &NewPurchaseOrder,
    ) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        for line in &input.lines {
            drug::Entity::find_by_id(line.drug_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("drug {} not found", line.drug_id)))?;
        }

        let number = self
            .sequencer
            .next_number(&txn, DocumentKind::PurchaseOrder)
            .await?;
        let now = Utc::now();

        let order = purchase_order::ActiveModel {
            order_number: Set(number),
            supplier_name: Set(input.supplier_name.clone()),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for line in &input.lines {
            purchase_order_line::ActiveModel {
                order_id: Set(order.id),
                drug_id: Set(line.drug_id),
                ordered_quantity: Set(line.ordered_quantity),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(order)
    }

    /// PENDING → CONFIRMED.
    #[instrument(skip(self))]
    pub async fn confirm_order(&self, order_id: i64) -> Result<(), ServiceError> {
        let order = self.load_order(order_id).await?;
        let status = parse_status(&order)?;
        if !status.can_transition(OrderStatus::Confirmed) {
            return Err(ServiceError::StateConflict(format!(
                "order {} is {}, only pending orders can be confirmed",
                order_id, order.status
            )));
        }

        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Confirmed.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(order_id, "purchase order confirmed");
        Ok(())
    }

    /// CONFIRMED → SHIPPED, recording the carrier reference.
    #[instrument(skip(self))]
    pub async fn ship_order(
        &self,
        order_id: i64,
        logistics_number: &str,
    ) -> Result<(), ServiceError> {
        if logistics_number.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a logistics reference is required to ship an order".to_string(),
            ));
        }

        let order = self.load_order(order_id).await?;
        let status = parse_status(&order)?;
        if !status.can_transition(OrderStatus::Shipped) {
            return Err(ServiceError::StateConflict(format!(
                "order {} is {}, only confirmed orders can ship",
                order_id, order.status
            )));
        }

        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Shipped.as_str().to_string());
        active.logistics_number = Set(Some(logistics_number.to_string()));
        active.shipped_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(order_id, logistics_number, "purchase order shipped");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderShipped { order_id })
                .await;
        }
        Ok(())
    }

    /// PENDING → REJECTED with a mandatory reason.
    #[instrument(skip(self))]
    pub async fn reject_order(&self, order_id: i64, reason: &str) -> Result<(), ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a rejection reason is required".to_string(),
            ));
        }

        let order = self.load_order(order_id).await?;
        let status = parse_status(&order)?;
        if !status.can_transition(OrderStatus::Rejected) {
            return Err(ServiceError::StateConflict(format!(
                "order {} is {}, only pending orders can be rejected",
                order_id, order.status
            )));
        }

        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Rejected.as_str().to_string());
        active.reject_reason = Set(Some(reason.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(order_id, reason, "purchase order rejected");
        Ok(())
    }

    pub async fn get_order(&self, order_id: i64) -> Result<purchase_order::Model, ServiceError> {
        self.load_order(order_id).await
    }

    pub async fn order_lines(
        &self,
        order_id: i64,
    ) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
        Ok(PurchaseOrderLine::find()
            .filter(purchase_order_line::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    /// Qualified units received so far for one order line.
    pub async fn received_quantity(
        &self,
        order_id: i64,
        drug_id: i64,
    ) -> Result<i64, ServiceError> {
        Self::received_quantity_in(&*self.db, order_id, drug_id).await
    }

    async fn load_order(&self, order_id: i64) -> Result<purchase_order::Model, ServiceError> {
        PurchaseOrder::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase order {} not found", order_id)))
    }

    // ---- receipt reconciliation (transaction-scoped) -----------------------

    pub(crate) async fn received_quantity_in<C: ConnectionTrait>(
        conn: &C,
        order_id: i64,
        drug_id: i64,
    ) -> Result<i64, ServiceError> {
        #[derive(FromQueryResult)]
        struct Total {
            total: Option<i64>,
        }

        let row = inbound_receipt::Entity::find()
            .select_only()
            .column_as(Expr::col(inbound_receipt::Column::Quantity).sum(), "total")
            .filter(inbound_receipt::Column::OrderId.eq(order_id))
            .filter(inbound_receipt::Column::DrugId.eq(drug_id))
            .filter(inbound_receipt::Column::Acceptance.eq(AcceptanceStatus::Qualified.as_str()))
            .into_model::<Total>()
            .one(conn)
            .await?;

        Ok(row.and_then(|r| r.total).unwrap_or(0))
    }

    /// Rejects a receipt that would push cumulative qualified receipts past
    /// the ordered quantity. Returns the order line being received against.
    pub(crate) async fn guard_receipt_within_order_in<C: ConnectionTrait>(
        conn: &C,
        order_id: i64,
        drug_id: i64,
        quantity: i32,
    ) -> Result<purchase_order_line::Model, ServiceError> {
        let line = PurchaseOrderLine::find()
            .filter(purchase_order_line::Column::OrderId.eq(order_id))
            .filter(purchase_order_line::Column::DrugId.eq(drug_id))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "order {} has no line for drug {}",
                    order_id, drug_id
                ))
            })?;

        let received = Self::received_quantity_in(conn, order_id, drug_id).await?;
        let attempted = received + i64::from(quantity);
        if attempted > i64::from(line.ordered_quantity) {
            return Err(ServiceError::OverReceipt(format!(
                "ordered {}, already received {}, attempted total {}",
                line.ordered_quantity, received, attempted
            )));
        }

        Ok(line)
    }

    /// Flips a shipped order to RECEIVED once every line is fully received.
    /// Returns whether the flip happened.
    pub(crate) async fn refresh_received_status_in<C: ConnectionTrait>(
        conn: &C,
        order_id: i64,
    ) -> Result<bool, ServiceError> {
        let order = PurchaseOrder::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("purchase order {} not found", order_id))
            })?;

        let status = parse_status(&order)?;
        if !status.can_transition(OrderStatus::Received) {
            return Ok(false);
        }

        let lines = PurchaseOrderLine::find()
            .filter(purchase_order_line::Column::OrderId.eq(order_id))
            .all(conn)
            .await?;
        if lines.is_empty() {
            return Ok(false);
        }

        for line in &lines {
            let received = Self::received_quantity_in(conn, order_id, line.drug_id).await?;
            if received < i64::from(line.ordered_quantity) {
                return Ok(false);
            }
        }

        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Received.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;

        info!(order_id, "purchase order fully received");
        Ok(true)
    }
}

fn parse_status(order: &purchase_order::Model) -> Result<OrderStatus, ServiceError> {
    OrderStatus::parse(&order.status).ok_or_else(|| {
        ServiceError::InternalError(format!(
            "purchase order {} carries unknown status {:?}",
            order.id, order.status
        ))
    })
}
