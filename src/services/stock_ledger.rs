use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QuerySelect, TransactionTrait,
};
use tracing::{info, instrument};

use crate::{
    db::DbPool,
    entities::stock_batch::{self, Entity as StockBatch},
    errors::ServiceError,
    events::{Event, EventSender},
    services::sequencer::is_unique_violation,
    services::settings::{self, ExpiryWindows, SettingsProvider},
};

/// Stock arriving for one batch. Metadata (expiry, location, production
/// date, manufacturer) is recorded when the batch row is first created and
/// left untouched by later receipts for the same key.
#[derive(Debug, Clone)]
pub struct StockReceipt {
    pub drug_id: i64,
    pub batch_number: String,
    pub quantity: i32,
    pub expiry_date: Option<NaiveDate>,
    pub storage_location: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub manufacturer: Option<String>,
}

/// Near-expiry batch counts. `red` batches (inside the critical window) are
/// also inside the yellow window; the red count is the tighter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearExpiryCounts {
    pub yellow: u64,
    pub red: u64,
}

/// Owns per-(drug, batch) quantities. Every mutation is a single atomic
/// conditional statement, so a batch can never be driven negative even under
/// concurrent outbound executions.
#[derive(Clone)]
pub struct StockLedger {
    db: Arc<DbPool>,
    settings: Arc<dyn SettingsProvider>,
    event_sender: Option<EventSender>,
}

impl StockLedger {
    pub fn new(
        db: Arc<DbPool>,
        settings: Arc<dyn SettingsProvider>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            settings,
            event_sender,
        }
    }

    /// Adds stock for a batch, creating the row on first receipt.
    /// Returns the resulting quantity.
    #[instrument(skip(self, receipt), fields(drug_id = receipt.drug_id, batch = %receipt.batch_number))]
    pub async fn increase(&self, receipt: StockReceipt) -> Result<i32, ServiceError> {
        let txn = self.db.begin().await?;
        let new_quantity = Self::increase_in(&txn, &receipt).await?;
        txn.commit().await?;

        info!(
            drug_id = receipt.drug_id,
            batch = %receipt.batch_number,
            quantity = receipt.quantity,
            new_quantity,
            "stock increased"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockIncreased {
                    drug_id: receipt.drug_id,
                    batch_number: receipt.batch_number.clone(),
                    quantity: receipt.quantity,
                    new_quantity,
                })
                .await;
        }
        Ok(new_quantity)
    }

    /// Removes stock from a batch. Returns the remaining quantity.
    #[instrument(skip(self))]
    pub async fn decrease(
        &self,
        drug_id: i64,
        batch_number: &str,
        quantity: i32,
    ) -> Result<i32, ServiceError> {
        let txn = self.db.begin().await?;
        let new_quantity = Self::decrease_in(&txn, drug_id, batch_number, quantity).await?;
        txn.commit().await?;

        info!(drug_id, batch = %batch_number, quantity, new_quantity, "stock decreased");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockDecreased {
                    drug_id,
                    batch_number: batch_number.to_string(),
                    quantity,
                    new_quantity,
                })
                .await;
        }
        Ok(new_quantity)
    }

    /// Overwrites a batch's quantity. The batch must already exist; an
    /// adjustment always corrects a recorded snapshot.
    #[instrument(skip(self))]
    pub async fn set_absolute(
        &self,
        drug_id: i64,
        batch_number: &str,
        new_quantity: i32,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        Self::set_absolute_in(&txn, drug_id, batch_number, new_quantity).await?;
        txn.commit().await?;

        info!(drug_id, batch = %batch_number, new_quantity, "stock set");
        Ok(())
    }

    /// Looks up one batch by its ledger key.
    pub async fn batch(
        &self,
        drug_id: i64,
        batch_number: &str,
    ) -> Result<Option<stock_batch::Model>, ServiceError> {
        Self::find_batch_in(&*self.db, drug_id, batch_number).await
    }

    /// Total units on hand across all batches with stock.
    pub async fn total_quantity(&self) -> Result<i64, ServiceError> {
        #[derive(FromQueryResult)]
        struct Total {
            total: Option<i64>,
        }

        let row = StockBatch::find()
            .select_only()
            .column_as(Expr::col(stock_batch::Column::Quantity).sum(), "total")
            .filter(stock_batch::Column::Quantity.gt(0))
            .into_model::<Total>()
            .one(&*self.db)
            .await?;

        Ok(row.and_then(|r| r.total).unwrap_or(0))
    }

    /// Counts stocked batches whose expiry falls inside the configured
    /// yellow and red windows.
    pub async fn near_expiry(&self) -> Result<NearExpiryCounts, ServiceError> {
        let windows = settings::expiry_windows(self.settings.as_ref()).await?;
        self.near_expiry_with(windows).await
    }

    /// Same as [`near_expiry`](Self::near_expiry) with explicit windows.
    pub async fn near_expiry_with(
        &self,
        windows: ExpiryWindows,
    ) -> Result<NearExpiryCounts, ServiceError> {
        let today = Utc::now().date_naive();
        let yellow_limit = today + chrono::Duration::days(windows.warning_days);
        let red_limit = today + chrono::Duration::days(windows.critical_days);

        let yellow = StockBatch::find()
            .filter(stock_batch::Column::Quantity.gt(0))
            .filter(stock_batch::Column::ExpiryDate.gt(today))
            .filter(stock_batch::Column::ExpiryDate.lte(yellow_limit))
            .count(&*self.db)
            .await?;

        let red = StockBatch::find()
            .filter(stock_batch::Column::Quantity.gt(0))
            .filter(stock_batch::Column::ExpiryDate.gt(today))
            .filter(stock_batch::Column::ExpiryDate.lte(red_limit))
            .count(&*self.db)
            .await?;

        Ok(NearExpiryCounts { yellow, red })
    }

    // ---- transaction-scoped primitives -------------------------------------
    //
    // The `_in` functions run against a caller-supplied connection so the
    // receipt, issue, and adjustment services can compose them with their
    // audit rows inside one transaction.

    pub(crate) async fn increase_in<C: ConnectionTrait>(
        conn: &C,
        receipt: &StockReceipt,
    ) -> Result<i32, ServiceError> {
        if receipt.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "inbound quantity must be greater than zero".to_string(),
            ));
        }

        // Atomic add first; fall through to insert on the first receipt for
        // this key. Two passes cover the insert race: a concurrent writer
        // that wins the insert leaves us a row to add onto.
        for _ in 0..2 {
            let update = StockBatch::update_many()
                .col_expr(
                    stock_batch::Column::Quantity,
                    Expr::col(stock_batch::Column::Quantity).add(receipt.quantity),
                )
                .col_expr(stock_batch::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(stock_batch::Column::DrugId.eq(receipt.drug_id))
                .filter(stock_batch::Column::BatchNumber.eq(receipt.batch_number.as_str()))
                .exec(conn)
                .await?;

            if update.rows_affected > 0 {
                let batch = Self::find_batch_in(conn, receipt.drug_id, &receipt.batch_number)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError("stock batch disappeared mid-update".into())
                    })?;
                return Ok(batch.quantity);
            }

            let now = Utc::now();
            let row = stock_batch::ActiveModel {
                drug_id: Set(receipt.drug_id),
                batch_number: Set(receipt.batch_number.clone()),
                quantity: Set(receipt.quantity),
                expiry_date: Set(receipt.expiry_date),
                production_date: Set(receipt.production_date),
                storage_location: Set(receipt.storage_location.clone()),
                manufacturer: Set(receipt.manufacturer.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };

            match row.insert(conn).await {
                Ok(created) => return Ok(created.quantity),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::InternalError(
            "could not upsert stock batch".to_string(),
        ))
    }

    pub(crate) async fn decrease_in<C: ConnectionTrait>(
        conn: &C,
        drug_id: i64,
        batch_number: &str,
        quantity: i32,
    ) -> Result<i32, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "outbound quantity must be greater than zero".to_string(),
            ));
        }

        // The `quantity >= n` guard inside the UPDATE is what keeps the
        // ledger non-negative under concurrent executions; a read-then-write
        // here would reintroduce the over-allocation race.
        let update = StockBatch::update_many()
            .col_expr(
                stock_batch::Column::Quantity,
                Expr::col(stock_batch::Column::Quantity).sub(quantity),
            )
            .col_expr(stock_batch::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(stock_batch::Column::DrugId.eq(drug_id))
            .filter(stock_batch::Column::BatchNumber.eq(batch_number))
            .filter(stock_batch::Column::Quantity.gte(quantity))
            .exec(conn)
            .await?;

        if update.rows_affected == 0 {
            return match Self::find_batch_in(conn, drug_id, batch_number).await? {
                None => Err(ServiceError::InsufficientStock(format!(
                    "no stock recorded for drug {} batch {}",
                    drug_id, batch_number
                ))),
                Some(batch) => Err(ServiceError::InsufficientStock(format!(
                    "batch {} of drug {} holds {}, requested {}",
                    batch_number, drug_id, batch.quantity, quantity
                ))),
            };
        }

        let batch = Self::find_batch_in(conn, drug_id, batch_number)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError("stock batch disappeared mid-update".into())
            })?;
        Ok(batch.quantity)
    }

    pub(crate) async fn set_absolute_in<C: ConnectionTrait>(
        conn: &C,
        drug_id: i64,
        batch_number: &str,
        new_quantity: i32,
    ) -> Result<(), ServiceError> {
        if new_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "stock quantity cannot be negative".to_string(),
            ));
        }

        let update = StockBatch::update_many()
            .col_expr(stock_batch::Column::Quantity, Expr::value(new_quantity))
            .col_expr(stock_batch::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(stock_batch::Column::DrugId.eq(drug_id))
            .filter(stock_batch::Column::BatchNumber.eq(batch_number))
            .exec(conn)
            .await?;

        if update.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "no stock batch for drug {} batch {}",
                drug_id, batch_number
            )));
        }

        Ok(())
    }

    pub(crate) async fn find_batch_in<C: ConnectionTrait>(
        conn: &C,
        drug_id: i64,
        batch_number: &str,
    ) -> Result<Option<stock_batch::Model>, ServiceError> {
        Ok(StockBatch::find()
            .filter(stock_batch::Column::DrugId.eq(drug_id))
            .filter(stock_batch::Column::BatchNumber.eq(batch_number))
            .one(conn)
            .await?)
    }
}
