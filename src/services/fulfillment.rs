use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};

use crate::{
    db::DbPool,
    entities::stock_batch::{self, Entity as StockBatch},
    errors::ServiceError,
    services::stock_ledger::StockLedger,
};

/// One slice of an allocation: take `quantity` units from `batch_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTake {
    pub batch_number: String,
    pub quantity: i32,
}

/// Selects and consumes batches first-expiring-first-out.
///
/// The listing is advisory: the ledger's conditional decrement is the only
/// thing that actually takes stock, so a stale listing can fail an
/// execution but never over-allocate.
#[derive(Clone)]
pub struct FulfillmentAllocator {
    db: Arc<DbPool>,
}

impl FulfillmentAllocator {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// All batches of `drug_id` that could satisfy an outbound line today:
    /// stocked, unexpired, earliest expiry first (batch number breaks ties).
    #[instrument(skip(self))]
    pub async fn get_available_batches(
        &self,
        drug_id: i64,
        required_quantity: i32,
    ) -> Result<Vec<stock_batch::Model>, ServiceError> {
        if required_quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "required quantity must be greater than zero".to_string(),
            ));
        }

        let today = Utc::now().date_naive();
        let batches = available_batches_in(&*self.db, drug_id, today).await?;

        let available: i64 = batches.iter().map(|b| i64::from(b.quantity)).sum();
        debug!(
            drug_id,
            required_quantity, available, "listed available batches"
        );

        Ok(batches)
    }
}

/// FIFO-ordered eligible batches, read through the caller's connection.
pub(crate) async fn available_batches_in<C: ConnectionTrait>(
    conn: &C,
    drug_id: i64,
    today: NaiveDate,
) -> Result<Vec<stock_batch::Model>, ServiceError> {
    Ok(StockBatch::find()
        .filter(stock_batch::Column::DrugId.eq(drug_id))
        .filter(stock_batch::Column::Quantity.gt(0))
        .filter(stock_batch::Column::ExpiryDate.gte(today))
        .order_by_asc(stock_batch::Column::ExpiryDate)
        .order_by_asc(stock_batch::Column::BatchNumber)
        .all(conn)
        .await?)
}

/// Splits `required` across the given FIFO-ordered batches, consuming each
/// to exhaustion before touching the next. Fails without a plan when the
/// batches cannot cover the requirement.
pub(crate) fn plan_takes(
    drug_id: i64,
    batches: &[stock_batch::Model],
    required: i32,
) -> Result<Vec<BatchTake>, ServiceError> {
    let available: i64 = batches.iter().map(|b| i64::from(b.quantity)).sum();
    if available < i64::from(required) {
        return Err(ServiceError::InsufficientStock(format!(
            "drug {}: requested {}, available {}",
            drug_id, required, available
        )));
    }

    let mut takes = Vec::new();
    let mut remaining = required;
    for batch in batches {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        takes.push(BatchTake {
            batch_number: batch.batch_number.clone(),
            quantity: take,
        });
        remaining -= take;
    }

    Ok(takes)
}

/// Consumes `required` units of `drug_id` FIFO inside the caller's
/// transaction. Each take goes through the ledger's conditional decrement;
/// any failed decrement aborts the caller's transaction wholesale.
pub(crate) async fn consume_in<C: ConnectionTrait>(
    conn: &C,
    drug_id: i64,
    required: i32,
) -> Result<Vec<BatchTake>, ServiceError> {
    let today = Utc::now().date_naive();
    let batches = available_batches_in(conn, drug_id, today).await?;
    let takes = plan_takes(drug_id, &batches, required)?;

    for take in &takes {
        StockLedger::decrease_in(conn, drug_id, &take.batch_number, take.quantity).await?;
    }

    Ok(takes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use proptest::prelude::*;

    fn batch(number: &str, quantity: i32, expires_in_days: i64) -> stock_batch::Model {
        let now = Utc::now();
        stock_batch::Model {
            id: 0,
            drug_id: 1,
            batch_number: number.to_string(),
            quantity,
            expiry_date: Some(now.date_naive() + Duration::days(expires_in_days)),
            production_date: None,
            storage_location: None,
            manufacturer: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn earlier_batches_are_drained_before_later_ones() {
        // 120 requested against B1(50, 10d) + B2(100, 300d)
        let batches = vec![batch("B1", 50, 10), batch("B2", 100, 300)];
        let takes = plan_takes(1, &batches, 120).unwrap();

        assert_eq!(
            takes,
            vec![
                BatchTake {
                    batch_number: "B1".into(),
                    quantity: 50
                },
                BatchTake {
                    batch_number: "B2".into(),
                    quantity: 70
                },
            ]
        );
    }

    #[test]
    fn exact_single_batch_fit_takes_one_batch() {
        let batches = vec![batch("B1", 80, 5), batch("B2", 40, 50)];
        let takes = plan_takes(1, &batches, 80).unwrap();
        assert_eq!(takes.len(), 1);
        assert_eq!(takes[0].quantity, 80);
    }

    #[test]
    fn shortfall_yields_no_plan() {
        let batches = vec![batch("B1", 10, 5), batch("B2", 20, 50)];
        assert_matches!(
            plan_takes(1, &batches, 31),
            Err(ServiceError::InsufficientStock(_))
        );
    }

    proptest! {
        #[test]
        fn plans_cover_exactly_the_requirement(
            quantities in proptest::collection::vec(1i32..500, 1..8),
            required in 1i32..1000,
        ) {
            let batches: Vec<_> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| batch(&format!("B{:02}", i), *q, (i as i64 + 1) * 10))
                .collect();

            match plan_takes(1, &batches, required) {
                Ok(takes) => {
                    let total: i32 = takes.iter().map(|t| t.quantity).sum();
                    prop_assert_eq!(total, required);
                    // Every take fits inside its batch, in FIFO order.
                    for (take, batch) in takes.iter().zip(&batches) {
                        prop_assert_eq!(&take.batch_number, &batch.batch_number);
                        prop_assert!(take.quantity <= batch.quantity);
                    }
                    // Only the final take may leave a remainder.
                    for (take, batch) in takes.iter().zip(&batches).take(takes.len().saturating_sub(1)) {
                        prop_assert_eq!(take.quantity, batch.quantity);
                    }
                }
                Err(_) => {
                    let available: i64 = quantities.iter().map(|q| i64::from(*q)).sum();
                    prop_assert!(available < i64::from(required));
                }
            }
        }
    }
}
