use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::error::{DbErr, SqlErr};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::warn;

use crate::{
    config::AppConfig,
    entities::{inbound_receipt, outbound_application, purchase_order, stock_adjustment},
    errors::ServiceError,
};

/// Business document families, each with its own number prefix and its own
/// per-day sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Inbound,
    Outbound,
    Adjustment,
    PurchaseOrder,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Inbound => "IN",
            DocumentKind::Outbound => "OUT",
            DocumentKind::Adjustment => "ADJ",
            DocumentKind::PurchaseOrder => "PO",
        }
    }
}

/// Bounded retry policy for document number collisions.
#[derive(Debug, Clone, Copy)]
pub struct RetryStrategy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryStrategy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            attempts: config.sequencer_retry_attempts,
            backoff: Duration::from_millis(config.sequencer_retry_backoff_ms),
        }
    }
}

/// Generates human-readable, day-scoped document numbers:
/// `{PREFIX}{yyyyMMdd}{seq:03}`, where the sequence restarts at 001 each
/// day.
///
/// Numbering is optimistic: the candidate sequence is the count of that
/// document kind created today plus one, and the unique index on the number
/// column is the collision authority. Two concurrent writers can compute the
/// same candidate; the loser's transaction fails with a unique-constraint
/// violation and `execute_with_retry` re-runs the whole closure, so a retry
/// never observes partial state.
#[derive(Debug, Clone)]
pub struct DocumentSequencer {
    retry: RetryStrategy,
}

impl DocumentSequencer {
    pub fn new(retry: RetryStrategy) -> Self {
        Self { retry }
    }

    /// Candidate number for the next document of `kind`.
    pub async fn next_number<C: ConnectionTrait>(
        &self,
        conn: &C,
        kind: DocumentKind,
    ) -> Result<String, ServiceError> {
        let today = Utc::now().date_naive();
        let issued = issued_today(conn, kind, today).await?;
        Ok(format_number(kind, today, issued + 1))
    }

    /// Runs `op` (generate number + insert, inside its own transaction),
    /// retrying on unique-constraint violations with the configured backoff.
    /// Any other error surfaces immediately; exhausting the budget reports
    /// `ConcurrencyExhausted` rather than silently dropping the document.
    pub async fn execute_with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Err(ServiceError::DatabaseError(err)) if is_unique_violation(&err) => {
                    attempt += 1;
                    if attempt > self.retry.attempts {
                        return Err(ServiceError::ConcurrencyExhausted(format!(
                            "document number collision persisted after {} retries",
                            self.retry.attempts
                        )));
                    }
                    warn!(attempt, "document number collision, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                }
                other => return other,
            }
        }
    }
}

/// How many documents of `kind` were created on `day`.
async fn issued_today<C: ConnectionTrait>(
    conn: &C,
    kind: DocumentKind,
    day: NaiveDate,
) -> Result<u64, ServiceError> {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = start + chrono::Duration::days(1);

    let count = match kind {
        DocumentKind::Inbound => {
            inbound_receipt::Entity::find()
                .filter(inbound_receipt::Column::CreatedAt.gte(start))
                .filter(inbound_receipt::Column::CreatedAt.lt(end))
                .count(conn)
                .await?
        }
        DocumentKind::Outbound => {
            outbound_application::Entity::find()
                .filter(outbound_application::Column::CreatedAt.gte(start))
                .filter(outbound_application::Column::CreatedAt.lt(end))
                .count(conn)
                .await?
        }
        DocumentKind::Adjustment => {
            stock_adjustment::Entity::find()
                .filter(stock_adjustment::Column::CreatedAt.gte(start))
                .filter(stock_adjustment::Column::CreatedAt.lt(end))
                .count(conn)
                .await?
        }
        DocumentKind::PurchaseOrder => {
            purchase_order::Entity::find()
                .filter(purchase_order::Column::CreatedAt.gte(start))
                .filter(purchase_order::Column::CreatedAt.lt(end))
                .count(conn)
                .await?
        }
    };

    Ok(count)
}

/// Renders `{PREFIX}{yyyyMMdd}{seq:03}`.
pub fn format_number(kind: DocumentKind, date: NaiveDate, seq: u64) -> String {
    format!("{}{}{:03}", kind.prefix(), date.format("%Y%m%d"), seq)
}

/// True when a database error is a unique-constraint violation, the signal
/// for a document number collision.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
