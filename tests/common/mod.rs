#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use pharmstock_api::{
    config::AppConfig,
    db::{self, DbPool},
    entities::{drug, inbound_receipt::AcceptanceStatus, purchase_order},
    events::{self, EventSender},
    services::{
        inbound::NewInboundReceipt,
        purchase_orders::{NewPurchaseOrder, NewPurchaseOrderLine},
    },
    AppServices,
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Test harness: file-backed SQLite database (fresh per test), migrations
/// applied, all services wired against a single-connection pool.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let db_path = tmp.path().join("pharmstock_test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut cfg = AppConfig::new(url, "test");
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = Arc::new(
            db::establish_connection_from_app_config(&cfg)
                .await
                .expect("failed to create test database"),
        );

        let (tx, rx) = mpsc::channel(100);
        let event_task = tokio::spawn(events::process_events(rx));
        let services = AppServices::build(pool.clone(), &cfg, EventSender::new(tx));

        Self {
            db: pool,
            services,
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    pub async fn create_drug(&self, name: &str, is_special: bool) -> drug::Model {
        let now = Utc::now();
        drug::ActiveModel {
            name: Set(name.to_string()),
            specification: Set(Some("10mg x 20".to_string())),
            manufacturer: Set(Some("Acme Pharma".to_string())),
            storage_location: Set(Some("A-01".to_string())),
            is_special: Set(is_special),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("failed to insert drug")
    }

    /// Creates a purchase order for the given (drug_id, quantity) lines and
    /// walks it through CONFIRMED to SHIPPED so goods can be received.
    pub async fn create_shipped_order(&self, lines: &[(i64, i32)]) -> purchase_order::Model {
        let order = self
            .services
            .purchase_orders
            .create_order(NewPurchaseOrder {
                supplier_name: "Evergreen Distribution".to_string(),
                lines: lines
                    .iter()
                    .map(|(drug_id, quantity)| NewPurchaseOrderLine {
                        drug_id: *drug_id,
                        ordered_quantity: *quantity,
                    })
                    .collect(),
            })
            .await
            .expect("failed to create purchase order");

        self.services
            .purchase_orders
            .confirm_order(order.id)
            .await
            .expect("failed to confirm order");
        self.services
            .purchase_orders
            .ship_order(order.id, "SF-0001")
            .await
            .expect("failed to ship order");

        self.services
            .purchase_orders
            .get_order(order.id)
            .await
            .expect("failed to reload order")
    }

    /// Seeds stock through a temporary qualified receipt. Short-dated seeds
    /// would land in the FORCE tier, so an override reason is always set.
    pub async fn seed_batch(&self, drug_id: i64, batch: &str, quantity: i32, expires_in: i64) {
        let mut input = receipt_input(drug_id, batch, quantity, Some(expires_in));
        input.warning_acknowledged = true;
        input.expiry_override_reason = Some("test seed".to_string());
        self.services
            .inbound
            .create_temporary(input)
            .await
            .expect("failed to seed batch");
    }
}

pub fn days_from_now(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

/// Receipt payload with sensible defaults: qualified, operator 101, expiry
/// expressed in days from today.
pub fn receipt_input(
    drug_id: i64,
    batch: &str,
    quantity: i32,
    expires_in: Option<i64>,
) -> NewInboundReceipt {
    NewInboundReceipt {
        drug_id,
        batch_number: batch.to_string(),
        quantity,
        expiry_date: expires_in.map(days_from_now),
        arrival_date: None,
        production_date: None,
        manufacturer: None,
        delivery_note_ref: None,
        operator_id: 101,
        second_operator_id: None,
        acceptance: AcceptanceStatus::Qualified,
        warning_acknowledged: false,
        expiry_override_reason: None,
    }
}
