mod common;

use assert_matches::assert_matches;
use common::{days_from_now, TestApp};
use pharmstock_api::errors::ServiceError;
use pharmstock_api::services::settings::ExpiryWindows;
use pharmstock_api::services::stock_ledger::{NearExpiryCounts, StockReceipt};

fn stock_receipt(drug_id: i64, batch: &str, quantity: i32, expires_in: i64) -> StockReceipt {
    StockReceipt {
        drug_id,
        batch_number: batch.to_string(),
        quantity,
        expiry_date: Some(days_from_now(expires_in)),
        storage_location: Some("A-01".to_string()),
        production_date: None,
        manufacturer: Some("Acme Pharma".to_string()),
    }
}

#[tokio::test]
async fn increase_accumulates_onto_an_existing_batch() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Amoxicillin", false).await;
    let ledger = &app.services.stock_ledger;

    // Batch(D1, B001) at 100 units, expiring in 200 days
    let first = ledger
        .increase(stock_receipt(drug.id, "B001", 100, 200))
        .await
        .unwrap();
    assert_eq!(first, 100);

    let second = ledger
        .increase(stock_receipt(drug.id, "B001", 50, 200))
        .await
        .unwrap();
    assert_eq!(second, 150);

    let batch = ledger.batch(drug.id, "B001").await.unwrap().unwrap();
    assert_eq!(batch.quantity, 150);
}

#[tokio::test]
async fn first_receipt_metadata_sticks() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Cetirizine", false).await;
    let ledger = &app.services.stock_ledger;

    ledger
        .increase(stock_receipt(drug.id, "B010", 30, 365))
        .await
        .unwrap();

    // A later receipt with a different expiry does not rewrite the batch row.
    let mut later = stock_receipt(drug.id, "B010", 20, 30);
    later.manufacturer = Some("Other Labs".to_string());
    ledger.increase(later).await.unwrap();

    let batch = ledger.batch(drug.id, "B010").await.unwrap().unwrap();
    assert_eq!(batch.quantity, 50);
    assert_eq!(batch.expiry_date, Some(days_from_now(365)));
    assert_eq!(batch.manufacturer.as_deref(), Some("Acme Pharma"));
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Ibuprofen", false).await;
    let ledger = &app.services.stock_ledger;

    assert_matches!(
        ledger.increase(stock_receipt(drug.id, "B001", 0, 100)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        ledger.increase(stock_receipt(drug.id, "B001", -5, 100)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        ledger.decrease(drug.id, "B001", 0).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn decrease_never_drives_a_batch_negative() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Metformin", false).await;
    let ledger = &app.services.stock_ledger;

    ledger
        .increase(stock_receipt(drug.id, "B002", 40, 180))
        .await
        .unwrap();

    let remaining = ledger.decrease(drug.id, "B002", 15).await.unwrap();
    assert_eq!(remaining, 25);

    assert_matches!(
        ledger.decrease(drug.id, "B002", 26).await,
        Err(ServiceError::InsufficientStock(_))
    );
    // Failed decrement leaves the quantity untouched.
    let batch = ledger.batch(drug.id, "B002").await.unwrap().unwrap();
    assert_eq!(batch.quantity, 25);
}

#[tokio::test]
async fn decrease_on_an_unknown_batch_reports_insufficient_stock() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Aspirin", false).await;

    assert_matches!(
        app.services.stock_ledger.decrease(drug.id, "NOPE", 1).await,
        Err(ServiceError::InsufficientStock(_))
    );
}

#[tokio::test]
async fn set_absolute_requires_an_existing_batch() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Loratadine", false).await;
    let ledger = &app.services.stock_ledger;

    assert_matches!(
        ledger.set_absolute(drug.id, "MISSING", 10).await,
        Err(ServiceError::NotFound(_))
    );

    ledger
        .increase(stock_receipt(drug.id, "B003", 55, 180))
        .await
        .unwrap();
    ledger.set_absolute(drug.id, "B003", 40).await.unwrap();

    let batch = ledger.batch(drug.id, "B003").await.unwrap().unwrap();
    assert_eq!(batch.quantity, 40);

    assert_matches!(
        ledger.set_absolute(drug.id, "B003", -1).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn total_quantity_sums_stocked_batches_only() {
    let app = TestApp::new().await;
    let drug_a = app.create_drug("Omeprazole", false).await;
    let drug_b = app.create_drug("Simvastatin", false).await;
    let ledger = &app.services.stock_ledger;

    ledger
        .increase(stock_receipt(drug_a.id, "B001", 70, 200))
        .await
        .unwrap();
    ledger
        .increase(stock_receipt(drug_b.id, "B001", 30, 200))
        .await
        .unwrap();
    // Drain one batch to zero; it must drop out of the total.
    ledger.decrease(drug_b.id, "B001", 30).await.unwrap();

    assert_eq!(ledger.total_quantity().await.unwrap(), 70);
}

#[tokio::test]
async fn near_expiry_windows_count_yellow_and_red() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Insulin", false).await;
    let ledger = &app.services.stock_ledger;

    // red (inside 90d) and therefore also yellow
    ledger
        .increase(stock_receipt(drug.id, "RED", 10, 30))
        .await
        .unwrap();
    // yellow only
    ledger
        .increase(stock_receipt(drug.id, "YELLOW", 10, 120))
        .await
        .unwrap();
    // comfortably outside both windows
    ledger
        .increase(stock_receipt(drug.id, "FRESH", 10, 400))
        .await
        .unwrap();
    // expiring today: the window is exclusive of today
    ledger
        .increase(stock_receipt(drug.id, "TODAY", 10, 0))
        .await
        .unwrap();
    // empty batches never warn
    ledger
        .increase(stock_receipt(drug.id, "EMPTY", 10, 30))
        .await
        .unwrap();
    ledger.decrease(drug.id, "EMPTY", 10).await.unwrap();

    let counts = ledger
        .near_expiry_with(ExpiryWindows {
            warning_days: 180,
            critical_days: 90,
        })
        .await
        .unwrap();

    assert_eq!(
        counts,
        NearExpiryCounts {
            yellow: 2,
            red: 1
        }
    );
}

#[tokio::test]
async fn near_expiry_uses_configured_defaults() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Warfarin", false).await;

    app.services
        .stock_ledger
        .increase(stock_receipt(drug.id, "B001", 5, 100))
        .await
        .unwrap();

    // 100 days out: yellow under the default 180/90 windows.
    let counts = app.services.stock_ledger.near_expiry().await.unwrap();
    assert_eq!(counts.yellow, 1);
    assert_eq!(counts.red, 0);
}
