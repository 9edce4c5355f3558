mod common;

use assert_matches::assert_matches;
use common::TestApp;
use pharmstock_api::errors::ServiceError;
use pharmstock_api::services::adjustment::NewStockAdjustment;

fn adjustment(drug_id: i64, batch: &str, quantity_after: i32) -> NewStockAdjustment {
    NewStockAdjustment {
        drug_id,
        batch_number: batch.to_string(),
        quantity_after,
        reason: "cycle count variance".to_string(),
        operator_id: 101,
        second_operator_id: None,
    }
}

#[tokio::test]
async fn adjustment_snapshots_before_and_after_and_sets_the_ledger() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Amoxicillin", false).await;
    app.seed_batch(drug.id, "B001", 55, 365).await;

    let created = app
        .services
        .adjustments
        .create_adjustment(adjustment(drug.id, "B001", 40))
        .await
        .unwrap();

    assert!(created.adjustment_number.starts_with("ADJ"));
    assert_eq!(created.quantity_before, 55);
    assert_eq!(created.quantity_after, 40);
    assert_eq!(created.adjustment_delta, -15);

    let batch = app
        .services
        .stock_ledger
        .batch(drug.id, "B001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.quantity, 40);
}

#[tokio::test]
async fn upward_corrections_work_and_zero_is_allowed() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Amoxicillin", false).await;
    app.seed_batch(drug.id, "B001", 10, 365).await;

    let up = app
        .services
        .adjustments
        .create_adjustment(adjustment(drug.id, "B001", 25))
        .await
        .unwrap();
    assert_eq!(up.adjustment_delta, 15);

    let down = app
        .services
        .adjustments
        .create_adjustment(adjustment(drug.id, "B001", 0))
        .await
        .unwrap();
    assert_eq!(down.quantity_before, 25);
    assert_eq!(down.adjustment_delta, -25);

    let batch = app
        .services
        .stock_ledger
        .batch(drug.id, "B001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.quantity, 0);
}

#[tokio::test]
async fn adjustments_target_existing_batches_only() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Amoxicillin", false).await;

    assert_matches!(
        app.services
            .adjustments
            .create_adjustment(adjustment(drug.id, "GHOST", 10))
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn negative_targets_and_empty_reasons_are_rejected() {
    let app = TestApp::new().await;
    let drug = app.create_drug("Amoxicillin", false).await;
    app.seed_batch(drug.id, "B001", 10, 365).await;

    assert_matches!(
        app.services
            .adjustments
            .create_adjustment(adjustment(drug.id, "B001", -1))
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let mut blank_reason = adjustment(drug.id, "B001", 5);
    blank_reason.reason = String::new();
    assert_matches!(
        app.services.adjustments.create_adjustment(blank_reason).await,
        Err(ServiceError::ValidationError(_))
    );

    // Nothing was written.
    let batch = app
        .services
        .stock_ledger
        .batch(drug.id, "B001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.quantity, 10);
}

#[tokio::test]
async fn special_drug_adjustments_need_dual_control() {
    let app = TestApp::new().await;
    let special = app.create_drug("Morphine", true).await;

    let mut seed = common::receipt_input(special.id, "M1", 30, Some(365));
    seed.second_operator_id = Some(202);
    app.services.inbound.create_temporary(seed).await.unwrap();

    // No second operator.
    assert_matches!(
        app.services
            .adjustments
            .create_adjustment(adjustment(special.id, "M1", 20))
            .await,
        Err(ServiceError::ValidationError(_))
    );

    // Same person twice.
    let mut same = adjustment(special.id, "M1", 20);
    same.second_operator_id = Some(same.operator_id);
    assert_matches!(
        app.services.adjustments.create_adjustment(same).await,
        Err(ServiceError::ValidationError(_))
    );

    // Distinct second operator passes.
    let mut countersigned = adjustment(special.id, "M1", 20);
    countersigned.second_operator_id = Some(202);
    let created = app
        .services
        .adjustments
        .create_adjustment(countersigned)
        .await
        .unwrap();
    assert_eq!(created.second_operator_id, Some(202));
}
