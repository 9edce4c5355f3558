use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_drugs_table::Migration),
            Box::new(m20240301_000002_create_stock_batches_table::Migration),
            Box::new(m20240301_000003_create_procurement_tables::Migration),
            Box::new(m20240301_000004_create_inbound_receipts_table::Migration),
            Box::new(m20240301_000005_create_outbound_tables::Migration),
            Box::new(m20240301_000006_create_stock_adjustments_table::Migration),
            Box::new(m20240301_000007_create_app_settings_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_drugs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_drugs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Drugs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Drugs::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Drugs::Name).string().not_null())
                        .col(ColumnDef::new(Drugs::Specification).string().null())
                        .col(ColumnDef::new(Drugs::Manufacturer).string().null())
                        .col(ColumnDef::new(Drugs::StorageLocation).string().null())
                        .col(
                            ColumnDef::new(Drugs::IsSpecial)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Drugs::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Drugs::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_drugs_name")
                        .table(Drugs::Table)
                        .col(Drugs::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Drugs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Drugs {
        Table,
        Id,
        Name,
        Specification,
        Manufacturer,
        StorageLocation,
        IsSpecial,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_stock_batches_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stock_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockBatches::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockBatches::DrugId).big_integer().not_null())
                        .col(ColumnDef::new(StockBatches::BatchNumber).string().not_null())
                        .col(
                            ColumnDef::new(StockBatches::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockBatches::ExpiryDate).date().null())
                        .col(ColumnDef::new(StockBatches::ProductionDate).date().null())
                        .col(ColumnDef::new(StockBatches::StorageLocation).string().null())
                        .col(ColumnDef::new(StockBatches::Manufacturer).string().null())
                        .col(ColumnDef::new(StockBatches::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(StockBatches::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // The ledger key: one row per (drug, batch)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_stock_batches_drug_batch")
                        .table(StockBatches::Table)
                        .col(StockBatches::DrugId)
                        .col(StockBatches::BatchNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_batches_expiry_date")
                        .table(StockBatches::Table)
                        .col(StockBatches::ExpiryDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockBatches {
        Table,
        Id,
        DrugId,
        BatchNumber,
        Quantity,
        ExpiryDate,
        ProductionDate,
        StorageLocation,
        Manufacturer,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_procurement_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_procurement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::SupplierName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::LogisticsNumber)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::ShippedAt).timestamp().null())
                        .col(ColumnDef::new(PurchaseOrders::RejectReason).string().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Document numbers collide under concurrency; the unique index is
            // what turns a collision into a retryable error.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_purchase_orders_order_number")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::OrderId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::DrugId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::OrderedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_purchase_order_lines_order_drug")
                        .table(PurchaseOrderLines::Table)
                        .col(PurchaseOrderLines::OrderId)
                        .col(PurchaseOrderLines::DrugId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseOrders {
        Table,
        Id,
        OrderNumber,
        SupplierName,
        Status,
        LogisticsNumber,
        ShippedAt,
        RejectReason,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseOrderLines {
        Table,
        Id,
        OrderId,
        DrugId,
        OrderedQuantity,
        CreatedAt,
    }
}

mod m20240301_000004_create_inbound_receipts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_inbound_receipts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InboundReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InboundReceipts::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::ReceiptNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InboundReceipts::OrderId).big_integer().null())
                        .col(
                            ColumnDef::new(InboundReceipts::DrugId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InboundReceipts::Quantity).integer().not_null())
                        .col(ColumnDef::new(InboundReceipts::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(InboundReceipts::ArrivalDate)
                                .date()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InboundReceipts::ProductionDate).date().null())
                        .col(ColumnDef::new(InboundReceipts::Manufacturer).string().null())
                        .col(
                            ColumnDef::new(InboundReceipts::DeliveryNoteRef)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::OperatorId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::SecondOperatorId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::Acceptance)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::ExpiryTier)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::ExpiryOverrideReason)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::WarningAcknowledged)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(InboundReceipts::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_inbound_receipts_receipt_number")
                        .table(InboundReceipts::Table)
                        .col(InboundReceipts::ReceiptNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // Receipt reconciliation reads by (order, drug)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inbound_receipts_order_drug")
                        .table(InboundReceipts::Table)
                        .col(InboundReceipts::OrderId)
                        .col(InboundReceipts::DrugId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inbound_receipts_created_at")
                        .table(InboundReceipts::Table)
                        .col(InboundReceipts::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InboundReceipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InboundReceipts {
        Table,
        Id,
        ReceiptNumber,
        OrderId,
        DrugId,
        BatchNumber,
        Quantity,
        ExpiryDate,
        ArrivalDate,
        ProductionDate,
        Manufacturer,
        DeliveryNoteRef,
        OperatorId,
        SecondOperatorId,
        Acceptance,
        ExpiryTier,
        ExpiryOverrideReason,
        WarningAcknowledged,
        CreatedAt,
    }
}

mod m20240301_000005_create_outbound_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_outbound_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OutboundApplications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboundApplications::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::ApplicationNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::ApplicantId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::Department)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::Purpose)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::ApproverId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::SecondApproverId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::ApprovedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::RejectReason)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::IssuedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplications::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_outbound_applications_application_number")
                        .table(OutboundApplications::Table)
                        .col(OutboundApplications::ApplicationNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OutboundApplicationLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboundApplicationLines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplicationLines::ApplicationId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplicationLines::DrugId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplicationLines::BatchNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplicationLines::RequestedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplicationLines::ActualQuantity)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboundApplicationLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_outbound_application_lines_application_id")
                        .table(OutboundApplicationLines::Table)
                        .col(OutboundApplicationLines::ApplicationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(OutboundApplicationLines::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(OutboundApplications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum OutboundApplications {
        Table,
        Id,
        ApplicationNumber,
        ApplicantId,
        Department,
        Purpose,
        Status,
        ApproverId,
        SecondApproverId,
        ApprovedAt,
        RejectReason,
        IssuedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OutboundApplicationLines {
        Table,
        Id,
        ApplicationId,
        DrugId,
        BatchNumber,
        RequestedQuantity,
        ActualQuantity,
        CreatedAt,
    }
}

mod m20240301_000006_create_stock_adjustments_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_stock_adjustments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAdjustments::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::AdjustmentNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::DrugId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::QuantityBefore)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::QuantityAfter)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::AdjustmentDelta)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::Reason).string().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::OperatorId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::SecondOperatorId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_stock_adjustments_adjustment_number")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::AdjustmentNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAdjustments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockAdjustments {
        Table,
        Id,
        AdjustmentNumber,
        DrugId,
        BatchNumber,
        QuantityBefore,
        QuantityAfter,
        AdjustmentDelta,
        Reason,
        OperatorId,
        SecondOperatorId,
        CreatedAt,
    }
}

mod m20240301_000007_create_app_settings_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_app_settings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AppSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AppSettings::SettingKey)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(AppSettings::SettingValue)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AppSettings::Description).string().null())
                        .col(
                            ColumnDef::new(AppSettings::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AppSettings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum AppSettings {
        Table,
        SettingKey,
        SettingValue,
        Description,
        UpdatedAt,
    }
}
