use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_shipment_lines_table::Migration),
            Box::new(m20240101_000002_create_inbound_records_table::Migration),
            Box::new(m20240101_000003_create_return_orders_table::Migration),
            Box::new(m20240101_000004_create_product_parts_table::Migration),
        ]
    }
}

mod m20240101_000001_create_shipment_lines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_shipment_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentLines::TrackingNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentLines::TrackingKey).string().not_null())
                        .col(ColumnDef::new(ShipmentLines::OrderId).string().not_null())
                        .col(ColumnDef::new(ShipmentLines::Sku).string().not_null())
                        .col(ColumnDef::new(ShipmentLines::Fnsku).string().null())
                        .col(ColumnDef::new(ShipmentLines::DeclaredName).string().not_null())
                        .col(ColumnDef::new(ShipmentLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(ShipmentLines::Status)
                                .string_len(16)
                                .not_null()
                                .default("shipping"),
                        )
                        .col(ColumnDef::new(ShipmentLines::Carrier).string().null())
                        .col(
                            ColumnDef::new(ShipmentLines::DuplicateConfirmed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(ShipmentLines::Note).text().null())
                        .col(
                            ColumnDef::new(ShipmentLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Tracking lookups go through the normalized key
            manager
                .create_index(
                    Index::create()
                        .name("idx_shipment_lines_tracking_key")
                        .table(ShipmentLines::Table)
                        .col(ShipmentLines::TrackingKey)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShipmentLines {
        Table,
        Id,
        TrackingNumber,
        TrackingKey,
        OrderId,
        Sku,
        Fnsku,
        DeclaredName,
        Quantity,
        Status,
        Carrier,
        DuplicateConfirmed,
        Note,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_inbound_records_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_inbound_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InboundRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InboundRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        // The constraint that makes two devices racing on one LPN safe
                        .col(
                            ColumnDef::new(InboundRecords::Lpn)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(InboundRecords::ShipmentLineId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundRecords::TrackingNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InboundRecords::Sku).string().not_null())
                        .col(
                            ColumnDef::new(InboundRecords::Grade)
                                .string_len(1)
                                .not_null()
                                .default("A"),
                        )
                        .col(ColumnDef::new(InboundRecords::MissingParts).json().not_null())
                        .col(
                            ColumnDef::new(InboundRecords::ProcessedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inbound_records_tracking_number")
                        .table(InboundRecords::Table)
                        .col(InboundRecords::TrackingNumber)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inbound_records_shipment_line_id")
                        .table(InboundRecords::Table)
                        .col(InboundRecords::ShipmentLineId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InboundRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InboundRecords {
        Table,
        Id,
        Lpn,
        ShipmentLineId,
        TrackingNumber,
        Sku,
        Grade,
        MissingParts,
        ProcessedAt,
    }
}

mod m20240101_000003_create_return_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_return_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReturnOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnOrders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(ReturnOrders::Lpn).string().not_null())
                        .col(ColumnDef::new(ReturnOrders::LpnKey).string().not_null())
                        .col(ColumnDef::new(ReturnOrders::Sku).string().not_null())
                        .col(ColumnDef::new(ReturnOrders::ProductName).string().not_null())
                        .col(
                            ColumnDef::new(ReturnOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_return_orders_lpn_key")
                        .table(ReturnOrders::Table)
                        .col(ReturnOrders::LpnKey)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReturnOrders {
        Table,
        Id,
        OrderNumber,
        Lpn,
        LpnKey,
        Sku,
        ProductName,
        CreatedAt,
    }
}

mod m20240101_000004_create_product_parts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_product_parts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductParts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductParts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductParts::Sku).string().not_null())
                        .col(ColumnDef::new(ProductParts::SkuKey).string().not_null())
                        .col(ColumnDef::new(ProductParts::PartName).string().not_null())
                        .col(
                            ColumnDef::new(ProductParts::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_product_parts_sku_key")
                        .table(ProductParts::Table)
                        .col(ProductParts::SkuKey)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductParts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductParts {
        Table,
        Id,
        Sku,
        SkuKey,
        PartName,
        Position,
    }
}
