use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_meals_table::Migration),
            Box::new(m20240601_000002_create_orders_table::Migration),
            Box::new(m20240601_000003_create_order_lines_table::Migration),
            Box::new(m20240715_000004_add_orders_attempted_reference::Migration),
        ]
    }
}

mod m20240601_000001_create_meals_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_meals_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Meals::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Meals::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Meals::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Meals::Category).string_len(50).not_null())
                        .col(ColumnDef::new(Meals::Description).string_len(500).null())
                        .col(ColumnDef::new(Meals::ImageUrl).string().null())
                        .col(ColumnDef::new(Meals::PriceMinor).big_integer().not_null())
                        .col(
                            ColumnDef::new(Meals::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Meals::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Meals::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_meals_category_name")
                        .table(Meals::Table)
                        .col(Meals::Category)
                        .col(Meals::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Meals::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Meals {
        Table,
        Id,
        Name,
        Category,
        Description,
        ImageUrl,
        PriceMinor,
        IsAvailable,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::order Model
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string_len(100).not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::DeliveryAddress)
                                .string_len(300)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Notes).string_len(500).null())
                        .col(ColumnDef::new(Orders::SubtotalMinor).big_integer().not_null())
                        .col(ColumnDef::new(Orders::DeliveryMinor).big_integer().not_null())
                        .col(ColumnDef::new(Orders::TotalMinor).big_integer().not_null())
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentState)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Orders::PaymentReference).string_len(100).null())
                        .col(ColumnDef::new(Orders::FailureReason).string_len(32).null())
                        .col(
                            ColumnDef::new(Orders::PaidAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // A gateway reference may settle at most one order
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_orders_payment_reference")
                        .table(Orders::Table)
                        .col(Orders::PaymentReference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_payment_state")
                        .table(Orders::Table)
                        .col(Orders::PaymentState)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        CustomerName,
        CustomerPhone,
        DeliveryAddress,
        Notes,
        SubtotalMinor,
        DeliveryMinor,
        TotalMinor,
        Currency,
        PaymentState,
        PaymentReference,
        FailureReason,
        PaidAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_order_lines_table {

    use super::m20240601_000002_create_orders_table::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_order_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::order_line Model
            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::MealId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(OrderLines::UnitPriceMinor)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderLines::LineTotalMinor)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::Position).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_lines_order_id")
                                .from(OrderLines::Table, OrderLines::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_lines_order_id")
                        .table(OrderLines::Table)
                        .col(OrderLines::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderLines {
        Table,
        Id,
        OrderId,
        MealId,
        Name,
        UnitPriceMinor,
        Quantity,
        LineTotalMinor,
        Position,
    }
}

mod m20240715_000004_add_orders_attempted_reference {

    use super::m20240601_000002_create_orders_table::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240715_000004_add_orders_attempted_reference"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // rejected attempts keep their reference here so the unique column
            // stays reserved for the verified order
            manager
                .alter_table(
                    Table::alter()
                        .table(Orders::Table)
                        .add_column(ColumnDef::new(AttemptedReference).string_len(100).null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_attempted_reference")
                        .table(Orders::Table)
                        .col(AttemptedReference)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_orders_attempted_reference")
                        .table(Orders::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .alter_table(
                    Table::alter()
                        .table(Orders::Table)
                        .drop_column(AttemptedReference)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(DeriveIden)]
    struct AttemptedReference;
}
