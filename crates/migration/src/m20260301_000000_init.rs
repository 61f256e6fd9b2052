//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for Stockroom:
//!
//! - `actors`: mirrored identities and their roles
//! - `products`: stock items, versioned for compare-and-swap writes
//! - `stock_movements`: append-only log explaining every stock change
//! - `service_orders` / `service_parts`: repair jobs and the parts they used
//! - `transactions`: the financial ledger
//! - `petty_cash`: the internal cash box
//! - `permission_requests`: proposed mutations awaiting an admin

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Actors {
    Table,
    Id,
    Name,
    Role,
}

#[derive(Iden)]
enum Products {
    Table,
    Id,
    Name,
    Category,
    PriceMinor,
    CostPriceMinor,
    Stock,
    MinStock,
    Status,
    Version,
    Deleted,
    CreatedAt,
}

#[derive(Iden)]
enum StockMovements {
    Table,
    Id,
    ProductId,
    ActorId,
    Direction,
    Quantity,
    Reason,
    OccurredAt,
}

#[derive(Iden)]
enum ServiceOrders {
    Table,
    Id,
    ClientName,
    ClientPhone,
    DeviceModel,
    Description,
    Status,
    PriceMinor,
    CostMinor,
    CreatedAt,
    DeliveredAt,
}

#[derive(Iden)]
enum ServiceParts {
    Table,
    Id,
    ServiceOrderId,
    ProductId,
    Quantity,
    UnitPriceMinor,
    UnitCostMinor,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    Kind,
    AmountMinor,
    CostAmountMinor,
    Category,
    Description,
    Status,
    ClientName,
    StockMovementId,
    ServiceOrderId,
    OccurredAt,
    DueAt,
    CreatedBy,
}

#[derive(Iden)]
enum PettyCash {
    Table,
    Id,
    Kind,
    AmountMinor,
    Description,
    OccurredAt,
    CreatedBy,
}

#[derive(Iden)]
enum PermissionRequests {
    Table,
    Id,
    RequesterId,
    Kind,
    Payload,
    TargetId,
    Status,
    Note,
    CreatedAt,
    ResolvedAt,
    ResolvedBy,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Actors
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Actors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Actors::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Actors::Name).string().not_null())
                    .col(ColumnDef::new(Actors::Role).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Products
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Category).string())
                    .col(
                        ColumnDef::new(Products::PriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::CostPriceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Products::Stock).big_integer().not_null())
                    .col(
                        ColumnDef::new(Products::MinStock)
                            .big_integer()
                            .not_null()
                            .default(5),
                    )
                    .col(
                        ColumnDef::new(Products::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Products::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(Expr::col(Products::Stock).gte(0))
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Stock movements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(StockMovements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockMovements::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockMovements::ActorId).uuid().not_null())
                    .col(ColumnDef::new(StockMovements::Direction).string().not_null())
                    .col(
                        ColumnDef::new(StockMovements::Quantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMovements::Reason).string().not_null())
                    .col(
                        ColumnDef::new(StockMovements::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(Expr::col(StockMovements::Quantity).gt(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-stock_movements-product_id")
                            .from(StockMovements::Table, StockMovements::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-stock_movements-actor_id")
                            .from(StockMovements::Table, StockMovements::ActorId)
                            .to(Actors::Table, Actors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stock_movements-product_id-occurred_at")
                    .table(StockMovements::Table)
                    .col(StockMovements::ProductId)
                    .col(StockMovements::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Service orders and parts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ServiceOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServiceOrders::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ServiceOrders::ClientName).string().not_null())
                    .col(ColumnDef::new(ServiceOrders::ClientPhone).string())
                    .col(
                        ColumnDef::new(ServiceOrders::DeviceModel)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ServiceOrders::Description).string())
                    .col(
                        ColumnDef::new(ServiceOrders::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::PriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::CostMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ServiceOrders::DeliveredAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServiceParts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServiceParts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ServiceParts::ServiceOrderId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ServiceParts::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(ServiceParts::Quantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceParts::UnitPriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceParts::UnitCostMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-service_parts-service_order_id")
                            .from(ServiceParts::Table, ServiceParts::ServiceOrderId)
                            .to(ServiceOrders::Table, ServiceOrders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-service_parts-product_id")
                            .from(ServiceParts::Table, ServiceParts::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CostAmountMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Transactions::Category).string().not_null())
                    .col(ColumnDef::new(Transactions::Description).string().not_null())
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(ColumnDef::new(Transactions::ClientName).string())
                    .col(ColumnDef::new(Transactions::StockMovementId).uuid())
                    .col(ColumnDef::new(Transactions::ServiceOrderId).uuid())
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::DueAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::CreatedBy).uuid().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-stock_movement_id")
                            .from(Transactions::Table, Transactions::StockMovementId)
                            .to(StockMovements::Table, StockMovements::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-service_order_id")
                            .from(Transactions::Table, Transactions::ServiceOrderId)
                            .to(ServiceOrders::Table, ServiceOrders::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // At most one ledger row per movement.
        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-stock_movement_id-unique")
                    .table(Transactions::Table)
                    .col(Transactions::StockMovementId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Petty cash
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PettyCash::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PettyCash::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PettyCash::Kind).string().not_null())
                    .col(ColumnDef::new(PettyCash::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(PettyCash::Description).string().not_null())
                    .col(
                        ColumnDef::new(PettyCash::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PettyCash::CreatedBy).uuid().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Permission requests
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PermissionRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermissionRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PermissionRequests::RequesterId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PermissionRequests::Kind).string().not_null())
                    .col(ColumnDef::new(PermissionRequests::Payload).text().not_null())
                    .col(ColumnDef::new(PermissionRequests::TargetId).uuid())
                    .col(
                        ColumnDef::new(PermissionRequests::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(PermissionRequests::Note).string())
                    .col(
                        ColumnDef::new(PermissionRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PermissionRequests::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PermissionRequests::ResolvedBy).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-permission_requests-requester_id")
                            .from(PermissionRequests::Table, PermissionRequests::RequesterId)
                            .to(Actors::Table, Actors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-permission_requests-status-kind-target_id")
                    .table(PermissionRequests::Table)
                    .col(PermissionRequests::Status)
                    .col(PermissionRequests::Kind)
                    .col(PermissionRequests::TargetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(PermissionRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PettyCash::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ServiceParts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ServiceOrders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockMovements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Actors::Table).to_owned())
            .await?;
        Ok(())
    }
}
