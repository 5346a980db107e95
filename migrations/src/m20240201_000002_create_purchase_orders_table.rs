use sea_orm_migration::prelude::*;

use crate::m20240201_000001_create_vendors_table::Vendors;

#[derive(DeriveMigrationName)]
pub struct Migration;

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
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::PoNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PurchaseOrders::VendorId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseOrders::OrderDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::DeliveryDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::DeliveredDate)
                            .timestamp()
                            .null(),
                    )
                    .col(ColumnDef::new(PurchaseOrders::Items).json().not_null())
                    .col(ColumnDef::new(PurchaseOrders::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(PurchaseOrders::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(PurchaseOrders::QualityRating).double().null())
                    .col(
                        ColumnDef::new(PurchaseOrders::IssueDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::AcknowledgmentDate)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurchaseOrders::UpdatedAt).timestamp().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_orders_vendor_id")
                            .from(PurchaseOrders::Table, PurchaseOrders::VendorId)
                            .to(Vendors::Table, Vendors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_orders_vendor_id")
                    .table(PurchaseOrders::Table)
                    .col(PurchaseOrders::VendorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_orders_status_delivery")
                    .table(PurchaseOrders::Table)
                    .col(PurchaseOrders::Status)
                    .col(PurchaseOrders::DeliveryDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PurchaseOrders {
    Table,
    Id,
    PoNumber,
    VendorId,
    OrderDate,
    DeliveryDate,
    DeliveredDate,
    Items,
    Quantity,
    Status,
    QualityRating,
    IssueDate,
    AcknowledgmentDate,
    CreatedAt,
    UpdatedAt,
}
