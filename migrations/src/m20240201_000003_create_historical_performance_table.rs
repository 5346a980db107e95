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
                    .table(HistoricalPerformance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HistoricalPerformance::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoricalPerformance::VendorId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoricalPerformance::Date)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoricalPerformance::OnTimeDeliveryRate)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoricalPerformance::QualityRatingAvg)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoricalPerformance::AverageResponseTime)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoricalPerformance::FulfillmentRate)
                            .double()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_historical_performance_vendor_id")
                            .from(
                                HistoricalPerformance::Table,
                                HistoricalPerformance::VendorId,
                            )
                            .to(Vendors::Table, Vendors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_historical_performance_vendor_date")
                    .table(HistoricalPerformance::Table)
                    .col(HistoricalPerformance::VendorId)
                    .col(HistoricalPerformance::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HistoricalPerformance::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum HistoricalPerformance {
    Table,
    Id,
    VendorId,
    Date,
    OnTimeDeliveryRate,
    QualityRatingAvg,
    AverageResponseTime,
    FulfillmentRate,
}
