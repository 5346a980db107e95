pub use sea_orm_migration::prelude::*;

mod m20240201_000001_create_vendors_table;
mod m20240201_000002_create_purchase_orders_table;
mod m20240201_000003_create_historical_performance_table;
mod m20240901_000004_create_auth_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240201_000001_create_vendors_table::Migration),
            Box::new(m20240201_000002_create_purchase_orders_table::Migration),
            Box::new(m20240201_000003_create_historical_performance_table::Migration),
            Box::new(m20240901_000004_create_auth_tables::Migration),
        ]
    }
}
