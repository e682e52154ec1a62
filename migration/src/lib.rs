pub use sea_orm_migration::prelude::*;

mod m20260219_000001_create_tip_claims;
mod m20260219_000002_add_staff_wallets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260219_000001_create_tip_claims::Migration),
            Box::new(m20260219_000002_add_staff_wallets::Migration),
        ]
    }
}
