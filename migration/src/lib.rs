pub use sea_orm_migration::prelude::*;

mod m20210101_000001_create_hotspot_watermarks;
mod m20210101_000002_create_coin_coverage;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20210101_000001_create_hotspot_watermarks::Migration),
            Box::new(m20210101_000002_create_coin_coverage::Migration),
        ]
    }
}
