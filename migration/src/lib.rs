pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20250610_000001_visitor_count;
mod m20250610_000002_visitor_info;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250610_000001_visitor_count::Migration),
            Box::new(m20250610_000002_visitor_info::Migration),
        ]
    }
}
