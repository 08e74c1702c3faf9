//! Database migrations, shared by both the authoritative (Postgres)
//! and local (SQLite) backends — both run the same schema.

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_initial_tables;
mod m20260101_000002_create_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_initial_tables::Migration),
            Box::new(m20260101_000002_create_indexes::Migration),
        ]
    }
}
