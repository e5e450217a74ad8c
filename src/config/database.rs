//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The composite payout index is declared
//! here explicitly because it spans two columns.

use crate::entities::{
    Holding, InvestmentRequest, Payout, Property, Transaction, TransferRequest, Wallet,
    WithdrawalRequest, payout,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Name of the UNIQUE index that makes payout runs idempotent.
pub const PAYOUT_PERIOD_INDEX: &str = "idx_payouts_holding_period";

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity
/// definitions, plus the `(holding_id, period)` unique index on payouts.
///
/// Safe to call on every start: tables and indexes are created only if missing.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = [
        schema.create_table_from_entity(Wallet),
        schema.create_table_from_entity(Property),
        schema.create_table_from_entity(Holding),
        schema.create_table_from_entity(Transaction),
        schema.create_table_from_entity(Payout),
        schema.create_table_from_entity(WithdrawalRequest),
        schema.create_table_from_entity(InvestmentRequest),
        schema.create_table_from_entity(TransferRequest),
    ];

    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let payout_period_index = Index::create()
        .name(PAYOUT_PERIOD_INDEX)
        .table(Payout)
        .col(payout::Column::HoldingId)
        .col(payout::Column::Period)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&payout_period_index)).await?;

    info!("Database tables ensured");
    Ok(())
}

/// Connects and ensures the schema exists.
pub async fn init_database(database_url: &str) -> Result<DatabaseConnection> {
    let db = create_connection(database_url).await?;
    create_tables(&db).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{holding, payout::Model as PayoutModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<PayoutModel> = Payout::find().limit(1).all(&db).await?;
        let _: Vec<holding::Model> = Holding::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
