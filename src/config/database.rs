//! Database configuration module for the raffle ledger.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so foreign keys follow the `belongs_to` relations declared on the entities. The one
//! constraint that cannot be expressed per column, the uniqueness of a ticket number within
//! its raffle, is added as a composite unique index.

use crate::entities::{Payment, Raffle, Ticket, User, ticket};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

/// Default location of the ledger when neither settings nor `DATABASE_URL` name one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/raffle_ledger.sqlite?mode=rwc";

/// Establishes a connection to the ledger database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all ledger tables if they do not exist yet.
///
/// Order matters for the foreign keys: raffles and users first, then tickets,
/// then payments.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut raffle_table = schema.create_table_from_entity(Raffle);
    let mut user_table = schema.create_table_from_entity(User);
    let mut ticket_table = schema.create_table_from_entity(Ticket);
    let mut payment_table = schema.create_table_from_entity(Payment);

    for table in [
        &mut raffle_table,
        &mut user_table,
        &mut ticket_table,
        &mut payment_table,
    ] {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let ticket_number_index = Index::create()
        .name("idx_tickets_raffle_number")
        .table(Ticket)
        .col(ticket::Column::RaffleId)
        .col(ticket::Column::Number)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&ticket_number_index)).await?;

    info!("Ledger tables ensured (raffles, users, tickets, payments).");
    Ok(())
}
