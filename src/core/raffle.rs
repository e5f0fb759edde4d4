//! Raffle business logic - Creating raffles and their ticket pools.
//!
//! A raffle and all of its tickets are written in one transaction: either the raffle row
//! and its full ticket pool become visible together, or nothing does. Several raffles may
//! be active at the same time; creating a new one never archives the others.

use crate::{
    entities::{Raffle, RaffleStatus, Ticket, TicketStatus, raffle, ticket},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Hours a reservation may stay unpaid before the expiry sweep may release it.
pub const DEFAULT_RESERVE_HOURS: i32 = 24;

// Rows per INSERT statement, keeps bound parameters well under SQLite's limit.
const TICKET_INSERT_BATCH: usize = 250;

/// Size of the ticket pool, chosen by the raffle type flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaffleKind {
    /// 100 tickets numbered `00`..`99`
    Terminal,
    /// 1000 tickets numbered `000`..`999`
    Triple,
}

impl RaffleKind {
    /// Number of tickets generated for this kind.
    #[must_use]
    pub const fn total_numbers(self) -> i32 {
        match self {
            Self::Terminal => 100,
            Self::Triple => 1000,
        }
    }

    /// Digits in each zero-padded ticket number.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Terminal => 2,
            Self::Triple => 3,
        }
    }

    /// Formats `n` as a ticket number of this kind (`7` becomes `"07"` or `"007"`).
    #[must_use]
    pub fn ticket_number(self, n: i32) -> String {
        format!("{n:0width$}", width = self.width())
    }
}

impl FromStr for RaffleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" => Ok(Self::Terminal),
            "triple" => Ok(Self::Triple),
            _ => Err(Error::InvalidRaffleType {
                kind: s.to_string(),
            }),
        }
    }
}

/// Rejects prices and amounts that are not positive finite numbers.
pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Creates a raffle together with its complete pool of available tickets.
///
/// # Arguments
/// * `name` - Display name, must not be blank
/// * `price` - Unit price of one ticket, must be positive
/// * `kind` - Pool size: 100 two-digit or 1000 three-digit numbers
///
/// # Errors
/// Validation errors are returned before any transaction opens. If any ticket insert
/// fails, the whole transaction is rolled back and the raffle row is not committed.
#[instrument(skip(db))]
pub async fn create_raffle(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
    kind: RaffleKind,
) -> Result<raffle::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation {
            message: "Raffle name cannot be empty".to_string(),
        });
    }
    validate_amount(price)?;

    let txn = db.begin().await?;

    let raffle = raffle::ActiveModel {
        name: Set(name.to_string()),
        total_numbers: Set(kind.total_numbers()),
        ticket_price: Set(price),
        reserve_hours: Set(DEFAULT_RESERVE_HOURS),
        status: Set(RaffleStatus::Active),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let tickets: Vec<ticket::ActiveModel> = (0..kind.total_numbers())
        .map(|n| ticket::ActiveModel {
            raffle_id: Set(raffle.id),
            number: Set(kind.ticket_number(n)),
            user_id: Set(None),
            status: Set(TicketStatus::Available),
            reserved_at: Set(None),
            ..Default::default()
        })
        .collect();

    for batch in tickets.chunks(TICKET_INSERT_BATCH) {
        if let Err(e) = Ticket::insert_many(batch.iter().cloned()).exec(&txn).await {
            txn.rollback().await?;
            warn!(name, "Ticket pool insert failed, raffle not created: {}", e);
            return Err(e.into());
        }
    }

    txn.commit().await?;

    info!(
        raffle_id = raffle.id,
        tickets = raffle.total_numbers,
        "Created raffle '{}'",
        raffle.name
    );
    Ok(raffle)
}

/// Finds a raffle by its id.
pub async fn get_raffle(db: &DatabaseConnection, raffle_id: i64) -> Result<Option<raffle::Model>> {
    Raffle::find_by_id(raffle_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the raffles that are still selling, newest first.
pub async fn list_active_raffles(db: &DatabaseConnection) -> Result<Vec<raffle::Model>> {
    Raffle::find()
        .filter(raffle::Column::Status.eq(RaffleStatus::Active))
        .order_by_desc(raffle::Column::CreatedAt)
        .order_by_desc(raffle::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a raffle as finished. Its tickets and payments are left as they are.
#[instrument(skip(db))]
pub async fn finish_raffle(db: &DatabaseConnection, raffle_id: i64) -> Result<raffle::Model> {
    let raffle = Raffle::find_by_id(raffle_id)
        .one(db)
        .await?
        .ok_or(Error::RaffleNotFound { id: raffle_id })?;

    if raffle.status == RaffleStatus::Finished {
        return Ok(raffle);
    }

    let mut active: raffle::ActiveModel = raffle.into();
    active.status = Set(RaffleStatus::Finished);
    let raffle = active.update(db).await?;

    info!(raffle_id, "Raffle finished");
    Ok(raffle)
}
