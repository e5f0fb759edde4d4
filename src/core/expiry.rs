//! Reservation expiry sweep.
//!
//! The engine itself never expires anything. This sweep is the external scheduled
//! collaborator that enforces a raffle's `reserve_hours`: it looks for `reserved` tickets
//! held longer than their raffle allows and releases each one in its own transaction.
//! The scan is only a candidate list. Each release locks the ticket and checks again that
//! it is still an expired reservation, so a ticket paid, released or re-reserved after the
//! scan is left alone. Paid tickets are never touched.

use crate::{
    core::ticket::{Release, lock_ticket, reset_ticket},
    entities::{Raffle, Ticket, TicketStatus, raffle, ticket},
    errors::Result,
};
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{TransactionTrait, prelude::*};
use std::time::Duration;
use tracing::{debug, error, info, warn};

fn is_expired(ticket: &ticket::Model, raffle: &raffle::Model, now: DateTime<Utc>) -> bool {
    if ticket.status != TicketStatus::Reserved {
        return false;
    }
    let Some(hold) = TimeDelta::try_hours(i64::from(raffle.reserve_hours)) else {
        return false;
    };
    ticket
        .reserved_at
        .is_some_and(|reserved_at| reserved_at + hold <= now)
}

/// Finds reservations whose hold period ended at or before `now`.
pub async fn find_stale_reservations(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<ticket::Model>> {
    let reserved = Ticket::find()
        .filter(ticket::Column::Status.eq(TicketStatus::Reserved))
        .find_also_related(Raffle)
        .all(db)
        .await?;

    Ok(reserved
        .into_iter()
        .filter_map(|(ticket, raffle)| {
            let expired = raffle.is_some_and(|raffle| is_expired(&ticket, &raffle, now));
            expired.then_some(ticket)
        })
        .collect())
}

/// Releases one ticket if it is still an expired reservation at `now`.
///
/// The ticket row is locked before the check, so a concurrent payment either commits
/// first (and the check sees it) or waits until the release is done. Returns `None` when
/// the ticket no longer qualifies.
pub async fn release_if_expired(
    db: &DatabaseConnection,
    ticket_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Release>> {
    let txn = db.begin().await?;

    if !lock_ticket(&txn, ticket_id).await? {
        txn.rollback().await?;
        return Ok(None);
    }

    let current = Ticket::find_by_id(ticket_id)
        .find_also_related(Raffle)
        .one(&txn)
        .await?;
    let Some((ticket, Some(raffle))) = current else {
        txn.rollback().await?;
        return Ok(None);
    };
    if !is_expired(&ticket, &raffle, now) {
        txn.rollback().await?;
        debug!(ticket_id, status = ?ticket.status, "Ticket changed since the scan, kept");
        return Ok(None);
    }

    let release = reset_ticket(&txn, ticket).await?;
    txn.commit().await?;
    Ok(Some(release))
}

/// Releases every stale reservation and returns what was released.
///
/// A failure on one ticket is logged and does not stop the others.
pub async fn release_stale_reservations(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<Release>> {
    let stale = find_stale_reservations(db, now).await?;
    let mut released = Vec::with_capacity(stale.len());

    for ticket in stale {
        match release_if_expired(db, ticket.id, now).await {
            Ok(Some(release)) => {
                info!(
                    ticket_id = ticket.id,
                    raffle_id = ticket.raffle_id,
                    payments_removed = release.payments_removed,
                    "Expired reservation on ticket {} released",
                    ticket.number
                );
                released.push(release);
            }
            Ok(None) => {}
            Err(e) => warn!(ticket_id = ticket.id, "Failed to release expired reservation: {}", e),
        }
    }

    Ok(released)
}

/// Runs [`release_stale_reservations`] every `period` until the task is dropped.
pub async fn run_expiry_sweep(db: DatabaseConnection, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        match release_stale_reservations(&db, Utc::now()).await {
            Ok(released) if !released.is_empty() => {
                info!("Expiry sweep released {} reservation(s)", released.len());
            }
            Ok(_) => {}
            Err(e) => error!("Expiry sweep failed: {}", e),
        }
    }
}
