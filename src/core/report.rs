//! Raffle and ticket reports for the admin dashboard.
//!
//! All amounts are computed from payment rows at read time. Only tickets that have left
//! the available pool count as sold.

use crate::{
    core::ticket::get_payments_for_ticket,
    entities::{Payment, Raffle, Ticket, TicketStatus, User, payment, raffle, ticket, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use std::collections::HashMap;

/// One ticket row on the dashboard.
#[derive(Debug, Clone)]
pub struct TicketSummary {
    /// The ticket
    pub ticket: ticket::Model,
    /// Customer holding it, if any
    pub holder: Option<user::Model>,
    /// Sum of its payments
    pub total_paid: f64,
    /// Amount still owed, never negative
    pub remaining: f64,
}

/// Dashboard totals for one raffle.
#[derive(Debug, Clone)]
pub struct RaffleSummary {
    /// The raffle being reported on
    pub raffle: raffle::Model,
    /// Every ticket in ascending number order
    pub tickets: Vec<TicketSummary>,
    /// Money collected on sold tickets
    pub total_collected: f64,
    /// Money still owed on sold tickets
    pub pending_amount: f64,
    /// Tickets that are reserved or paid
    pub sold_count: usize,
    /// Size of the ticket pool
    pub total_tickets: usize,
}

/// Everything the admin needs to act on one ticket.
#[derive(Debug, Clone)]
pub struct TicketDetails {
    /// The ticket
    pub ticket: ticket::Model,
    /// Customer holding it, if any
    pub holder: Option<user::Model>,
    /// Payments, newest first
    pub payments: Vec<payment::Model>,
    /// Raffle unit price
    pub price: f64,
    /// Sum of the payments
    pub total_paid: f64,
    /// Amount still owed, never negative
    pub remaining: f64,
}

fn remaining(price: f64, paid: f64) -> f64 {
    (price - paid).max(0.0)
}

/// Builds the dashboard summary for a raffle.
///
/// Payment totals come from one grouped aggregate query over the raffle's tickets.
pub async fn raffle_summary(db: &DatabaseConnection, raffle_id: i64) -> Result<RaffleSummary> {
    let raffle = Raffle::find_by_id(raffle_id)
        .one(db)
        .await?
        .ok_or(Error::RaffleNotFound { id: raffle_id })?;

    let totals: HashMap<i64, f64> = Payment::find()
        .select_only()
        .column(payment::Column::TicketId)
        .column_as(payment::Column::Amount.sum(), "total")
        .inner_join(Ticket)
        .filter(ticket::Column::RaffleId.eq(raffle_id))
        .group_by(payment::Column::TicketId)
        .into_tuple::<(i64, Option<f64>)>()
        .all(db)
        .await?
        .into_iter()
        .map(|(ticket_id, total)| (ticket_id, total.unwrap_or(0.0)))
        .collect();

    let rows = Ticket::find()
        .filter(ticket::Column::RaffleId.eq(raffle_id))
        .order_by_asc(ticket::Column::Number)
        .find_also_related(User)
        .all(db)
        .await?;

    let price = raffle.ticket_price;
    let mut total_collected = 0.0;
    let mut pending_amount = 0.0;
    let mut sold_count = 0;

    let tickets: Vec<TicketSummary> = rows
        .into_iter()
        .map(|(ticket, holder)| {
            let total_paid = totals.get(&ticket.id).copied().unwrap_or(0.0);
            let remaining = remaining(price, total_paid);
            if ticket.status != TicketStatus::Available {
                total_collected += total_paid;
                pending_amount += remaining;
                sold_count += 1;
            }
            TicketSummary {
                ticket,
                holder,
                total_paid,
                remaining,
            }
        })
        .collect();

    Ok(RaffleSummary {
        raffle,
        total_tickets: tickets.len(),
        tickets,
        total_collected,
        pending_amount,
        sold_count,
    })
}

/// Loads a ticket with its holder, payments and price.
pub async fn ticket_details(db: &DatabaseConnection, ticket_id: i64) -> Result<TicketDetails> {
    let (ticket, holder) = Ticket::find_by_id(ticket_id)
        .find_also_related(User)
        .one(db)
        .await?
        .ok_or_else(|| Error::TicketNotFound {
            ticket: ticket_id.to_string(),
        })?;

    let raffle = Raffle::find_by_id(ticket.raffle_id)
        .one(db)
        .await?
        .ok_or(Error::RaffleNotFound {
            id: ticket.raffle_id,
        })?;

    let payments = get_payments_for_ticket(db, ticket.id).await?;
    let total_paid: f64 = payments.iter().map(|p| p.amount).sum();

    Ok(TicketDetails {
        ticket,
        holder,
        payments,
        price: raffle.ticket_price,
        total_paid,
        remaining: remaining(raffle.ticket_price, total_paid),
    })
}
