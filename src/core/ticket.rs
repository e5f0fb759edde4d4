//! Ticket business logic - Reservation, payment and release of raffle tickets.
//!
//! Every mutating function here runs as a single database transaction. A ticket's stored
//! `status` is re-derived from the authoritative payment sum inside the same transaction
//! that changed its payments:
//! - `available`: no user, no payments
//! - `reserved`: has a user, payments below the raffle price
//! - `paid`: payments meet or exceed the raffle price
//!
//! Two customers racing for the same number are separated by a conditional update that
//! only moves a ticket out of `available` if it is still `available`; the loser's update
//! affects zero rows and its transaction is rolled back.

use crate::{
    core::{raffle::validate_amount, user::create_user},
    entities::{
        Payment, Raffle, RaffleStatus, Ticket, TicketStatus, User, payment, raffle, ticket, user,
    },
    errors::{Error, Result},
};
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, SimpleExpr},
};
use tracing::{debug, info, instrument};

/// Customer request to reserve a ticket by number.
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    /// Raffle the number belongs to
    pub raffle_id: i64,
    /// Display number, e.g. `"07"`
    pub number: String,
    /// Customer name
    pub name: String,
    /// Customer phone
    pub phone: String,
    /// First payment sent with the reservation
    pub amount: f64,
    /// Payment method tag
    pub method: String,
    /// Payment reference
    pub reference: String,
}

/// Admin request to record a payment against a ticket.
///
/// `user_id`, `name` and `phone` are only used when the ticket is still available, in which
/// case the admin is selling it on the spot: the ticket goes to the existing customer
/// `user_id` if given, otherwise to a new customer record built from `name` and `phone`.
#[derive(Debug, Clone, Default)]
pub struct PaymentRequest {
    /// Amount received
    pub amount: f64,
    /// Payment method tag
    pub method: String,
    /// Payment reference
    pub reference: String,
    /// Customer name for an on-the-spot sale
    pub name: Option<String>,
    /// Customer phone for an on-the-spot sale
    pub phone: Option<String>,
    /// Existing customer for an on-the-spot sale
    pub user_id: Option<i64>,
}

/// Result of a successful reservation.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// The ticket after the reservation
    pub ticket: ticket::Model,
    /// Newly created customer
    pub user: user::Model,
    /// Payment sent with the reservation
    pub payment: payment::Model,
    /// Sum of all payments on the ticket
    pub total_paid: f64,
}

/// Result of recording a payment.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    /// The ticket after the payment
    pub ticket: ticket::Model,
    /// The payment row that was inserted
    pub payment: payment::Model,
    /// Sum of all payments on the ticket
    pub total_paid: f64,
    /// True when this payment moved the ticket to `paid`
    pub settled: bool,
}

/// Result of releasing a ticket.
#[derive(Debug, Clone)]
pub struct Release {
    /// The ticket, back in the available pool
    pub ticket: ticket::Model,
    /// Number of payment rows deleted
    pub payments_removed: u64,
}

/// Sums all payments recorded for a ticket.
///
/// Run this on the transaction that just changed the payments; the result is the
/// authoritative amount collected, never a cached running total.
pub async fn total_paid<C>(db: &C, ticket_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total = Payment::find()
        .select_only()
        .column_as(payment::Column::Amount.sum(), "total")
        .filter(payment::Column::TicketId.eq(ticket_id))
        .into_tuple::<Option<f64>>()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0.0))
}

/// Re-derives `paid` from the payment sum and stores it if the sum reached the price.
async fn settle<C>(db: &C, ticket: ticket::Model, price: f64) -> Result<(ticket::Model, f64, bool)>
where
    C: ConnectionTrait,
{
    let total = total_paid(db, ticket.id).await?;
    if total < price || ticket.status == TicketStatus::Paid {
        return Ok((ticket, total, false));
    }

    let mut active: ticket::ActiveModel = ticket.into();
    active.status = Set(TicketStatus::Paid);
    let ticket = active.update(db).await?;
    info!(ticket_id = ticket.id, total, price, "Ticket {} settled", ticket.number);
    Ok((ticket, total, true))
}

async fn insert_payment<C>(
    db: &C,
    ticket_id: i64,
    amount: f64,
    method: String,
    reference: String,
    is_verified: bool,
) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    payment::ActiveModel {
        ticket_id: Set(ticket_id),
        amount: Set(amount),
        method: Set(method),
        reference: Set(reference),
        is_verified: Set(is_verified),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Takes the write lock on a ticket row with a self-assigning `UPDATE`.
///
/// Returns false if no ticket has this id.
pub(crate) async fn lock_ticket<C>(db: &C, ticket_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let locked = Ticket::update_many()
        .col_expr(
            ticket::Column::Status,
            SimpleExpr::from(Expr::col(ticket::Column::Status)),
        )
        .filter(ticket::Column::Id.eq(ticket_id))
        .exec(db)
        .await?
        .rows_affected;
    Ok(locked > 0)
}

/// Deletes a ticket's payments and clears its owner, status and reservation time.
pub(crate) async fn reset_ticket<C>(db: &C, ticket: ticket::Model) -> Result<Release>
where
    C: ConnectionTrait,
{
    let payments_removed = Payment::delete_many()
        .filter(payment::Column::TicketId.eq(ticket.id))
        .exec(db)
        .await?
        .rows_affected;

    let ticket = if ticket.status == TicketStatus::Available
        && ticket.user_id.is_none()
        && ticket.reserved_at.is_none()
    {
        ticket
    } else {
        let mut active: ticket::ActiveModel = ticket.into();
        active.user_id = Set(None);
        active.status = Set(TicketStatus::Available);
        active.reserved_at = Set(None);
        active.update(db).await?
    };

    Ok(Release {
        ticket,
        payments_removed,
    })
}

async fn raffle_for_ticket<C>(db: &C, ticket: &ticket::Model) -> Result<raffle::Model>
where
    C: ConnectionTrait,
{
    Raffle::find_by_id(ticket.raffle_id)
        .one(db)
        .await?
        .ok_or(Error::RaffleNotFound {
            id: ticket.raffle_id,
        })
}

/// Reserves an available ticket for a new customer and records their first payment.
///
/// The availability check and the move to `reserved` are one conditional `UPDATE`, so among
/// concurrent callers for the same number exactly one succeeds. The others get
/// [`Error::TicketUnavailable`] and leave no user or payment rows behind.
///
/// If the first payment already covers the price the ticket is settled straight to `paid`.
///
/// # Errors
/// * [`Error::InvalidAmount`] / [`Error::Validation`] before the transaction opens
/// * [`Error::RaffleNotFound`] if the raffle does not exist
/// * [`Error::TicketUnavailable`] if the number is taken, the raffle is finished, or the
///   number does not exist in the raffle
#[instrument(skip(db, request), fields(raffle_id = request.raffle_id, number = %request.number))]
pub async fn reserve_ticket(
    db: &DatabaseConnection,
    request: ReservationRequest,
) -> Result<Reservation> {
    validate_amount(request.amount)?;
    if request.name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Customer name cannot be empty".to_string(),
        });
    }

    let txn = db.begin().await?;

    let raffle = Raffle::find_by_id(request.raffle_id)
        .one(&txn)
        .await?
        .ok_or(Error::RaffleNotFound {
            id: request.raffle_id,
        })?;

    let now = chrono::Utc::now();
    let claimed = if raffle.status == RaffleStatus::Active {
        Ticket::update_many()
            .set(ticket::ActiveModel {
                status: Set(TicketStatus::Reserved),
                reserved_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(ticket::Column::RaffleId.eq(request.raffle_id))
            .filter(ticket::Column::Number.eq(request.number.as_str()))
            .filter(ticket::Column::Status.eq(TicketStatus::Available))
            .exec(&txn)
            .await?
            .rows_affected
    } else {
        0
    };

    if claimed == 0 {
        txn.rollback().await?;
        debug!("Reservation lost: ticket is not available");
        return Err(Error::TicketUnavailable {
            number: request.number,
        });
    }

    let user = create_user(&txn, request.name.trim(), request.phone.trim()).await?;

    let ticket = Ticket::find()
        .filter(ticket::Column::RaffleId.eq(request.raffle_id))
        .filter(ticket::Column::Number.eq(request.number.as_str()))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::TicketNotFound {
            ticket: request.number.clone(),
        })?;

    let mut active: ticket::ActiveModel = ticket.into();
    active.user_id = Set(Some(user.id));
    let ticket = active.update(&txn).await?;

    let payment = insert_payment(
        &txn,
        ticket.id,
        request.amount,
        request.method,
        request.reference,
        false,
    )
    .await?;

    let (ticket, total_paid, _) = settle(&txn, ticket, raffle.ticket_price).await?;

    txn.commit().await?;

    info!(
        ticket_id = ticket.id,
        user_id = user.id,
        amount = payment.amount,
        "Ticket {} reserved for {}",
        ticket.number,
        user.name
    );

    Ok(Reservation {
        ticket,
        user,
        payment,
        total_paid,
    })
}

/// Records a verified payment against a ticket, selling it on the spot if it is available.
///
/// The ticket row is locked first by a self-assigning `UPDATE`, so concurrent payments on the
/// same ticket serialize and the settlement check always sees every committed payment.
/// Partial payments leave the ticket `reserved`; once the sum reaches the raffle price the
/// ticket becomes `paid`.
///
/// # Errors
/// * [`Error::InvalidAmount`] before the transaction opens
/// * [`Error::TicketNotFound`] if no ticket has this id
/// * [`Error::Validation`] if the ticket is available and neither an existing customer nor a
///   name was given
#[instrument(skip(db, request), fields(amount = request.amount))]
pub async fn record_payment(
    db: &DatabaseConnection,
    ticket_id: i64,
    request: PaymentRequest,
) -> Result<PaymentReceipt> {
    validate_amount(request.amount)?;

    let txn = db.begin().await?;

    if !lock_ticket(&txn, ticket_id).await? {
        return Err(Error::TicketNotFound {
            ticket: ticket_id.to_string(),
        });
    }

    let mut ticket = Ticket::find_by_id(ticket_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::TicketNotFound {
            ticket: ticket_id.to_string(),
        })?;
    let raffle = raffle_for_ticket(&txn, &ticket).await?;

    if ticket.status == TicketStatus::Available {
        let user = match request.user_id {
            Some(user_id) => User::find_by_id(user_id)
                .one(&txn)
                .await?
                .ok_or_else(|| Error::Validation {
                    message: format!("Customer {user_id} does not exist"),
                })?,
            None => {
                let name = request
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| Error::Validation {
                        message: "Customer name is required to sell an available ticket"
                            .to_string(),
                    })?;
                let phone = request.phone.as_deref().map_or("", str::trim);
                create_user(&txn, name, phone).await?
            }
        };

        let mut active: ticket::ActiveModel = ticket.into();
        active.user_id = Set(Some(user.id));
        active.status = Set(TicketStatus::Reserved);
        active.reserved_at = Set(Some(chrono::Utc::now()));
        ticket = active.update(&txn).await?;
        info!(ticket_id, user_id = user.id, "Ticket {} sold on the spot", ticket.number);
    }

    let payment = insert_payment(
        &txn,
        ticket.id,
        request.amount,
        request.method,
        request.reference,
        true,
    )
    .await?;

    let (ticket, total_paid, settled) = settle(&txn, ticket, raffle.ticket_price).await?;

    txn.commit().await?;

    info!(
        ticket_id,
        amount = payment.amount,
        total_paid,
        "Payment recorded for ticket {}",
        ticket.number
    );

    Ok(PaymentReceipt {
        ticket,
        payment,
        total_paid,
        settled,
    })
}

/// Puts a ticket back into the available pool.
///
/// Deletes every payment on the ticket and clears its owner and reservation time. The ticket
/// row itself is kept. Releasing an already available ticket succeeds without changes.
///
/// # Errors
/// [`Error::TicketNotFound`] if no ticket has this id.
#[instrument(skip(db))]
pub async fn release_ticket(db: &DatabaseConnection, ticket_id: i64) -> Result<Release> {
    let txn = db.begin().await?;

    if !lock_ticket(&txn, ticket_id).await? {
        txn.rollback().await?;
        return Err(Error::TicketNotFound {
            ticket: ticket_id.to_string(),
        });
    }

    let ticket = Ticket::find_by_id(ticket_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::TicketNotFound {
            ticket: ticket_id.to_string(),
        })?;

    let release = reset_ticket(&txn, ticket).await?;

    txn.commit().await?;

    info!(
        ticket_id,
        payments_removed = release.payments_removed,
        "Ticket {} released",
        release.ticket.number
    );
    Ok(release)
}

/// Finds a ticket by its display number within a raffle.
pub async fn find_ticket_by_number(
    db: &DatabaseConnection,
    raffle_id: i64,
    number: &str,
) -> Result<Option<ticket::Model>> {
    Ticket::find()
        .filter(ticket::Column::RaffleId.eq(raffle_id))
        .filter(ticket::Column::Number.eq(number))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a raffle's tickets in ascending number order, optionally narrowed to numbers
/// containing `query`.
pub async fn list_tickets(
    db: &DatabaseConnection,
    raffle_id: i64,
    query: &str,
) -> Result<Vec<ticket::Model>> {
    let mut select = Ticket::find().filter(ticket::Column::RaffleId.eq(raffle_id));
    let query = query.trim();
    if !query.is_empty() {
        select = select.filter(ticket::Column::Number.contains(query));
    }
    select
        .order_by_asc(ticket::Column::Number)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the payments recorded for a ticket, newest first.
pub async fn get_payments_for_ticket<C>(db: &C, ticket_id: i64) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::TicketId.eq(ticket_id))
        .order_by_desc(payment::Column::CreatedAt)
        .order_by_desc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::PaginatorTrait;

    async fn ticket_07(db: &DatabaseConnection, raffle_id: i64) -> Result<ticket::Model> {
        Ok(find_ticket_by_number(db, raffle_id, "07").await?.unwrap())
    }

    #[tokio::test]
    async fn test_reserve_ticket_validation() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;

        let mut request = reservation(raffle.id, "07", 0.0);
        let result = reserve_ticket(&db, request.clone()).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0.0 })));

        request.amount = f64::INFINITY;
        let result = reserve_ticket(&db, request.clone()).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        request.amount = 5.0;
        request.name = "  ".to_string();
        let result = reserve_ticket(&db, request).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        assert_eq!(ticket_07(&db, raffle.id).await?.status, TicketStatus::Available);
        assert_eq!(User::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_payment_validation() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let ticket = ticket_07(&db, raffle.id).await?;

        let result = record_payment(&db, ticket.id, payment_request(-3.0)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -3.0 })));

        let result = record_payment(&db, ticket.id, payment_request(f64::NAN)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        assert_eq!(Payment::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_pay_release_scenario() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;

        let reservation = reserve_ticket(
            &db,
            ReservationRequest {
                raffle_id: raffle.id,
                number: "07".to_string(),
                name: "Ana".to_string(),
                phone: "555-1".to_string(),
                amount: 5.0,
                method: "cash".to_string(),
                reference: "ref1".to_string(),
            },
        )
        .await?;
        assert_eq!(reservation.ticket.number, "07");
        assert_eq!(reservation.ticket.status, TicketStatus::Reserved);
        assert_eq!(reservation.ticket.user_id, Some(reservation.user.id));
        assert!(reservation.ticket.reserved_at.is_some());
        assert_eq!(reservation.user.name, "Ana");
        assert_eq!(reservation.user.phone, "555-1");
        assert!(!reservation.payment.is_verified);
        assert_eq!(reservation.total_paid, 5.0);

        let receipt = record_payment(
            &db,
            reservation.ticket.id,
            PaymentRequest {
                amount: 5.0,
                method: "cash".to_string(),
                reference: "ref2".to_string(),
                ..Default::default()
            },
        )
        .await?;
        assert!(receipt.settled);
        assert!(receipt.payment.is_verified);
        assert_eq!(receipt.ticket.status, TicketStatus::Paid);
        assert_eq!(receipt.total_paid, 10.0);

        let release = release_ticket(&db, reservation.ticket.id).await?;
        assert_eq!(release.payments_removed, 2);
        assert_eq!(release.ticket.status, TicketStatus::Available);
        assert_eq!(release.ticket.user_id, None);
        assert_eq!(release.ticket.reserved_at, None);
        assert_eq!(total_paid(&db, reservation.ticket.id).await?, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_taken_ticket_is_unavailable_without_side_effects() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        reserve_ticket(&db, reservation(raffle.id, "07", 5.0)).await?;

        let result = reserve_ticket(&db, reservation(raffle.id, "07", 5.0)).await;
        assert!(matches!(result, Err(Error::TicketUnavailable { ref number }) if number == "07"));
        assert!(result.unwrap_err().is_conflict());

        assert_eq!(User::find().count(&db).await?, 1);
        assert_eq!(Payment::find().count(&db).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_unknown_number_or_raffle() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;

        let result = reserve_ticket(&db, reservation(raffle.id, "100", 5.0)).await;
        assert!(matches!(result, Err(Error::TicketUnavailable { .. })));

        let result = reserve_ticket(&db, reservation(999, "07", 5.0)).await;
        assert!(matches!(result, Err(Error::RaffleNotFound { id: 999 })));

        assert_eq!(User::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_in_finished_raffle_is_unavailable() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        crate::core::raffle::finish_raffle(&db, raffle.id).await?;

        let result = reserve_ticket(&db, reservation(raffle.id, "07", 5.0)).await;
        assert!(matches!(result, Err(Error::TicketUnavailable { .. })));
        assert_eq!(ticket_07(&db, raffle.id).await?.status, TicketStatus::Available);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_reservations_only_one_wins() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                let mut request = reservation(raffle.id, "42", 5.0);
                request.name = format!("Customer {i}");
                tokio::spawn(async move { reserve_ticket(&db, request).await })
            })
            .collect();

        let mut wins = 0;
        let mut unavailable = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(Error::TicketUnavailable { .. }) => unavailable += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(unavailable, 7);
        assert_eq!(User::find().count(&db).await?, 1);
        assert_eq!(Payment::find().count(&db).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_full_first_payment_settles_reservation() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let reservation = reserve_ticket(&db, reservation(raffle.id, "07", 10.0)).await?;
        assert_eq!(reservation.ticket.status, TicketStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_payments_settle_only_when_sum_reaches_price() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let reservation = reserve_ticket(&db, reservation(raffle.id, "07", 2.0)).await?;

        let first = record_payment(&db, reservation.ticket.id, payment_request(3.0)).await?;
        assert!(!first.settled);
        assert_eq!(first.ticket.status, TicketStatus::Reserved);
        assert_eq!(first.total_paid, 5.0);

        let second = record_payment(&db, reservation.ticket.id, payment_request(6.0)).await?;
        assert!(second.settled);
        assert_eq!(second.ticket.status, TicketStatus::Paid);
        assert_eq!(second.total_paid, 11.0);

        // Extra money on a paid ticket is recorded but does not settle twice
        let third = record_payment(&db, reservation.ticket.id, payment_request(1.0)).await?;
        assert!(!third.settled);
        assert_eq!(third.ticket.status, TicketStatus::Paid);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_payment_sells_available_ticket_on_the_spot() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let ticket = ticket_07(&db, raffle.id).await?;

        let receipt = record_payment(
            &db,
            ticket.id,
            PaymentRequest {
                amount: 4.0,
                method: "transfer".to_string(),
                reference: "T-1".to_string(),
                name: Some("Luis".to_string()),
                phone: Some("555-2".to_string()),
                user_id: None,
            },
        )
        .await?;

        assert_eq!(receipt.ticket.status, TicketStatus::Reserved);
        assert!(receipt.ticket.user_id.is_some());
        assert!(receipt.ticket.reserved_at.is_some());
        let user = User::find_by_id(receipt.ticket.user_id.unwrap())
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(user.name, "Luis");

        Ok(())
    }

    #[tokio::test]
    async fn test_record_payment_on_available_ticket_requires_name() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let ticket = ticket_07(&db, raffle.id).await?;

        let result = record_payment(&db, ticket.id, payment_request(4.0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // Rolled back: nothing changed
        assert_eq!(ticket_07(&db, raffle.id).await?.status, TicketStatus::Available);
        assert_eq!(Payment::find().count(&db).await?, 0);
        assert_eq!(User::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_payment_can_sell_to_existing_customer() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let first = reserve_ticket(&db, reservation(raffle.id, "06", 5.0)).await?;
        let ticket = ticket_07(&db, raffle.id).await?;

        let receipt = record_payment(
            &db,
            ticket.id,
            PaymentRequest {
                user_id: Some(first.user.id),
                ..payment_request(10.0)
            },
        )
        .await?;
        assert_eq!(receipt.ticket.user_id, Some(first.user.id));
        assert_eq!(receipt.ticket.status, TicketStatus::Paid);
        assert_eq!(User::find().count(&db).await?, 1);

        let other = find_ticket_by_number(&db, raffle.id, "08").await?.unwrap();
        let missing = record_payment(
            &db,
            other.id,
            PaymentRequest {
                user_id: Some(999),
                ..payment_request(1.0)
            },
        )
        .await;
        assert!(matches!(missing, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_record_payment_unknown_ticket() -> Result<()> {
        let db = setup_test_db().await?;
        let result = record_payment(&db, 999, payment_request(4.0)).await;
        assert!(matches!(result, Err(Error::TicketNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_payments_settle_on_true_sum() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let reservation = reserve_ticket(&db, reservation(raffle.id, "07", 1.0)).await?;

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let db = db.clone();
                let ticket_id = reservation.ticket.id;
                tokio::spawn(
                    async move { record_payment(&db, ticket_id, payment_request(3.0)).await },
                )
            })
            .collect();

        let mut settled = 0;
        for handle in handles {
            if handle.await.unwrap()?.settled {
                settled += 1;
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(total_paid(&db, reservation.ticket.id).await?, 10.0);
        assert_eq!(ticket_07(&db, raffle.id).await?.status, TicketStatus::Paid);

        Ok(())
    }

    #[tokio::test]
    async fn test_release_is_idempotent() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let reserved = reserve_ticket(&db, reservation(raffle.id, "07", 5.0)).await?;

        let first = release_ticket(&db, reserved.ticket.id).await?;
        assert_eq!(first.payments_removed, 1);
        assert_eq!(first.ticket.status, TicketStatus::Available);

        let second = release_ticket(&db, reserved.ticket.id).await?;
        assert_eq!(second.payments_removed, 0);
        assert_eq!(second.ticket, first.ticket);
        assert_eq!(get_payments_for_ticket(&db, reserved.ticket.id).await?.len(), 0);

        // Customer rows are never deleted
        assert_eq!(User::find().count(&db).await?, 1);

        // Released tickets can be reserved again
        let again = reserve_ticket(&db, reservation(raffle.id, "07", 5.0)).await?;
        assert_eq!(again.ticket.id, reserved.ticket.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_release_unknown_ticket_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = release_ticket(&db, 999).await;
        assert!(matches!(result, Err(Error::TicketNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_tickets_filters_by_number_substring() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;

        let sevens = list_tickets(&db, raffle.id, "7").await?;
        let numbers: Vec<&str> = sevens.iter().map(|t| t.number.as_str()).collect();
        assert_eq!(numbers.len(), 19);
        assert_eq!(numbers.first(), Some(&"07"));
        assert_eq!(numbers.last(), Some(&"97"));
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));

        assert!(list_tickets(&db, raffle.id, "x").await?.is_empty());
        assert!(list_tickets(&db, 999, "").await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_status_matches_payment_sum_after_each_operation() -> Result<()> {
        let (db, raffle) = setup_with_raffle().await?;
        let a = reserve_ticket(&db, reservation(raffle.id, "01", 4.0)).await?;
        let b = reserve_ticket(&db, reservation(raffle.id, "02", 10.0)).await?;
        record_payment(&db, a.ticket.id, payment_request(2.0)).await?;
        release_ticket(&db, b.ticket.id).await?;

        for ticket in list_tickets(&db, raffle.id, "").await? {
            let paid = total_paid(&db, ticket.id).await?;
            assert_eq!(ticket.status == TicketStatus::Paid, paid >= raffle.ticket_price);
            assert_eq!(
                ticket.status == TicketStatus::Available,
                paid == 0.0 && ticket.user_id.is_none()
            );
        }

        Ok(())
    }
}
