//! Application context shared by request handlers.
//!
//! Public operations (browsing raffles, reserving a ticket) need no credentials. Every admin
//! operation takes the [`AdminRequest`] it arrived with and is refused before touching the
//! store unless the [`AdminVerifier`] accepts it.

use crate::{
    auth::{AdminIdentity, AdminRequest, AdminVerifier},
    core::{
        raffle::{self, RaffleKind},
        report::{self, RaffleSummary, TicketDetails},
        ticket::{self, PaymentReceipt, PaymentRequest, Release, Reservation, ReservationRequest},
        user,
    },
    entities,
    errors::Result,
    notify::{InboundMessage, NotificationDispatcher, reservation_notice},
};
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;
use tracing::info;

/// Store, admin verifier and notification dispatcher, constructed once at startup.
pub struct AppContext {
    db: DatabaseConnection,
    verifier: AdminVerifier,
    notifications: NotificationDispatcher,
    inbound: Option<mpsc::Sender<InboundMessage>>,
}

impl AppContext {
    /// Creates a context with no inbound message channel.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        verifier: AdminVerifier,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            verifier,
            notifications,
            inbound: None,
        }
    }

    /// Attaches the channel feeding the notification target listener.
    #[must_use]
    pub fn with_inbound(mut self, inbound: mpsc::Sender<InboundMessage>) -> Self {
        self.inbound = Some(inbound);
        self
    }

    /// The underlying database connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Sender for inbound chat messages, if a bot is configured.
    ///
    /// The crate does not receive chat messages itself. Whatever polls the bot or serves
    /// its webhook hands each message to this sender; until some chat sends `/start`
    /// through it, reservation notices are dropped with a log line.
    #[must_use]
    pub fn inbound(&self) -> Option<mpsc::Sender<InboundMessage>> {
        self.inbound.clone()
    }

    /// Checks an admin request, returning who made it.
    pub fn verify_admin(&self, request: &AdminRequest) -> Result<AdminIdentity> {
        Ok(self.verifier.verify(request)?)
    }

    // Public operations

    /// Lists active raffles, newest first.
    pub async fn list_active_raffles(&self) -> Result<Vec<entities::raffle::Model>> {
        raffle::list_active_raffles(&self.db).await
    }

    /// Finds one raffle.
    pub async fn get_raffle(&self, raffle_id: i64) -> Result<Option<entities::raffle::Model>> {
        raffle::get_raffle(&self.db, raffle_id).await
    }

    /// Finds a ticket by its display number within a raffle.
    pub async fn find_ticket(
        &self,
        raffle_id: i64,
        number: &str,
    ) -> Result<Option<entities::ticket::Model>> {
        ticket::find_ticket_by_number(&self.db, raffle_id, number).await
    }

    /// Lists a raffle's tickets, optionally filtered by number.
    pub async fn list_tickets(
        &self,
        raffle_id: i64,
        query: &str,
    ) -> Result<Vec<entities::ticket::Model>> {
        ticket::list_tickets(&self.db, raffle_id, query).await
    }

    /// Reserves a ticket and, once committed, notifies the admin chat.
    ///
    /// Nothing is sent when the reservation fails. Notification problems never affect
    /// the result.
    pub async fn reserve_ticket(&self, request: ReservationRequest) -> Result<Reservation> {
        let reservation = ticket::reserve_ticket(&self.db, request).await?;
        self.notifications.dispatch(reservation_notice(&reservation));
        Ok(reservation)
    }

    // Admin operations

    /// Creates a raffle. `kind` is the raffle type flag, `terminal` or `triple`.
    pub async fn create_raffle(
        &self,
        admin: &AdminRequest,
        name: &str,
        price: f64,
        kind: &str,
    ) -> Result<entities::raffle::Model> {
        let identity = self.verify_admin(admin)?;
        let kind: RaffleKind = kind.parse()?;
        let raffle = raffle::create_raffle(&self.db, name, price, kind).await?;
        info!(admin = %identity.label(), raffle_id = raffle.id, "Raffle created by admin");
        Ok(raffle)
    }

    /// Marks a raffle as finished.
    pub async fn finish_raffle(
        &self,
        admin: &AdminRequest,
        raffle_id: i64,
    ) -> Result<entities::raffle::Model> {
        let identity = self.verify_admin(admin)?;
        let raffle = raffle::finish_raffle(&self.db, raffle_id).await?;
        info!(admin = %identity.label(), raffle_id, "Raffle finished by admin");
        Ok(raffle)
    }

    /// Records a payment against a ticket.
    pub async fn record_payment(
        &self,
        admin: &AdminRequest,
        ticket_id: i64,
        request: PaymentRequest,
    ) -> Result<PaymentReceipt> {
        let identity = self.verify_admin(admin)?;
        let receipt = ticket::record_payment(&self.db, ticket_id, request).await?;
        info!(
            admin = %identity.label(),
            ticket_id,
            settled = receipt.settled,
            "Payment recorded by admin"
        );
        Ok(receipt)
    }

    /// Releases a ticket back to the available pool.
    pub async fn release_ticket(&self, admin: &AdminRequest, ticket_id: i64) -> Result<Release> {
        let identity = self.verify_admin(admin)?;
        let release = ticket::release_ticket(&self.db, ticket_id).await?;
        info!(admin = %identity.label(), ticket_id, "Ticket released by admin");
        Ok(release)
    }

    /// Dashboard summary of a raffle.
    pub async fn raffle_summary(
        &self,
        admin: &AdminRequest,
        raffle_id: i64,
    ) -> Result<RaffleSummary> {
        self.verify_admin(admin)?;
        report::raffle_summary(&self.db, raffle_id).await
    }

    /// Full detail of one ticket.
    pub async fn ticket_details(
        &self,
        admin: &AdminRequest,
        ticket_id: i64,
    ) -> Result<TicketDetails> {
        self.verify_admin(admin)?;
        report::ticket_details(&self.db, ticket_id).await
    }

    /// Customer lookup for the payment form.
    pub async fn search_users(
        &self,
        admin: &AdminRequest,
        query: &str,
    ) -> Result<Vec<entities::user::Model>> {
        self.verify_admin(admin)?;
        user::search_users(&self.db, query).await
    }
}
