//! Outbound admin notifications.
//!
//! Delivery is best-effort: a [`NotificationDispatcher`] spawns each message on its own task
//! after the triggering transaction has committed, and failures are only logged.
//! The chat that receives notifications is the [`NotificationTarget`], set by the
//! [`listener`] whenever an operator sends `/start`.

/// Inbound `/start` handling
pub mod listener;
/// Telegram Bot API client
pub mod telegram;

pub use listener::{InboundMessage, run_target_listener};
pub use telegram::TelegramNotifier;

use crate::{core::ticket::Reservation, errors::Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info, warn};

/// Something that can deliver a text message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` to `chat_id`.
    async fn notify(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Shared chat id that receives admin notifications. Last writer wins.
#[derive(Debug, Clone, Default)]
pub struct NotificationTarget {
    chat_id: Arc<RwLock<Option<i64>>>,
}

impl NotificationTarget {
    /// Creates an empty target; nothing is delivered until a chat registers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current target.
    pub async fn set(&self, chat_id: i64) {
        *self.chat_id.write().await = Some(chat_id);
    }

    /// The current target, if any chat has registered.
    pub async fn get(&self) -> Option<i64> {
        *self.chat_id.read().await
    }
}

/// Fire-and-forget delivery of admin notifications.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    target: NotificationTarget,
}

impl NotificationDispatcher {
    /// Dispatcher delivering through `notifier` to whatever chat `target` holds.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, target: NotificationTarget) -> Self {
        Self {
            notifier: Some(notifier),
            target,
        }
    }

    /// Dispatcher for when no bot is configured; every message is dropped.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The target this dispatcher delivers to.
    #[must_use]
    pub const fn target(&self) -> &NotificationTarget {
        &self.target
    }

    /// Spawns delivery of `text` and returns immediately.
    ///
    /// Returns `None` when no bot is configured. The returned handle never carries an error;
    /// callers may drop it.
    pub fn dispatch(&self, text: String) -> Option<JoinHandle<()>> {
        let Some(notifier) = self.notifier.as_ref().map(Arc::clone) else {
            debug!("Notifications disabled, dropping message");
            return None;
        };
        let target = self.target.clone();

        Some(tokio::spawn(async move {
            let Some(chat_id) = target.get().await else {
                info!("No admin chat registered yet, notification dropped");
                return;
            };
            match notifier.notify(chat_id, &text).await {
                Ok(()) => debug!(chat_id, "Notification delivered"),
                Err(e) => warn!(chat_id, "Failed to deliver notification: {}", e),
            }
        }))
    }
}

/// Message sent to the admin chat when a customer reserves a ticket.
#[must_use]
pub fn reservation_notice(reservation: &Reservation) -> String {
    format!(
        "New reservation: #{}\nCustomer: {}\nPhone: {}\nAmount: ${}\nRef: {}\n\nRaffle ID: {}",
        reservation.ticket.number,
        reservation.user.name,
        reservation.user.phone,
        reservation.payment.amount,
        reservation.payment.reference,
        reservation.ticket.raffle_id,
    )
}
