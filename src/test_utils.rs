//! Shared test utilities for the raffle ledger.
//!
//! This module provides helpers for setting up test databases, building requests with
//! sensible defaults, signing admin credentials and capturing notifications.

use crate::{
    auth::init_data::compute_hash,
    core::{
        raffle::{RaffleKind, create_raffle},
        ticket::{PaymentRequest, ReservationRequest},
    },
    entities,
    errors::{Error, Result},
    notify::Notifier,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sea_orm::DatabaseConnection;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Bot token used to sign `initData` fixtures.
pub const TEST_BOT_TOKEN: &str = "123456:test-bot-token";

/// Routes tracing output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Sets up a database with one active terminal raffle.
///
/// # Defaults
/// * name: `"Test Raffle"`
/// * price: 10.0
/// * 100 tickets `00`..`99`
pub async fn setup_with_raffle() -> Result<(DatabaseConnection, entities::raffle::Model)> {
    let db = setup_test_db().await?;
    let raffle = create_raffle(&db, "Test Raffle", 10.0, RaffleKind::Terminal).await?;
    Ok((db, raffle))
}

/// Builds a reservation for customer `"Test Customer"` paying `amount` in cash.
pub fn reservation(raffle_id: i64, number: &str, amount: f64) -> ReservationRequest {
    ReservationRequest {
        raffle_id,
        number: number.to_string(),
        name: "Test Customer".to_string(),
        phone: "555-0000".to_string(),
        amount,
        method: "cash".to_string(),
        reference: "test-ref".to_string(),
    }
}

/// Builds an admin payment of `amount` with no customer details.
pub fn payment_request(amount: f64) -> PaymentRequest {
    PaymentRequest {
        amount,
        method: "transfer".to_string(),
        reference: "admin-ref".to_string(),
        ..Default::default()
    }
}

/// `Authorization` header value for HTTP Basic credentials.
pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Builds `initData` the way the Telegram client would, signed with `bot_token`.
///
/// The principal's username is the lowercase first name followed by `_admin`.
pub fn signed_init_data(bot_token: &str, user_id: i64, first_name: &str) -> String {
    let user = serde_json::json!({
        "id": user_id,
        "first_name": first_name,
        "username": format!("{}_admin", first_name.to_lowercase()),
    })
    .to_string();

    let fields: BTreeMap<String, String> = [
        ("auth_date", "1700000000".to_string()),
        ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc".to_string()),
        ("user", user),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();

    let hash = compute_hash(bot_token, &crate::auth::init_data::data_check_string(&fields));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &fields {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

/// Notifier that records every delivery on a channel instead of sending it.
pub struct RecordingNotifier {
    sent: Option<mpsc::UnboundedSender<(i64, String)>>,
}

impl RecordingNotifier {
    /// Returns the notifier and the receiving end of its deliveries.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<(i64, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { sent: Some(tx) }), rx)
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self { sent: None })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<()> {
        let Some(sent) = &self.sent else {
            return Err(Error::Notification {
                message: "delivery failed".to_string(),
            });
        };
        let _ = sent.send((chat_id, text.to_string()));
        Ok(())
    }
}
