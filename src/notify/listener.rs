use super::{NotificationTarget, Notifier};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A chat message received by the bot, as handed over by whatever polls the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat the message came from
    pub chat_id: i64,
    /// Raw message text
    pub text: String,
}

fn is_start_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .is_some_and(|command| command == "/start" || command.starts_with("/start@"))
}

/// Records the chat of every `/start` message as the notification target and confirms it.
///
/// Runs until every sender of `inbound` is dropped. Other messages are ignored.
pub async fn run_target_listener(
    mut inbound: mpsc::Receiver<InboundMessage>,
    target: NotificationTarget,
    notifier: Arc<dyn Notifier>,
) {
    while let Some(message) = inbound.recv().await {
        if !is_start_command(&message.text) {
            debug!(chat_id = message.chat_id, "Ignoring non-command message");
            continue;
        }

        target.set(message.chat_id).await;
        info!(chat_id = message.chat_id, "Admin chat registered for notifications");

        let reply = format!(
            "Hello admin! Chat {} is registered and will receive notifications here.",
            message.chat_id
        );
        if let Err(e) = notifier.notify(message.chat_id, &reply).await {
            warn!(chat_id = message.chat_id, "Failed to confirm registration: {}", e);
        }
    }
    info!("Inbound message channel closed, target listener stopped");
}
