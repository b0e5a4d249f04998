//! Message dispatcher: outbound delivery, immediate and delayed.
//!
//! Delivery failures are logged and reported, never propagated: a turn that
//! already persisted its state must not fail because a send did.

pub mod twilio;

pub use twilio::TwilioSender;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ChannelError;

/// WhatsApp body limit per message.
pub const WHATSAPP_MAX_MESSAGE_LENGTH: usize = 1600;

/// Tracked recipients above which fired sends are swept on scheduling.
const SWEEP_THRESHOLD: usize = 1024;

/// An outbound message transport.
#[async_trait]
pub trait MessageSender: Send + Sync {
    fn name(&self) -> &str;

    /// Send one message body to a bare identity. Returns the provider's
    /// message id when it reports one.
    async fn send_message(&self, to: &str, body: &str) -> Result<Option<String>, ChannelError>;
}

/// Dry-run sender used when no messaging provider is configured.
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<Option<String>, ChannelError> {
        info!(to, body, "Outbound message (dry run)");
        Ok(None)
    }
}

/// Outcome of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed(String),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

pub struct Dispatcher {
    sender: Arc<dyn MessageSender>,
    /// Delayed sends not yet fired, per recipient.
    pending: Arc<Mutex<HashMap<String, Vec<JoinHandle<()>>>>>,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            sender,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Send `text` now, split into provider-sized chunks.
    pub async fn send(&self, to: &str, text: &str) -> Delivery {
        deliver(self.sender.as_ref(), to, text).await
    }

    /// Schedule `text` for delivery after `delay`. Returns immediately.
    pub async fn send_after(&self, to: &str, text: &str, delay: Duration) {
        let sender = Arc::clone(&self.sender);
        let recipient = to.to_string();
        let body = text.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            deliver(sender.as_ref(), &recipient, &body).await;
        });

        let mut pending = self.pending.lock().await;
        if pending.len() >= SWEEP_THRESHOLD {
            pending.retain(|_, handles| {
                handles.retain(|h| !h.is_finished());
                !handles.is_empty()
            });
        }
        let handles = pending.entry(to.to_string()).or_default();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        debug!(to, delay_ms = delay.as_millis() as u64, "Scheduled delayed message");
    }

    /// Abort delayed sends for `to` that have not fired yet.
    pub async fn cancel_pending(&self, to: &str) -> usize {
        let handles = self.pending.lock().await.remove(to).unwrap_or_default();
        let mut cancelled = 0;
        for handle in handles {
            if !handle.is_finished() {
                handle.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            debug!(to, cancelled, "Cancelled pending messages");
        }
        cancelled
    }

    /// Recipients currently tracked for delayed sends.
    pub async fn tracked_recipients(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Delayed sends for `to` that have not completed.
    pub async fn pending_count(&self, to: &str) -> usize {
        let mut pending = self.pending.lock().await;
        match pending.get_mut(to) {
            Some(handles) => {
                handles.retain(|h| !h.is_finished());
                let count = handles.len();
                if count == 0 {
                    pending.remove(to);
                }
                count
            }
            None => 0,
        }
    }
}

async fn deliver(sender: &dyn MessageSender, to: &str, text: &str) -> Delivery {
    for chunk in split_message(text, WHATSAPP_MAX_MESSAGE_LENGTH) {
        if let Err(e) = sender.send_message(to, &chunk).await {
            warn!(channel = sender.name(), to, error = %e, "Message delivery failed");
            return Delivery::Failed(e.to_string());
        }
    }
    Delivery::Delivered
}

/// Split a message into chunks of at most `max_len` bytes, preferring
/// newline then space boundaries.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
