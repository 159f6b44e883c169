use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::FailureReason;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing. Used after a durable write has committed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events. Payment events are emitted only by the call that won the state write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        total_minor: i64,
        currency: String,
    },
    OrderCancelled(Uuid),
    PaymentVerified {
        order_id: Uuid,
        reference: String,
        amount_minor: i64,
        verified_at: DateTime<Utc>,
    },
    PaymentFailed {
        order_id: Uuid,
        reference: String,
        reason: FailureReason,
    },
}

impl Event {
    pub fn order_id(&self) -> Uuid {
        match self {
            Event::OrderCreated { order_id, .. }
            | Event::PaymentVerified { order_id, .. }
            | Event::PaymentFailed { order_id, .. } => *order_id,
            Event::OrderCancelled(order_id) => *order_id,
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated {
                order_id,
                total_minor,
                currency,
            } => {
                info!(%order_id, total_minor, %currency, "Order created");
            }
            Event::OrderCancelled(order_id) => {
                info!(%order_id, "Order cancelled");
            }
            Event::PaymentVerified {
                order_id,
                reference,
                amount_minor,
                verified_at,
            } => {
                // Fulfilment hooks in here; it runs at most once per order
                info!(%order_id, %reference, amount_minor, %verified_at, "Payment verified, order ready for kitchen");
            }
            Event::PaymentFailed {
                order_id,
                reference,
                reason,
            } => {
                warn!(%order_id, %reference, %reason, "Payment failed");
            }
        }
    }

    warn!("Event processing loop has ended");
}
