use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Handle for publishing domain events onto the in-process channel
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishes without waiting; a full or closed channel is logged and dropped.
    pub fn send_or_log(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            counter!("atelier_events.dropped", 1);
            warn!(error = %err, "dropping domain event");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CartItemAdded {
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        user_id: Uuid,
        item_id: Uuid,
    },
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        total: Decimal,
        item_count: i32,
    },
    StockAdjusted {
        product_id: Uuid,
        delta: i32,
        stock_quantity: i32,
    },
    StockLow {
        product_id: Uuid,
        sku: String,
        remaining: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CartItemAdded { .. } => "cart_item_added",
            Event::CartItemRemoved { .. } => "cart_item_removed",
            Event::OrderPlaced { .. } => "order_placed",
            Event::StockAdjusted { .. } => "stock_adjusted",
            Event::StockLow { .. } => "stock_low",
        }
    }
}

/// Drains the event channel until every sender is dropped
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("atelier_events.processed", 1, "event" => event.name());

        match &event {
            Event::OrderPlaced {
                order_id,
                user_id,
                total,
                item_count,
            } => {
                info!(%order_id, %user_id, %total, item_count, "order placed");
            }
            Event::StockLow {
                product_id,
                sku,
                remaining,
            } => {
                warn!(%product_id, sku = %sku, remaining, "product stock is running low");
            }
            other => {
                info!(event = other.name(), payload = ?other, "domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_never_blocks_on_full_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        let user_id = Uuid::new_v4();

        sender.send_or_log(Event::CartItemRemoved {
            user_id,
            item_id: Uuid::new_v4(),
        });
        sender.send_or_log(Event::CartItemRemoved {
            user_id,
            item_id: Uuid::new_v4(),
        });

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
