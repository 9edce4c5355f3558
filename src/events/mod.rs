use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Domain events emitted after a business operation commits. Consumers are
/// notification-only; nothing in the core depends on a listener being
/// present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Inbound events
    InboundRecorded {
        receipt_number: String,
        order_id: Option<i64>,
        drug_id: i64,
        batch_number: String,
        quantity: i32,
        acceptance: String,
    },

    // Ledger events
    StockIncreased {
        drug_id: i64,
        batch_number: String,
        quantity: i32,
        new_quantity: i32,
    },
    StockDecreased {
        drug_id: i64,
        batch_number: String,
        quantity: i32,
        new_quantity: i32,
    },
    StockAdjusted {
        adjustment_number: String,
        drug_id: i64,
        batch_number: String,
        quantity_before: i32,
        quantity_after: i32,
    },

    // Outbound application events
    OutboundApplicationCreated {
        application_number: String,
        applicant_id: i64,
    },
    OutboundApplicationApproved {
        application_id: i64,
        approver_id: i64,
        second_approver_id: Option<i64>,
    },
    OutboundApplicationRejected {
        application_id: i64,
        approver_id: i64,
    },
    OutboundApplicationCancelled {
        application_id: i64,
    },
    OutboundExecuted {
        application_id: i64,
    },

    // Purchase order events
    PurchaseOrderCreated {
        order_number: String,
    },
    PurchaseOrderShipped {
        order_id: i64,
    },
    PurchaseOrderReceived {
        order_id: i64,
    },
}

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

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Used after a transaction has already committed: the mutation stands
    /// whether or not anyone hears about it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Spawn this alongside the
/// application; replace with a real consumer at the integration boundary.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = %payload, "domain event"),
            Err(e) => error!("failed to serialize event: {}", e),
        }
    }
}
