use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Domain events emitted after state changes. Consumed in-process; dispatch
/// failures are logged and never surfaced to the originating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    VendorCreated(Uuid),
    VendorUpdated(Uuid),
    VendorDeleted(Uuid),

    PurchaseOrderCreated(Uuid),
    PurchaseOrderUpdated(Uuid),
    PurchaseOrderDeleted(Uuid),
    PurchaseOrderAcknowledged(Uuid),

    VendorMetricsRecorded { vendor_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Event processor loop, spawned at boot. Currently logs each event; this is
/// the seam where webhook fan-out or audit persistence would hang off.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::VendorMetricsRecorded { vendor_id } => {
                debug!(vendor_id = %vendor_id, "vendor metrics snapshot recorded");
            }
            other => {
                debug!(event = ?other, "domain event");
            }
        }
    }
    info!("Event processor stopped");
}
