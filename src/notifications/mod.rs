/*!
 * Notification dispatch: composes vendor emails and publishes them onto the
 * message queue for an external delivery worker. Nothing here blocks a
 * request on actual delivery.
 */

use crate::{
    db::DbPool,
    entities::{purchase_order, vendor, OrderStatus},
    errors::ServiceError,
    message_queue::{Message, MessageQueue, MessageQueueError},
};
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::error;

/// Queue topic consumed by the external email worker.
pub const EMAIL_TOPIC: &str = "email.outbound";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Queue error: {0}")]
    Queue(#[from] MessageQueueError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The job shape the delivery worker consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailJob {
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Publishes email jobs to the queue. Callers treat dispatch as
/// fire-and-forget and only log failures.
#[derive(Clone)]
pub struct EmailDispatcher {
    queue: Arc<dyn MessageQueue>,
    logger: Logger,
}

impl EmailDispatcher {
    pub fn new(queue: Arc<dyn MessageQueue>, logger: Logger) -> Self {
        Self { queue, logger }
    }

    pub async fn dispatch(&self, job: EmailJob) -> Result<(), NotificationError> {
        let payload = serde_json::to_value(&job)?;
        self.queue
            .publish(Message::new(EMAIL_TOPIC.to_string(), payload))
            .await?;

        slog::info!(self.logger, "email job queued";
            "recipient" => &job.email,
            "subject" => &job.subject,
        );
        Ok(())
    }
}

/// Confirmation email sent when an order is created.
pub fn order_confirmation(vendor: &vendor::Model, order: &purchase_order::Model) -> EmailJob {
    EmailJob {
        email: vendor.contact_details.clone(),
        subject: format!("Purchase order {} received", order.po_number),
        message: format!(
            "Hello {},\n\nA new purchase order {} has been placed with you.\n\
             Quantity: {}\nExpected delivery: {}\n\nThank you.",
            vendor.name,
            order.po_number,
            order.quantity,
            order.delivery_date.format("%Y-%m-%d"),
        ),
    }
}

/// Reminder for a pending order approaching its delivery deadline.
pub fn delivery_reminder(vendor: &vendor::Model, order: &purchase_order::Model) -> EmailJob {
    EmailJob {
        email: vendor.contact_details.clone(),
        subject: format!("Delivery reminder for purchase order {}", order.po_number),
        message: format!(
            "Hello {},\n\nPurchase order {} is due for delivery on {}.\n\
             Please make sure the shipment is on track.\n\nThank you.",
            vendor.name,
            order.po_number,
            order.delivery_date.format("%Y-%m-%d"),
        ),
    }
}

/// Spawn the periodic reminder sweep. Every `interval`, all pending orders
/// whose delivery deadline falls within the next `window_days` get a reminder
/// queued. There is no record of already-sent reminders, so each sweep
/// re-sends for every currently-qualifying order.
pub fn start_reminder_worker(
    db: Arc<DbPool>,
    dispatcher: EmailDispatcher,
    interval: Duration,
    window_days: i64,
) {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            match sweep_once(&db, &dispatcher, window_days).await {
                Ok(count) if count > 0 => {
                    tracing::info!(reminders = count, "delivery reminder sweep dispatched");
                }
                Ok(_) => {}
                Err(e) => {
                    error!("delivery reminder sweep failed: {}", e);
                }
            }
        }
    });
}

/// One reminder sweep: find qualifying orders and queue a reminder for each.
/// Returns the number of reminders dispatched.
pub async fn sweep_once(
    db: &DbPool,
    dispatcher: &EmailDispatcher,
    window_days: i64,
) -> Result<usize, ServiceError> {
    let now = Utc::now();
    let horizon = now + ChronoDuration::days(window_days);

    let due = purchase_order::Entity::find()
        .filter(purchase_order::Column::Status.eq(OrderStatus::Pending.to_string()))
        .filter(purchase_order::Column::DeliveryDate.gte(now))
        .filter(purchase_order::Column::DeliveryDate.lte(horizon))
        .find_also_related(vendor::Entity)
        .all(db)
        .await?;

    let mut dispatched = 0;
    for (order, vendor) in due {
        let Some(vendor) = vendor else {
            continue;
        };
        match dispatcher.dispatch(delivery_reminder(&vendor, &order)).await {
            Ok(()) => dispatched += 1,
            Err(e) => {
                error!(po_number = %order.po_number, "failed to queue reminder: {}", e);
            }
        }
    }

    Ok(dispatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::discard_logger;
    use crate::message_queue::InMemoryMessageQueue;
    use uuid::Uuid;

    fn vendor() -> vendor::Model {
        vendor::Model {
            id: Uuid::new_v4(),
            vendor_code: "ACME-01".into(),
            name: "Acme Industrial".into(),
            contact_details: "orders@acme.example".into(),
            address: "1 Factory Rd".into(),
            on_time_delivery_rate: 0.0,
            quality_rating_avg: 0.0,
            average_response_time: 0.0,
            fulfillment_rate: 0.0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn order(vendor_id: Uuid) -> purchase_order::Model {
        purchase_order::Model {
            id: Uuid::new_v4(),
            po_number: "PO-42".into(),
            vendor_id,
            order_date: Utc::now(),
            delivery_date: Utc::now() + ChronoDuration::days(2),
            delivered_date: None,
            items: serde_json::json!([]),
            quantity: 10,
            status: OrderStatus::Pending.to_string(),
            quality_rating: None,
            issue_date: Utc::now(),
            acknowledgment_date: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn confirmation_email_is_addressed_to_vendor_contact() {
        let v = vendor();
        let job = order_confirmation(&v, &order(v.id));
        assert_eq!(job.email, "orders@acme.example");
        assert!(job.subject.contains("PO-42"));
        assert!(job.message.contains("Acme Industrial"));
    }

    #[test]
    fn reminder_email_names_the_deadline() {
        let v = vendor();
        let o = order(v.id);
        let job = delivery_reminder(&v, &o);
        assert!(job.subject.contains("PO-42"));
        assert!(job
            .message
            .contains(&o.delivery_date.format("%Y-%m-%d").to_string()));
    }

    #[tokio::test]
    async fn dispatch_publishes_one_queue_message() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let dispatcher = EmailDispatcher::new(queue.clone(), discard_logger());
        let v = vendor();
        let job = order_confirmation(&v, &order(v.id));

        dispatcher.dispatch(job.clone()).await.unwrap();

        let message = queue.subscribe(EMAIL_TOPIC).await.unwrap().unwrap();
        let received: EmailJob = serde_json::from_value(message.payload).unwrap();
        assert_eq!(received, job);
        assert!(queue.subscribe(EMAIL_TOPIC).await.unwrap().is_none());
    }
}
