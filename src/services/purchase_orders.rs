use crate::{
    db::DbPool,
    entities::{purchase_order, vendor, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{self, EmailDispatcher},
    services::performance::PerformanceService,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    #[validate(length(min = 1, max = 100, message = "PO number is required"))]
    pub po_number: String,
    pub vendor_id: Uuid,
    pub order_date: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub items: serde_json::Value,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Defaults to `pending` when omitted.
    pub status: Option<OrderStatus>,
    #[validate(range(min = 0.0, max = 5.0, message = "Quality rating must be within 0-5"))]
    pub quality_rating: Option<f64>,
    pub issue_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePurchaseOrderRequest {
    #[validate(length(min = 1, max = 100, message = "PO number must not be empty"))]
    pub po_number: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub items: Option<serde_json::Value>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub status: Option<OrderStatus>,
    #[validate(range(min = 0.0, max = 5.0, message = "Quality rating must be within 0-5"))]
    pub quality_rating: Option<f64>,
    pub issue_date: Option<DateTime<Utc>>,
}

/// Service for the purchase-order lifecycle. Every successful write runs the
/// vendor-metrics refresh as a post-write hook; order creation additionally
/// queues a confirmation email for the vendor.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    performance: Arc<PerformanceService>,
    email: EmailDispatcher,
    logger: Logger,
}

impl PurchaseOrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        performance: Arc<PerformanceService>,
        email: EmailDispatcher,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            performance,
            email,
            logger,
        }
    }

    #[instrument(skip(self, request), fields(po_number = %request.po_number, vendor_id = %request.vendor_id))]
    pub async fn create_purchase_order(
        &self,
        request: CreatePurchaseOrderRequest,
    ) -> Result<purchase_order::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;

        let vendor = vendor::Entity::find_by_id(request.vendor_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Vendor {} not found", request.vendor_id))
            })?;

        let duplicate = purchase_order::Entity::find()
            .filter(purchase_order::Column::PoNumber.eq(request.po_number.clone()))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "PO number '{}' already exists",
                request.po_number
            )));
        }

        let status = request.status.unwrap_or_default();
        let now = Utc::now();
        let model = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            po_number: Set(request.po_number),
            vendor_id: Set(request.vendor_id),
            order_date: Set(request.order_date),
            delivery_date: Set(request.delivery_date),
            delivered_date: Set(request.delivered_date),
            items: Set(request.items),
            quantity: Set(request.quantity),
            status: Set(status.to_string()),
            quality_rating: Set(request.quality_rating),
            issue_date: Set(request.issue_date),
            acknowledgment_date: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let created = model.insert(db).await?;

        self.performance
            .refresh_for_order(created.vendor_id, status)
            .await?;

        // Fire-and-forget: queue problems must not fail the request.
        let job = notifications::order_confirmation(&vendor, &created);
        if let Err(e) = self.email.dispatch(job).await {
            slog::warn!(self.logger, "failed to queue order confirmation email";
                "po_number" => &created.po_number,
                "error" => e.to_string(),
            );
        }

        slog::info!(self.logger, "purchase order created";
            "po_id" => created.id.to_string(),
            "po_number" => &created.po_number,
            "vendor_id" => created.vendor_id.to_string(),
        );

        if let Err(e) = self
            .event_sender
            .send(Event::PurchaseOrderCreated(created.id))
            .await
        {
            warn!(po_id = %created.id, error = %e, "failed to emit order created event");
        }

        Ok(created)
    }

    #[instrument(skip(self), fields(po_id = %po_id))]
    pub async fn get_purchase_order(
        &self,
        po_id: Uuid,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        let order = purchase_order::Entity::find_by_id(po_id)
            .one(&*self.db_pool)
            .await?;
        Ok(order)
    }

    /// Lists orders, newest first, optionally restricted to a vendor.
    #[instrument(skip(self))]
    pub async fn list_purchase_orders(
        &self,
        vendor_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let mut query = purchase_order::Entity::find();
        if let Some(vendor_id) = vendor_id {
            query = query.filter(purchase_order::Column::VendorId.eq(vendor_id));
        }

        let paginator = query
            .order_by_desc(purchase_order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((orders, total))
    }

    /// Partial update of mutable fields; triggers a metrics refresh with the
    /// resulting status.
    #[instrument(skip(self, request), fields(po_id = %po_id))]
    pub async fn update_purchase_order(
        &self,
        po_id: Uuid,
        request: UpdatePurchaseOrderRequest,
    ) -> Result<purchase_order::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let existing = purchase_order::Entity::find_by_id(po_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", po_id))
            })?;

        if let Some(po_number) = &request.po_number {
            if *po_number != existing.po_number {
                let taken = purchase_order::Entity::find()
                    .filter(purchase_order::Column::PoNumber.eq(po_number.clone()))
                    .one(db)
                    .await?;
                if taken.is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "PO number '{}' already exists",
                        po_number
                    )));
                }
            }
        }

        let mut active: purchase_order::ActiveModel = existing.into();
        if let Some(po_number) = request.po_number {
            active.po_number = Set(po_number);
        }
        if let Some(order_date) = request.order_date {
            active.order_date = Set(order_date);
        }
        if let Some(delivery_date) = request.delivery_date {
            active.delivery_date = Set(delivery_date);
        }
        if let Some(delivered_date) = request.delivered_date {
            active.delivered_date = Set(Some(delivered_date));
        }
        if let Some(items) = request.items {
            active.items = Set(items);
        }
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(status) = request.status {
            active.status = Set(status.to_string());
        }
        if let Some(quality_rating) = request.quality_rating {
            active.quality_rating = Set(Some(quality_rating));
        }
        if let Some(issue_date) = request.issue_date {
            active.issue_date = Set(issue_date);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;

        self.performance
            .refresh_for_order(updated.vendor_id, updated.order_status())
            .await?;

        slog::info!(self.logger, "purchase order updated";
            "po_id" => updated.id.to_string(),
            "status" => &updated.status,
        );

        if let Err(e) = self
            .event_sender
            .send(Event::PurchaseOrderUpdated(updated.id))
            .await
        {
            warn!(po_id = %updated.id, error = %e, "failed to emit order updated event");
        }

        Ok(updated)
    }

    /// One-way acknowledgment stamp. The first call records `now()`; later
    /// calls succeed without touching the stamp.
    #[instrument(skip(self), fields(po_id = %po_id))]
    pub async fn acknowledge_purchase_order(
        &self,
        po_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = &*self.db_pool;
        let existing = purchase_order::Entity::find_by_id(po_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", po_id))
            })?;

        if existing.acknowledgment_date.is_some() {
            slog::debug!(self.logger, "purchase order already acknowledged";
                "po_id" => existing.id.to_string());
            return Ok(existing);
        }

        let status = existing.order_status();
        let vendor_id = existing.vendor_id;

        let mut active: purchase_order::ActiveModel = existing.into();
        active.acknowledgment_date = Set(Some(Utc::now()));
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;

        self.performance.refresh_for_order(vendor_id, status).await?;

        slog::info!(self.logger, "purchase order acknowledged";
            "po_id" => updated.id.to_string());

        if let Err(e) = self
            .event_sender
            .send(Event::PurchaseOrderAcknowledged(updated.id))
            .await
        {
            warn!(po_id = %updated.id, error = %e, "failed to emit acknowledgment event");
        }

        Ok(updated)
    }

    #[instrument(skip(self), fields(po_id = %po_id))]
    pub async fn delete_purchase_order(&self, po_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = purchase_order::Entity::find_by_id(po_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", po_id))
            })?;

        existing.delete(db).await?;

        slog::info!(self.logger, "purchase order deleted"; "po_id" => po_id.to_string());

        if let Err(e) = self
            .event_sender
            .send(Event::PurchaseOrderDeleted(po_id))
            .await
        {
            warn!(po_id = %po_id, error = %e, "failed to emit order deleted event");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreatePurchaseOrderRequest {
        CreatePurchaseOrderRequest {
            po_number: "PO-100".into(),
            vendor_id: Uuid::new_v4(),
            order_date: Utc::now(),
            delivery_date: Utc::now(),
            delivered_date: None,
            items: serde_json::json!([{"item_name": "bolts", "quantity": 200}]),
            quantity: 200,
            status: None,
            quality_rating: None,
            issue_date: Utc::now(),
        }
    }

    #[test]
    fn create_request_rejects_empty_po_number() {
        let mut request = create_request();
        request.po_number = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_rejects_out_of_range_rating() {
        let mut request = create_request();
        request.quality_rating = Some(7.5);
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_rejects_zero_quantity() {
        let mut request = create_request();
        request.quantity = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn missing_status_defaults_to_pending() {
        let request = create_request();
        assert_eq!(request.status.unwrap_or_default(), OrderStatus::Pending);
    }
}
