use crate::{
    db::DbPool,
    entities::vendor,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
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
use validator::{Validate, ValidationError};

static VENDOR_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("vendor code pattern"));

fn validate_vendor_code(code: &str) -> Result<(), ValidationError> {
    if VENDOR_CODE_RE.is_match(code) {
        Ok(())
    } else {
        Err(ValidationError::new("vendor_code_format"))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateVendorRequest {
    #[validate(length(min = 1, max = 100, message = "Vendor name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Contact details are required"))]
    pub contact_details: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(
        length(min = 1, max = 50, message = "Vendor code is required"),
        custom = "validate_vendor_code"
    )]
    pub vendor_code: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateVendorRequest {
    #[validate(length(min = 1, max = 100, message = "Vendor name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Contact details must not be empty"))]
    pub contact_details: Option<String>,
    #[validate(length(min = 1, message = "Address must not be empty"))]
    pub address: Option<String>,
    #[validate(
        length(min = 1, max = 50, message = "Vendor code must not be empty"),
        custom = "validate_vendor_code"
    )]
    pub vendor_code: Option<String>,
}

/// Service for managing vendor records.
#[derive(Clone)]
pub struct VendorService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl VendorService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
        }
    }

    /// Creates a vendor with zeroed metrics.
    #[instrument(skip(self, request), fields(vendor_code = %request.vendor_code))]
    pub async fn create_vendor(
        &self,
        request: CreateVendorRequest,
    ) -> Result<vendor::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let duplicate = vendor::Entity::find()
            .filter(vendor::Column::VendorCode.eq(request.vendor_code.clone()))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Vendor code '{}' already exists",
                request.vendor_code
            )));
        }

        let now = Utc::now();
        let model = vendor::ActiveModel {
            id: Set(Uuid::new_v4()),
            vendor_code: Set(request.vendor_code),
            name: Set(request.name),
            contact_details: Set(request.contact_details),
            address: Set(request.address),
            on_time_delivery_rate: Set(0.0),
            quality_rating_avg: Set(0.0),
            average_response_time: Set(0.0),
            fulfillment_rate: Set(0.0),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let created = model.insert(db).await?;

        slog::info!(self.logger, "vendor created";
            "vendor_id" => created.id.to_string(),
            "vendor_code" => &created.vendor_code,
        );

        if let Err(e) = self.event_sender.send(Event::VendorCreated(created.id)).await {
            warn!(vendor_id = %created.id, error = %e, "failed to emit vendor created event");
        }

        Ok(created)
    }

    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn get_vendor(&self, vendor_id: Uuid) -> Result<Option<vendor::Model>, ServiceError> {
        let vendor = vendor::Entity::find_by_id(vendor_id)
            .one(&*self.db_pool)
            .await?;
        Ok(vendor)
    }

    /// Lists vendors, newest first, with the total count for pagination.
    #[instrument(skip(self))]
    pub async fn list_vendors(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<vendor::Model>, u64), ServiceError> {
        let paginator = vendor::Entity::find()
            .order_by_desc(vendor::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let vendors = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((vendors, total))
    }

    /// Partial update; only supplied fields change.
    #[instrument(skip(self, request), fields(vendor_id = %vendor_id))]
    pub async fn update_vendor(
        &self,
        vendor_id: Uuid,
        request: UpdateVendorRequest,
    ) -> Result<vendor::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let existing = vendor::Entity::find_by_id(vendor_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))?;

        if let Some(code) = &request.vendor_code {
            if *code != existing.vendor_code {
                let taken = vendor::Entity::find()
                    .filter(vendor::Column::VendorCode.eq(code.clone()))
                    .one(db)
                    .await?;
                if taken.is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "Vendor code '{}' already exists",
                        code
                    )));
                }
            }
        }

        let mut active: vendor::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(contact_details) = request.contact_details {
            active.contact_details = Set(contact_details);
        }
        if let Some(address) = request.address {
            active.address = Set(address);
        }
        if let Some(vendor_code) = request.vendor_code {
            active.vendor_code = Set(vendor_code);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;

        slog::info!(self.logger, "vendor updated"; "vendor_id" => updated.id.to_string());

        if let Err(e) = self.event_sender.send(Event::VendorUpdated(updated.id)).await {
            warn!(vendor_id = %updated.id, error = %e, "failed to emit vendor updated event");
        }

        Ok(updated)
    }

    /// Deletes a vendor; orders and snapshots go with it (FK cascade).
    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn delete_vendor(&self, vendor_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = vendor::Entity::find_by_id(vendor_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))?;

        existing.delete(db).await?;

        slog::info!(self.logger, "vendor deleted"; "vendor_id" => vendor_id.to_string());

        if let Err(e) = self.event_sender.send(Event::VendorDeleted(vendor_id)).await {
            warn!(vendor_id = %vendor_id, error = %e, "failed to emit vendor deleted event");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_code_format_accepts_common_codes() {
        assert!(validate_vendor_code("12345").is_ok());
        assert!(validate_vendor_code("ACME-01").is_ok());
        assert!(validate_vendor_code("north_supplies").is_ok());
    }

    #[test]
    fn vendor_code_format_rejects_whitespace_and_symbols() {
        assert!(validate_vendor_code("acme 01").is_err());
        assert!(validate_vendor_code("acme#01").is_err());
    }

    #[test]
    fn create_request_requires_all_fields() {
        let request = CreateVendorRequest {
            name: "Test Vendor".into(),
            contact_details: String::new(),
            address: "Somewhere".into(),
            vendor_code: "12345".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn update_request_rejects_empty_name() {
        let request = UpdateVendorRequest {
            name: Some(String::new()),
            contact_details: None,
            address: None,
            vendor_code: None,
        };
        assert!(request.validate().is_err());
    }
}
