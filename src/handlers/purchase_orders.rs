use super::common::{
    created_response, default_page, default_per_page, map_service_error, no_content_response,
    success_response, validate_input, PaginatedResponse,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::purchase_orders::{CreatePurchaseOrderRequest, UpdatePurchaseOrderRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

/// Query parameters for the purchase order listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PurchaseOrderListQuery {
    /// Restrict the listing to one vendor
    pub vendor_id: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

/// Create a purchase order; queues a confirmation email to the vendor
async fn create_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .purchase_orders
        .create_purchase_order(payload)
        .await
        .map_err(map_service_error)?;

    info!(
        "Purchase order created: {} by user {}",
        order.id, user.user_id
    );

    Ok(created_response(order))
}

/// List purchase orders, optionally filtered by vendor
async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(query): Query<PurchaseOrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .purchase_orders
        .list_purchase_orders(query.vendor_id, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        query.page,
        query.per_page,
        total,
    )))
}

/// Get a purchase order by ID
async fn get_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .get_purchase_order(po_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Purchase order with ID {} not found", po_id))
        })?;

    Ok(success_response(order))
}

/// Update a purchase order
async fn update_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(po_id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .purchase_orders
        .update_purchase_order(po_id, payload)
        .await
        .map_err(map_service_error)?;

    info!(
        "Purchase order updated: {} by user {}",
        po_id, user.user_id
    );

    Ok(success_response(order))
}

/// Delete a purchase order
async fn delete_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .purchase_orders
        .delete_purchase_order(po_id)
        .await
        .map_err(map_service_error)?;

    info!(
        "Purchase order deleted: {} by user {}",
        po_id, user.user_id
    );

    Ok(no_content_response())
}

/// Stamp the acknowledgment date. Idempotent: repeated calls succeed and keep
/// the original stamp.
async fn acknowledge_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .acknowledge_purchase_order(po_id)
        .await
        .map_err(map_service_error)?;

    info!(
        "Purchase order acknowledged: {} by user {}",
        po_id, user.user_id
    );

    Ok(success_response(serde_json::json!({
        "message": "Purchase order acknowledged successfully",
        "acknowledgment_date": order.acknowledgment_date,
    })))
}

/// Creates the router for purchase order endpoints
pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/", get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id", put(update_purchase_order))
        .route("/:id", delete(delete_purchase_order))
        .route("/:id/acknowledge", post(acknowledge_purchase_order))
}
