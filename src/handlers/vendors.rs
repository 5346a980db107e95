use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::vendors::{CreateVendorRequest, UpdateVendorRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Create a new vendor
async fn create_vendor(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateVendorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let vendor = state
        .services
        .vendors
        .create_vendor(payload)
        .await
        .map_err(map_service_error)?;

    info!("Vendor created: {} by user {}", vendor.id, user.user_id);

    Ok(created_response(vendor))
}

/// List vendors with pagination
async fn list_vendors(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (vendors, total) = state
        .services
        .vendors
        .list_vendors(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        vendors,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Get a vendor by ID
async fn get_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let vendor = state
        .services
        .vendors
        .get_vendor(vendor_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Vendor with ID {} not found", vendor_id)))?;

    Ok(success_response(vendor))
}

/// Update a vendor
async fn update_vendor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(vendor_id): Path<Uuid>,
    Json(payload): Json<UpdateVendorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let vendor = state
        .services
        .vendors
        .update_vendor(vendor_id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Vendor updated: {} by user {}", vendor_id, user.user_id);

    Ok(success_response(vendor))
}

/// Delete a vendor (cascades to its orders and snapshots)
async fn delete_vendor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(vendor_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .vendors
        .delete_vendor(vendor_id)
        .await
        .map_err(map_service_error)?;

    info!("Vendor deleted: {} by user {}", vendor_id, user.user_id);

    Ok(no_content_response())
}

/// Current performance metrics for a vendor. Reading also appends a history
/// snapshot when the service is configured that way.
async fn vendor_performance(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics = state
        .services
        .performance
        .vendor_performance(vendor_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Vendor with ID {} not found", vendor_id)))?;

    Ok(success_response(metrics))
}

/// Snapshot history for a vendor, newest first
async fn performance_history(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state
        .services
        .performance
        .history(vendor_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Vendor with ID {} not found", vendor_id)))?;

    Ok(success_response(history))
}

/// Creates the router for vendor endpoints
pub fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_vendor))
        .route("/", get(list_vendors))
        .route("/:id", get(get_vendor))
        .route("/:id", put(update_vendor))
        .route("/:id", delete(delete_vendor))
        .route("/:id/performance", get(vendor_performance))
        .route("/:id/performance/history", get(performance_history))
}
