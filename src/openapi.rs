use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

/// OpenAPI document for the HTTP surface. Served as raw JSON under
/// `/api-docs/openapi.json` for external UI tooling.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "VendorHub API",
        description = "Vendor management: vendor profiles, purchase orders, performance metrics and delivery reminders"
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::auth::TokenPair,
        crate::auth::LoginCredentials,
        crate::auth::RegisterRequest,
        crate::auth::RefreshTokenRequest,
        crate::entities::OrderStatus,
        crate::services::performance::VendorMetrics,
        crate::services::vendors::CreateVendorRequest,
        crate::services::vendors::UpdateVendorRequest,
        crate::services::purchase_orders::CreatePurchaseOrderRequest,
        crate::services::purchase_orders::UpdatePurchaseOrderRequest,
    )),
    tags(
        (name = "vendors", description = "Vendor directory"),
        (name = "purchase_orders", description = "Purchase order lifecycle"),
        (name = "auth", description = "Token issuance")
    )
)]
pub struct ApiDoc;

pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds_and_lists_schemas() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components present");
        assert!(components.schemas.contains_key("VendorMetrics"));
        assert!(components.schemas.contains_key("TokenPair"));
    }
}
