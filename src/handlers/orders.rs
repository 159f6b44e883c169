use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::common::{created_response, json_body, parse_id};
use crate::services::order_builder::{CartLine, CustomerDetails, PlacedOrder};
use crate::services::orders::OrderResponse;
use crate::services::reconciliation::ReconciliationOutcome;
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Checkout payload. Client-sent names and prices on lines are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer: CustomerDetails,
    #[serde(alias = "lines")]
    pub items: Vec<CartLine>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Re-prices the cart against the catalog and persists a pending order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<PlacedOrder>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid customer details or cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item missing or unavailable", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = json_body(payload)?;

    let placed = state
        .services
        .order_builder
        .build_order(request.customer, request.items)
        .await?;
    info!(order_id = %placed.order_id, total_minor = placed.total_minor, "Order placed");

    Ok(created_response(ApiResponse::success(placed)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Order snapshot including payment state, for clients polling after checkout",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Malformed order id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order_id = parse_id(&id)?;
    let order = state.services.orders.get_order(order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    description = "Abandons a pending order. Settled orders are returned unchanged with applied=false",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Cancellation processed", body = ApiResponse<ReconciliationOutcome>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ReconciliationOutcome>>, ServiceError> {
    let order_id = parse_id(&id)?;
    let outcome = state.services.payments.cancel_order(order_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_storefront_wire_shape() {
        let raw = serde_json::json!({
            "customer": {"name": "Ada", "phone": "+2348012345678", "address": "12 Marina, Lagos"},
            "items": [{"mealId": "550e8400-e29b-41d4-a716-446655440000", "qty": 2, "price": 1}]
        });
        let request: CreateOrderRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].quantity, 2);
    }
}
