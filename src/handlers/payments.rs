use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::json_body;
use crate::services::reconciliation::ReconciliationOutcome;
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Client request to confirm a payment it initialised for an order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VerifyPaymentRequest {
    #[schema(example = "T685312322670591")]
    pub reference: String,
    #[serde(alias = "orderId")]
    pub order_id: Uuid,
}

// POST /api/v1/payments/paystack/verify
#[utoipa::path(
    post,
    path = "/api/v1/payments/paystack/verify",
    summary = "Confirm payment",
    description = "Verifies a transaction with the gateway and reconciles it against the order total",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment reconciled; inspect state for verified or failed", body = ApiResponse<ReconciliationOutcome>),
        (status = 400, description = "Malformed reference or order id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or transaction not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Reference belongs to another order", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway returned an unusable response", body = crate::errors::ErrorResponse),
        (status = 503, description = "Gateway unavailable; order unchanged, retry later", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ReconciliationOutcome>>, ServiceError> {
    let request = json_body(payload)?;
    let outcome = state
        .services
        .payments
        .confirm_payment(request.order_id, request.reference.trim())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
