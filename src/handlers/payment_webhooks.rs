use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};

use crate::services::payment_gateway::SIGNATURE_HEADER;
use crate::services::payments::NotificationOutcome;
use crate::{errors::ServiceError, AppState};

// POST /api/v1/webhooks/paystack
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/paystack",
    summary = "Gateway notification",
    description = "Signed push notification from the gateway. The raw body is authenticated before parsing",
    request_body(content = String, description = "Raw gateway event JSON", content_type = "application/json"),
    params(("x-paystack-signature" = String, Header, description = "hex HMAC-SHA512 of the raw body")),
    responses(
        (status = 200, description = "Notification accepted"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Reference belongs to another order", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = match state
        .services
        .payments
        .handle_gateway_notification(&body, signature)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            if matches!(err, ServiceError::AuthenticityError(_)) {
                warn!("Gateway notification failed signature verification");
            }
            // Any non-2xx (including 404 for an unknown order) is redelivered by Paystack
            return Err(err);
        }
    };

    let body = match outcome {
        NotificationOutcome::Reconciled(outcome) => {
            info!(
                order_id = %outcome.order_id,
                state = %outcome.state,
                applied = outcome.applied,
                "Gateway notification reconciled"
            );
            json!({
                "received": true,
                "order_id": outcome.order_id,
                "state": outcome.state,
                "applied": outcome.applied,
            })
        }
        NotificationOutcome::Ignored { event } => json!({
            "received": true,
            "ignored": event,
        }),
    };

    Ok((StatusCode::OK, Json(body)))
}
