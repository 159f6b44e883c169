use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront Orders & Payments

Server-side order pricing and payment reconciliation for the food storefront.

## Checkout flow

1. `POST /api/v1/orders` with customer details and `{mealId, qty}` lines. Prices
   come from the menu, never from the request. The response carries the
   trusted `total` to initialise payment with.
2. The customer pays through the gateway.
3. Either `POST /api/v1/payments/paystack/verify` or the gateway's signed
   notification at `POST /api/v1/webhooks/paystack` settles the order.
4. Poll `GET /api/v1/orders/{id}` until `payment_state` leaves `pending`.

## Payment states

`pending` moves exactly once to `verified`, `failed` or `cancelled`. Repeated
confirmations return the stored state with `applied: false`.

## Errors

```json
{
  "error": "not_found",
  "message": "Not found: Order not found: 550e8400-e29b-41d4-a716-446655440000",
  "retryable": false,
  "request_id": "3f0c9a8e-2b7d-4c55-9d0e-0a4f1e6b7c21",
  "timestamp": "2026-03-02T09:15:00Z"
}
```

A `503` (`retryable: true`) from the verify endpoint means the gateway could not be reached and
the order was not touched; retry later.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order placement and status"),
        (name = "payments", description = "Payment confirmation channels"),
        (name = "meals", description = "Menu catalog")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payment_webhooks::paystack_webhook,
        crate::handlers::meals::list_meals,
    ),
    components(
        schemas(
            crate::handlers::orders::CreateOrderRequest,
            crate::handlers::payments::VerifyPaymentRequest,
            crate::services::order_builder::CustomerDetails,
            crate::services::order_builder::CartLine,
            crate::services::order_builder::PlacedOrder,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderLineResponse,
            crate::services::reconciliation::ReconciliationOutcome,
            crate::services::catalog::MealResponse,
            crate::entities::PaymentState,
            crate::entities::FailureReason,
            crate::ResponseMeta,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
