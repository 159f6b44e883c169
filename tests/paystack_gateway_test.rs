//! Paystack adapter against a mock HTTP gateway.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{TestApp, TEST_SECRET};
use serde_json::json;
use storefront_api::{
    circuit_breaker::CircuitBreakerConfig,
    entities::PaymentState,
    errors::ServiceError,
    services::{
        order_builder::{CartLine, CustomerDetails},
        payment_gateway::{
            GatewayOutcome, NotificationAuthenticator, PaymentGateway, PaystackConfig,
            PaystackGateway,
        },
        payments::PaymentService,
        reconciliation::PaymentReconciler,
    },
};
use uuid::Uuid;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn gateway_for(server: &MockServer, timeout: Duration, failure_threshold: u32) -> PaystackGateway {
    PaystackGateway::new(PaystackConfig {
        base_url: server.uri(),
        secret_key: TEST_SECRET.to_string(),
        timeout,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold,
            timeout: Duration::from_secs(60),
            success_threshold: 1,
        },
    })
    .expect("gateway client")
}

fn verify_body(reference: &str, amount: i64, status: &str, order_id: Option<Uuid>) -> serde_json::Value {
    json!({
        "status": true,
        "message": "Verification successful",
        "data": {
            "id": 4099260516_i64,
            "status": status,
            "reference": reference,
            "amount": amount,
            "currency": "NGN",
            "metadata": order_id.map(|id| json!({ "order_id": id.to_string() })).unwrap_or(json!("")),
        }
    })
}

#[tokio::test]
async fn successful_verification_is_normalised() {
    let server = MockServer::start().await;
    let order_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/transaction/verify/T685312322670591"))
        .and(header("authorization", format!("Bearer {}", TEST_SECRET).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(verify_body(
            "T685312322670591",
            850_000,
            "success",
            Some(order_id),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Duration::from_secs(5), 5);
    let result = gateway.verify("T685312322670591").await.unwrap();

    assert_eq!(result.outcome, GatewayOutcome::Success);
    assert_eq!(result.amount_minor, 850_000);
    assert_eq!(result.currency, "NGN");
    assert_eq!(result.order_id, Some(order_id));
    assert_eq!(result.gateway_status, "success");
}

#[tokio::test]
async fn abandoned_transaction_is_declined() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/T1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(verify_body("T1", 850_000, "abandoned", None)),
        )
        .mount(&server)
        .await;

    let result = gateway_for(&server, Duration::from_secs(5), 5)
        .verify("T1")
        .await
        .unwrap();
    assert_eq!(result.outcome, GatewayOutcome::Declined);
    assert_eq!(result.order_id, None);
}

#[tokio::test]
async fn charge_still_in_flight_is_retryable() {
    let server = MockServer::start().await;
    for status in ["ongoing", "pending", "processing", "queued"] {
        let reference = format!("T_{status}");
        Mock::given(method("GET"))
            .and(path(format!("/transaction/verify/{reference}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(verify_body(
                &reference,
                850_000,
                status,
                Some(Uuid::new_v4()),
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let gateway = gateway_for(&server, Duration::from_secs(5), 1);
    for status in ["ongoing", "pending", "processing", "queued"] {
        let err = gateway.verify(&format!("T_{status}")).await.unwrap_err();
        assert_matches!(err, ServiceError::GatewayUnavailable(ref msg) if msg.contains(status));
        assert!(err.is_retryable());
    }
}

#[tokio::test]
async fn unknown_reference_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": false,
            "message": "Transaction reference not found"
        })))
        .mount(&server)
        .await;

    let err = gateway_for(&server, Duration::from_secs(5), 5)
        .verify("missing")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn server_error_is_retryable_unavailability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = gateway_for(&server, Duration::from_secs(5), 5)
        .verify("T2")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::GatewayUnavailable(_));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = gateway_for(&server, Duration::from_secs(5), 5)
        .verify("T3")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ExternalServiceError(_));
}

#[tokio::test]
async fn breaker_opens_after_repeated_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Duration::from_secs(5), 2);
    for _ in 0..2 {
        assert_matches!(
            gateway.verify("T4").await,
            Err(ServiceError::GatewayUnavailable(_))
        );
    }
    // Third call is refused locally; the mock's expect(2) verifies no request was sent
    assert_matches!(
        gateway.verify("T4").await,
        Err(ServiceError::GatewayUnavailable(_))
    );
}

#[tokio::test]
async fn timeout_leaves_order_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verify_body("T5", 850_000, "success", None))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    let jollof = app.meal("Smoky Jollof Rice").id;
    let placed = app
        .state
        .services
        .order_builder
        .build_order(
            CustomerDetails {
                name: "Chioma".to_string(),
                phone: "+2348098765432".to_string(),
                address: "7 Awolowo Road, Ikoyi".to_string(),
                notes: None,
            },
            vec![CartLine::new(jollof, 2)],
        )
        .await
        .unwrap();

    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(gateway_for(&server, Duration::from_millis(200), 5));
    let payments = PaymentService::new(
        gateway,
        NotificationAuthenticator::new(TEST_SECRET),
        PaymentReconciler::new(app.orders.clone(), app.state.event_sender.clone()),
    );

    let err = payments
        .confirm_payment(placed.order_id, "T5")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::GatewayUnavailable(_));

    let stored = app
        .state
        .services
        .orders
        .get_order(placed.order_id)
        .await
        .unwrap();
    assert_eq!(stored.payment_state, PaymentState::Pending);
    assert_eq!(app.orders.state_writes(), 0);
}
