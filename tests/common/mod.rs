#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::{meal, order, order_line, PaymentState},
    errors::ServiceError,
    events::{Event, EventSender},
    handlers::AppServices,
    repositories::{
        CatalogRepository, NewOrder, OrderRepository, OrderStore, StateTransition,
    },
    seed,
    services::payment_gateway::{
        GatewayOutcome, GatewayResult, NotificationAuthenticator, PaymentGateway,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "sk_test_storefront_secret";

/// Gateway double returning a configurable result and counting calls.
#[derive(Default)]
pub struct StubGateway {
    response: Mutex<Option<GatewayResult>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn respond_with(&self, result: GatewayResult) {
        *self.response.lock().unwrap() = Some(result);
        self.unavailable.store(false, Ordering::SeqCst);
    }

    pub fn go_down(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn verify(&self, reference: &str) -> Result<GatewayResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayUnavailable("stub offline".to_string()));
        }
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ServiceError::NotFound(format!("Transaction {}", reference)))
    }
}

/// Order store decorator counting successful state writes.
pub struct CountingOrderStore {
    inner: OrderRepository,
    state_writes: AtomicUsize,
}

impl CountingOrderStore {
    pub fn state_writes(&self) -> usize {
        self.state_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for CountingOrderStore {
    async fn create(&self, order: NewOrder) -> Result<order::Model, ServiceError> {
        self.inner.create(order).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        self.inner.find_by_id(id).await
    }

    async fn find_lines(&self, order_id: Uuid) -> Result<Vec<order_line::Model>, ServiceError> {
        self.inner.find_lines(order_id).await
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        self.inner.find_by_reference(reference).await
    }

    async fn compare_and_set_state(
        &self,
        id: Uuid,
        expected: PaymentState,
        transition: StateTransition,
    ) -> Result<bool, ServiceError> {
        let applied = self
            .inner
            .compare_and_set_state(id, expected, transition)
            .await?;
        if applied {
            self.state_writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(applied)
    }
}

/// Application wired against an in-memory SQLite database with the demo menu.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub meals: Vec<meal::Model>,
    pub gateway: Arc<StubGateway>,
    pub orders: Arc<CountingOrderStore>,
    events: tokio::sync::Mutex<mpsc::Receiver<Event>>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.payment_gateway_secret = Some(TEST_SECRET.to_string());
        cfg.cors_allowed_origins = Some("http://localhost:5173".to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let meals = seed::seed_meals(&pool).await.expect("seed meals");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));

        let gateway = Arc::new(StubGateway::default());
        let orders = Arc::new(CountingOrderStore {
            inner: OrderRepository::new(db_arc.clone()),
            state_writes: AtomicUsize::new(0),
        });

        let services = AppServices::with_stores(
            Arc::new(CatalogRepository::new(db_arc.clone())),
            orders.clone(),
            event_sender.clone(),
            gateway.clone(),
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };
        let router = storefront_api::build_router(state.clone());

        Self {
            router,
            state,
            meals,
            gateway,
            orders,
            events: tokio::sync::Mutex::new(event_rx),
        }
    }

    pub fn meal(&self, name: &str) -> &meal::Model {
        self.meals
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("no seeded meal named {name}"))
    }

    pub fn authenticator(&self) -> NotificationAuthenticator {
        NotificationAuthenticator::new(TEST_SECRET)
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(self.state.db.as_ref())
            .await
            .expect("count orders")
    }

    /// Events emitted so far and not yet taken.
    pub async fn take_events(&self) -> Vec<Event> {
        let mut rx = self.events.lock().await;
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.request(builder.body(body).expect("build request")).await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Gateway result for `reference` settling `amount_minor` NGN.
pub fn gateway_result(reference: &str, amount_minor: i64, verified: bool) -> GatewayResult {
    GatewayResult {
        reference: reference.to_string(),
        outcome: if verified {
            GatewayOutcome::Success
        } else {
            GatewayOutcome::Declined
        },
        amount_minor,
        currency: "NGN".to_string(),
        order_id: None,
        gateway_status: if verified { "success" } else { "failed" }.to_string(),
    }
}

/// Result for a charge the gateway has not decided yet, e.g. `ongoing`.
pub fn in_flight_result(reference: &str, amount_minor: i64, status: &str) -> GatewayResult {
    GatewayResult {
        outcome: GatewayOutcome::InFlight,
        gateway_status: status.to_string(),
        ..gateway_result(reference, amount_minor, false)
    }
}
