pub mod common;
pub mod meals;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::repositories::{
    catalog_repository::CatalogRepository, order_repository::OrderRepository, CatalogStore,
    OrderStore,
};
use crate::services::{
    catalog::CatalogService,
    order_builder::{OrderBuilder, PricingPolicy},
    orders::OrderService,
    payment_gateway::{NotificationAuthenticator, PaymentGateway},
    payments::PaymentService,
    reconciliation::PaymentReconciler,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub order_builder: Arc<OrderBuilder>,
    pub payments: Arc<PaymentService>,
    pub orders: Arc<OrderService>,
    pub catalog: Arc<CatalogService>,
}

impl AppServices {
    /// Wires the database-backed stores into every service.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let catalog: Arc<dyn CatalogStore> = Arc::new(CatalogRepository::new(db_pool.clone()));
        let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db_pool));
        Self::with_stores(catalog, orders, event_sender, gateway, config)
    }

    /// Same as [`AppServices::new`] with caller-supplied stores.
    pub fn with_stores(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let pricing = PricingPolicy {
            delivery_fee_minor: config.delivery_fee_minor,
            currency: config.currency.to_ascii_uppercase(),
        };
        let authenticator =
            NotificationAuthenticator::new(config.payment_gateway_secret.clone().unwrap_or_default());
        let reconciler = PaymentReconciler::new(orders.clone(), event_sender.clone());

        Self {
            order_builder: Arc::new(OrderBuilder::new(
                catalog.clone(),
                orders.clone(),
                event_sender,
                pricing,
            )),
            payments: Arc::new(PaymentService::new(gateway, authenticator, reconciler)),
            orders: Arc::new(OrderService::new(orders)),
            catalog: Arc::new(CatalogService::new(catalog)),
        }
    }
}
