use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{meal, order, order_line, FailureReason, PaymentState};
use crate::errors::ServiceError;

pub mod catalog_repository;
pub mod order_repository;

pub use catalog_repository::CatalogRepository;
pub use order_repository::OrderRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Read-only source of truth for item identity, price and availability.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Batch lookup. Unknown or unavailable ids are simply absent from the result.
    async fn find_available_items(&self, ids: &[Uuid]) -> Result<Vec<meal::Model>, ServiceError>;

    /// Every available item, ordered by category then name.
    async fn list_available(&self) -> Result<Vec<meal::Model>, ServiceError>;
}

/// Line snapshot handed to [`OrderStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub meal_id: Uuid,
    pub name: String,
    pub unit_price_minor: i64,
    pub quantity: i32,
    pub line_total_minor: i64,
}

/// A fully priced order ready to be persisted in `Pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub subtotal_minor: i64,
    pub delivery_minor: i64,
    pub total_minor: i64,
    pub currency: String,
    pub lines: Vec<NewOrderLine>,
}

/// Target of a conditional state write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub to: PaymentState,
    /// Claims `payment_reference` on `Verified`; any other target records it as
    /// `attempted_reference`. An existing reference is never cleared.
    pub reference: Option<String>,
    pub failure_reason: Option<FailureReason>,
}

impl StateTransition {
    pub fn verified(reference: impl Into<String>) -> Self {
        Self {
            to: PaymentState::Verified,
            reference: Some(reference.into()),
            failure_reason: None,
        }
    }

    pub fn failed(reference: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            to: PaymentState::Failed,
            reference: Some(reference.into()),
            failure_reason: Some(reason),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            to: PaymentState::Cancelled,
            reference: None,
            failure_reason: Some(FailureReason::CustomerCancelled),
        }
    }
}

/// Durable order storage. State changes go only through [`OrderStore::compare_and_set_state`].
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order and its lines atomically.
    async fn create(&self, order: NewOrder) -> Result<order::Model, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError>;

    /// Lines in submission order.
    async fn find_lines(&self, order_id: Uuid) -> Result<Vec<order_line::Model>, ServiceError>;

    /// The order that settled `reference`, i.e. the verified one.
    async fn find_by_reference(&self, reference: &str)
        -> Result<Option<order::Model>, ServiceError>;

    /// Applies `transition` only if the stored state still equals `expected`.
    /// Returns `true` when this call performed the write.
    async fn compare_and_set_state(
        &self,
        id: Uuid,
        expected: PaymentState,
        transition: StateTransition,
    ) -> Result<bool, ServiceError>;
}
