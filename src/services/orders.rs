use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::minor_to_major;
use crate::entities::{order, order_line, FailureReason, PaymentState};
use crate::errors::ServiceError;
use crate::repositories::OrderStore;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineResponse {
    pub item_id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "3500.00")]
    pub unit_price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String, example = "7000.00")]
    pub line_total: Decimal,
}

impl From<order_line::Model> for OrderLineResponse {
    fn from(line: order_line::Model) -> Self {
        Self {
            item_id: line.meal_id,
            name: line.name,
            unit_price: minor_to_major(line.unit_price_minor),
            quantity: line.quantity,
            line_total: minor_to_major(line.line_total_minor),
        }
    }
}

/// Snapshot returned to a client polling for payment confirmation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_name: String,
    pub lines: Vec<OrderLineResponse>,
    #[schema(value_type = String, example = "7000.00")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "1500.00")]
    pub delivery: Decimal,
    #[schema(value_type = String, example = "8500.00")]
    pub total: Decimal,
    pub total_minor: i64,
    pub currency: String,
    pub payment_state: PaymentState,
    pub payment_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_reference: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    fn from_parts(order: order::Model, lines: Vec<order_line::Model>) -> Self {
        Self {
            id: order.id,
            customer_name: order.customer_name,
            lines: lines.into_iter().map(Into::into).collect(),
            subtotal: minor_to_major(order.subtotal_minor),
            delivery: minor_to_major(order.delivery_minor),
            total: minor_to_major(order.total_minor),
            total_minor: order.total_minor,
            currency: order.currency,
            payment_state: order.payment_state,
            payment_reference: order.payment_reference,
            attempted_reference: order.attempted_reference,
            failure_reason: order.failure_reason,
            paid_at: order.paid_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Read side for orders
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order not found: {}", order_id)))?;
        let lines = self.orders.find_lines(order_id).await?;
        debug!(lines = lines.len(), state = %order.payment_state, "Order retrieved");
        Ok(OrderResponse::from_parts(order, lines))
    }
}
