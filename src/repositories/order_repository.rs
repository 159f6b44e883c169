use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel,
};
use crate::entities::order_line::{
    self, ActiveModel as OrderLineActiveModel, Entity as OrderLine, Model as OrderLineModel,
};
use crate::entities::PaymentState;
use crate::errors::ServiceError;
use crate::repositories::{BaseRepository, NewOrder, OrderStore, Repository, StateTransition};

/// Repository for order operations
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

fn map_write_error(err: DbErr) -> ServiceError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        warn!("Unique constraint violated: {}", detail);
        return ServiceError::Conflict(
            "Payment reference is already attached to another order".to_string(),
        );
    }
    error!("Order write failed: {}", err);
    ServiceError::DatabaseError(err)
}

#[async_trait]
impl OrderStore for OrderRepository {
    #[instrument(skip(self, order), fields(total_minor = order.total_minor, lines = order.lines.len()))]
    async fn create(&self, order: NewOrder) -> Result<OrderModel, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.base.get_db().begin().await?;

        let header = OrderActiveModel {
            id: Set(order_id),
            customer_name: Set(order.customer_name),
            customer_phone: Set(order.customer_phone),
            delivery_address: Set(order.delivery_address),
            notes: Set(order.notes),
            subtotal_minor: Set(order.subtotal_minor),
            delivery_minor: Set(order.delivery_minor),
            total_minor: Set(order.total_minor),
            currency: Set(order.currency),
            payment_state: Set(PaymentState::Pending),
            payment_reference: Set(None),
            attempted_reference: Set(None),
            failure_reason: Set(None),
            paid_at: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let saved = header.insert(&txn).await.map_err(map_write_error)?;

        let lines: Vec<OrderLineActiveModel> = order
            .lines
            .into_iter()
            .enumerate()
            .map(|(position, line)| OrderLineActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                meal_id: Set(line.meal_id),
                name: Set(line.name),
                unit_price_minor: Set(line.unit_price_minor),
                quantity: Set(line.quantity),
                line_total_minor: Set(line.line_total_minor),
                position: Set(position as i32),
            })
            .collect();

        if !lines.is_empty() {
            OrderLine::insert_many(lines)
                .exec(&txn)
                .await
                .map_err(map_write_error)?;
        }

        txn.commit().await?;
        debug!(order_id = %order_id, "Order persisted");
        Ok(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        Order::find_by_id(id)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_lines(&self, order_id: Uuid) -> Result<Vec<OrderLineModel>, ServiceError> {
        OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_line::Column::Position)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<OrderModel>, ServiceError> {
        Order::find()
            .filter(Column::PaymentReference.eq(reference))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self, transition), fields(to = %transition.to))]
    async fn compare_and_set_state(
        &self,
        id: Uuid,
        expected: PaymentState,
        transition: StateTransition,
    ) -> Result<bool, ServiceError> {
        let now = Utc::now();

        let mut update = Order::update_many()
            .col_expr(Column::PaymentState, Expr::value(transition.to.as_str()))
            .col_expr(
                Column::FailureReason,
                Expr::value(transition.failure_reason.map(|r| r.as_str().to_string())),
            )
            .col_expr(Column::Version, Expr::col(Column::Version).add(1))
            .col_expr(Column::UpdatedAt, Expr::value(now));

        match (transition.to, transition.reference) {
            (PaymentState::Verified, Some(reference)) => {
                update = update
                    .col_expr(Column::PaymentReference, Expr::value(reference))
                    .col_expr(Column::PaidAt, Expr::value(Some(now)));
            }
            (PaymentState::Verified, None) => {
                update = update.col_expr(Column::PaidAt, Expr::value(Some(now)));
            }
            (_, Some(reference)) => {
                update = update.col_expr(Column::AttemptedReference, Expr::value(reference));
            }
            (_, None) => {}
        }

        // The state predicate is the only serialisation point between concurrent writers.
        let result = update
            .filter(Column::Id.eq(id))
            .filter(Column::PaymentState.eq(expected))
            .exec(self.base.get_db())
            .await
            .map_err(map_write_error)?;

        let applied = result.rows_affected == 1;
        debug!(order_id = %id, applied, "Conditional state write");
        Ok(applied)
    }
}
