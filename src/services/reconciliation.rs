/*!
 * Payment reconciliation.
 *
 * The only component that moves an order out of `Pending`. Every write is a
 * conditional update against the stored state, so duplicate or concurrent
 * confirmations from either channel collapse into exactly one transition.
 */

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{order, FailureReason, PaymentState};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::repositories::{OrderStore, StateTransition};
use crate::services::payment_gateway::{GatewayOutcome, GatewayResult};

/// State of an order after a reconciliation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationOutcome {
    pub order_id: Uuid,
    pub state: PaymentState,
    pub reference: Option<String>,
    pub failure_reason: Option<FailureReason>,
    /// Whether this call performed the state transition
    pub applied: bool,
}

impl ReconciliationOutcome {
    fn from_order(order: &order::Model, applied: bool) -> Self {
        Self {
            order_id: order.id,
            state: order.payment_state,
            reference: order
                .payment_reference
                .clone()
                .or_else(|| order.attempted_reference.clone()),
            failure_reason: order.failure_reason,
            applied,
        }
    }
}

#[derive(Clone)]
pub struct PaymentReconciler {
    orders: Arc<dyn OrderStore>,
    event_sender: Arc<EventSender>,
}

impl PaymentReconciler {
    pub fn new(orders: Arc<dyn OrderStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            orders,
            event_sender,
        }
    }

    async fn load(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order not found: {}", order_id)))
    }

    /// Current outcome if the order is already terminal, `None` while it is `Pending`.
    pub async fn settled_outcome(
        &self,
        order_id: Uuid,
    ) -> Result<Option<ReconciliationOutcome>, ServiceError> {
        let order = self.load(order_id).await?;
        if order.payment_state.is_terminal() {
            metrics::RECONCILIATIONS_NOOP.inc();
            Ok(Some(ReconciliationOutcome::from_order(&order, false)))
        } else {
            Ok(None)
        }
    }

    /// Applies a gateway outcome to `order_id`. Idempotent: settled orders are returned as-is.
    #[instrument(skip(self, result), fields(reference = %result.reference, outcome = ?result.outcome))]
    pub async fn reconcile(
        &self,
        order_id: Uuid,
        result: &GatewayResult,
    ) -> Result<ReconciliationOutcome, ServiceError> {
        let order = self.load(order_id).await?;

        if order.payment_state.is_terminal() {
            metrics::RECONCILIATIONS_NOOP.inc();
            info!(state = %order.payment_state, "Order already settled, nothing to do");
            return Ok(ReconciliationOutcome::from_order(&order, false));
        }

        if !result.outcome.is_final() {
            // the gateway has not decided; a later confirmation must still be able to settle
            info!(status = %result.gateway_status, "Transaction still in flight, leaving order pending");
            return Err(ServiceError::GatewayUnavailable(format!(
                "Payment {} is still {}; retry later",
                result.reference, result.gateway_status
            )));
        }

        if let Some(bound) = result.order_id {
            if bound != order_id {
                warn!(%bound, "Gateway transaction belongs to a different order");
                return Err(ServiceError::Conflict(format!(
                    "Payment {} was initialised for another order",
                    result.reference
                )));
            }
        }

        if let Some(owner) = self.orders.find_by_reference(&result.reference).await? {
            if owner.id != order_id && owner.payment_state == PaymentState::Verified {
                warn!(owner = %owner.id, "Payment reference already settled another order");
                return Err(ServiceError::Conflict(format!(
                    "Payment {} is already attached to another order",
                    result.reference
                )));
            }
        }

        let amount_matches = result.amount_minor == order.total_minor
            && result.currency.eq_ignore_ascii_case(&order.currency);

        let transition = if !amount_matches {
            warn!(
                expected_minor = order.total_minor,
                paid_minor = result.amount_minor,
                expected_currency = %order.currency,
                paid_currency = %result.currency,
                "Gateway amount does not match order total"
            );
            StateTransition::failed(&result.reference, FailureReason::AmountMismatch)
        } else if result.outcome == GatewayOutcome::Success {
            StateTransition::verified(&result.reference)
        } else {
            StateTransition::failed(&result.reference, FailureReason::GatewayDeclined)
        };

        self.apply(order, transition).await
    }

    /// Customer abandonment. Only a `Pending` order can be cancelled; settled orders are returned unchanged.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: Uuid) -> Result<ReconciliationOutcome, ServiceError> {
        let order = self.load(order_id).await?;
        if order.payment_state.is_terminal() {
            return Ok(ReconciliationOutcome::from_order(&order, false));
        }
        self.apply(order, StateTransition::cancelled()).await
    }

    async fn apply(
        &self,
        order: order::Model,
        transition: StateTransition,
    ) -> Result<ReconciliationOutcome, ServiceError> {
        let applied = self
            .orders
            .compare_and_set_state(order.id, PaymentState::Pending, transition.clone())
            .await?;

        if !applied {
            // Lost the race; whatever won is now the answer
            metrics::RECONCILIATIONS_NOOP.inc();
            let current = self.load(order.id).await?;
            info!(state = %current.payment_state, "Concurrent settlement won, returning stored state");
            return Ok(ReconciliationOutcome::from_order(&current, false));
        }

        let reference = transition
            .reference
            .clone()
            .or_else(|| order.payment_reference.clone())
            .or_else(|| order.attempted_reference.clone());
        self.emit(&order, &transition, reference.as_deref()).await;

        Ok(ReconciliationOutcome {
            order_id: order.id,
            state: transition.to,
            reference,
            failure_reason: transition.failure_reason,
            applied: true,
        })
    }

    async fn emit(&self, order: &order::Model, transition: &StateTransition, reference: Option<&str>) {
        let reference = reference.unwrap_or_default().to_string();
        let event = match (transition.to, transition.failure_reason) {
            (PaymentState::Verified, _) => {
                metrics::PAYMENTS_VERIFIED.inc();
                info!(order_id = %order.id, "Payment verified");
                Event::PaymentVerified {
                    order_id: order.id,
                    reference,
                    amount_minor: order.total_minor,
                    verified_at: Utc::now(),
                }
            }
            (PaymentState::Cancelled, _) => {
                metrics::ORDERS_CANCELLED.inc();
                info!(order_id = %order.id, "Order cancelled");
                Event::OrderCancelled(order.id)
            }
            (_, reason) => {
                let reason = reason.unwrap_or(FailureReason::GatewayDeclined);
                metrics::PAYMENTS_FAILED
                    .with_label_values(&[reason.as_str()])
                    .inc();
                warn!(order_id = %order.id, %reason, "Payment failed");
                Event::PaymentFailed {
                    order_id: order.id,
                    reference,
                    reason,
                }
            }
        };
        self.event_sender.send_or_log(event).await;
    }
}
