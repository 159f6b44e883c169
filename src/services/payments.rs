use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::metrics;
use crate::services::payment_gateway::{
    validate_reference, GatewayNotification, NotificationAuthenticator, PaymentGateway,
};
use crate::services::reconciliation::{PaymentReconciler, ReconciliationOutcome};

/// Outcome of an inbound gateway notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Reconciled(ReconciliationOutcome),
    /// Authentic event type that does not settle orders
    Ignored { event: String },
}

/// Entry points for both payment confirmation channels
#[derive(Clone)]
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    authenticator: NotificationAuthenticator,
    reconciler: PaymentReconciler,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        authenticator: NotificationAuthenticator,
        reconciler: PaymentReconciler,
    ) -> Self {
        Self {
            gateway,
            authenticator,
            reconciler,
        }
    }

    /// Client-triggered verification. Settled orders short-circuit without calling the gateway.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        order_id: Uuid,
        reference: &str,
    ) -> Result<ReconciliationOutcome, ServiceError> {
        validate_reference(reference)?;

        if let Some(settled) = self.reconciler.settled_outcome(order_id).await? {
            return Ok(settled);
        }

        let result = self.gateway.verify(reference).await?;
        self.reconciler.reconcile(order_id, &result).await
    }

    /// Gateway push notification. The signature is checked before the body is parsed.
    #[instrument(skip(self, raw, signature), fields(bytes = raw.len()))]
    pub async fn handle_gateway_notification(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<NotificationOutcome, ServiceError> {
        let notification = match self.authenticator.parse_notification(raw, signature) {
            Ok(n) => n,
            Err(err) => {
                let outcome = match err {
                    ServiceError::AuthenticityError(_) => "rejected",
                    _ => "invalid",
                };
                metrics::NOTIFICATIONS_RECEIVED
                    .with_label_values(&[outcome])
                    .inc();
                return Err(err);
            }
        };

        match notification {
            GatewayNotification::Ignored { event } => {
                metrics::NOTIFICATIONS_RECEIVED
                    .with_label_values(&["ignored"])
                    .inc();
                info!(%event, "Ignoring gateway notification");
                Ok(NotificationOutcome::Ignored { event })
            }
            GatewayNotification::Payment { order_id, result } => {
                match self.reconciler.reconcile(order_id, &result).await {
                    Ok(outcome) => {
                        metrics::NOTIFICATIONS_RECEIVED
                            .with_label_values(&["accepted"])
                            .inc();
                        Ok(NotificationOutcome::Reconciled(outcome))
                    }
                    Err(err @ ServiceError::NotFound(_)) => {
                        // Authentic but for an order this store never placed; the gateway keeps retrying
                        metrics::NOTIFICATIONS_RECEIVED
                            .with_label_values(&["unknown_order"])
                            .inc();
                        warn!(%order_id, reference = %result.reference, "Notification for unknown order");
                        Err(err)
                    }
                    Err(err) => {
                        metrics::NOTIFICATIONS_RECEIVED
                            .with_label_values(&["accepted"])
                            .inc();
                        Err(err)
                    }
                }
            }
        }
    }

    pub async fn cancel_order(&self, order_id: Uuid) -> Result<ReconciliationOutcome, ServiceError> {
        self.reconciler.cancel(order_id).await
    }
}
