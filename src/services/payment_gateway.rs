/*!
 * Payment gateway adapter.
 *
 * Two inbound channels are normalised into one [`GatewayResult`]:
 *
 * - active verification, a server-to-server `GET /transaction/verify/{reference}`
 * - push notifications, authenticated with `hex(HMAC-SHA512(secret, raw_body))`
 *   carried in the `x-paystack-signature` header
 *
 * Nothing here mutates order state.
 */

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::errors::ServiceError;
use crate::metrics;

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.=\-]{1,100}$").expect("valid reference pattern"));

/// Validates the shape of a gateway transaction reference.
pub fn validate_reference(reference: &str) -> Result<(), ServiceError> {
    if REFERENCE_PATTERN.is_match(reference) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(
            "Payment reference must be 1-100 characters of letters, digits, '_', '.', '=' or '-'"
                .to_string(),
        ))
    }
}

/// What the gateway has decided about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOutcome {
    Success,
    /// Final non-success: `failed`, `abandoned` or `reversed`
    Declined,
    /// No decision yet (`ongoing`, `pending`, `processing`, `queued`, or anything unrecognised)
    InFlight,
}

impl GatewayOutcome {
    /// Classifies a Paystack transaction status.
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failed" | "abandoned" | "reversed" => Self::Declined,
            _ => Self::InFlight,
        }
    }

    pub fn is_final(self) -> bool {
        !matches!(self, Self::InFlight)
    }
}

/// Gateway outcome for a single transaction, regardless of channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResult {
    pub reference: String,
    pub outcome: GatewayOutcome,
    /// Amount the gateway actually settled, in minor units
    pub amount_minor: i64,
    pub currency: String,
    /// Order the transaction was initialised for, if the gateway echoed it back
    pub order_id: Option<Uuid>,
    /// Raw gateway status string, e.g. `success`, `failed`, `abandoned`
    pub gateway_status: String,
}

/// An authenticated push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayNotification {
    Payment {
        order_id: Uuid,
        result: GatewayResult,
    },
    /// Authentic, but not an event that settles an order
    Ignored { event: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Asks the gateway for the authoritative outcome of `reference`.
    ///
    /// Transport failures map to `GatewayUnavailable` and must leave order state untouched.
    async fn verify(&self, reference: &str) -> Result<GatewayResult, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    event: String,
    data: TransactionData,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(default)]
    status: Option<String>,
    reference: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: Value,
}

impl TransactionData {
    /// Reads `metadata.order_id` (or `orderId`). Paystack may send metadata as a JSON string.
    fn order_id(&self) -> Result<Option<Uuid>, ServiceError> {
        let metadata = match &self.metadata {
            Value::String(s) if !s.trim().is_empty() => {
                serde_json::from_str::<Value>(s).unwrap_or(Value::Null)
            }
            other => other.clone(),
        };
        let raw = metadata
            .get("order_id")
            .or_else(|| metadata.get("orderId"))
            .and_then(Value::as_str);
        match raw {
            Some(raw) => Uuid::parse_str(raw).map(Some).map_err(|_| {
                ServiceError::ValidationError(format!("Invalid order id in metadata: {}", raw))
            }),
            None => Ok(None),
        }
    }

    fn into_result(self, order_id: Option<Uuid>) -> GatewayResult {
        let gateway_status = self.status.unwrap_or_default();
        GatewayResult {
            outcome: GatewayOutcome::from_status(&gateway_status),
            reference: self.reference,
            amount_minor: self.amount,
            currency: self.currency,
            order_id,
            gateway_status,
        }
    }
}

/// Gateway client settings
#[derive(Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl PaystackConfig {
    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Self {
        Self {
            base_url: cfg.payment_gateway_base_url.trim_end_matches('/').to_string(),
            secret_key: cfg.payment_gateway_secret.clone().unwrap_or_default(),
            timeout: cfg.payment_gateway_timeout(),
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: cfg.circuit_breaker_failure_threshold,
                timeout: Duration::from_secs(cfg.circuit_breaker_timeout_secs),
                success_threshold: 1,
            },
        }
    }
}

/// Paystack REST adapter
pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    breaker: CircuitBreaker,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key,
            breaker: CircuitBreaker::with_config(config.circuit_breaker),
        })
    }

    fn record_transport_failure(&self) {
        self.breaker.record_failure();
        metrics::GATEWAY_CIRCUIT_STATE.set(self.breaker.state().as_gauge());
    }

    fn record_transport_success(&self) {
        self.breaker.record_success();
        metrics::GATEWAY_CIRCUIT_STATE.set(self.breaker.state().as_gauge());
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    #[instrument(skip(self))]
    async fn verify(&self, reference: &str) -> Result<GatewayResult, ServiceError> {
        validate_reference(reference)?;

        if !self.breaker.allow_request() {
            warn!("Gateway circuit open, refusing verify call");
            return Err(ServiceError::GatewayUnavailable(
                "Payment gateway circuit is open".to_string(),
            ));
        }

        let started = Instant::now();
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let response = match self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.record_transport_failure();
                metrics::record_gateway_call("transport_error", started);
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                warn!(error = %e, "Gateway verify call {}", kind);
                return Err(ServiceError::GatewayUnavailable(format!(
                    "Payment gateway request {}",
                    kind
                )));
            }
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            self.record_transport_failure();
            metrics::record_gateway_call("unavailable", started);
            return Err(ServiceError::GatewayUnavailable(format!(
                "Payment gateway responded with {}",
                status
            )));
        }
        self.record_transport_success();

        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            metrics::record_gateway_call("not_found", started);
            return Err(ServiceError::NotFound(format!(
                "Transaction not found: {}",
                reference
            )));
        }
        if !status.is_success() {
            metrics::record_gateway_call("rejected", started);
            return Err(ServiceError::ExternalServiceError(format!(
                "Payment gateway responded with {}",
                status
            )));
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            metrics::record_gateway_call("malformed", started);
            ServiceError::ExternalServiceError(format!("Malformed gateway response: {}", e))
        })?;
        metrics::record_gateway_call("ok", started);

        let data = match (envelope.status, envelope.data) {
            (true, Some(data)) => data,
            (_, _) => {
                return Err(ServiceError::NotFound(format!(
                    "Transaction not found: {} ({})",
                    reference,
                    envelope.message.unwrap_or_default()
                )))
            }
        };

        if data.reference != reference {
            return Err(ServiceError::ExternalServiceError(
                "Gateway returned a different transaction reference".to_string(),
            ));
        }

        let order_id = data.order_id()?;
        let result = data.into_result(order_id);
        debug!(
            outcome = ?result.outcome,
            status = %result.gateway_status,
            amount_minor = result.amount_minor,
            "Gateway verify completed"
        );
        if !result.outcome.is_final() {
            return Err(ServiceError::GatewayUnavailable(format!(
                "Transaction {} is still {}; retry later",
                reference, result.gateway_status
            )));
        }
        Ok(result)
    }
}

/// Authenticates and parses gateway push notifications
#[derive(Clone)]
pub struct NotificationAuthenticator {
    secret: String,
}

impl std::fmt::Debug for NotificationAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationAuthenticator").finish_non_exhaustive()
    }
}

impl NotificationAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex HMAC-SHA512 of `raw` under the configured secret.
    pub fn sign(&self, raw: &[u8]) -> Result<String, ServiceError> {
        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("HMAC key: {}", e)))?;
        mac.update(raw);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of `signature` against the body. Runs before any parsing.
    pub fn verify_signature(&self, raw: &[u8], signature: Option<&str>) -> Result<(), ServiceError> {
        if self.secret.is_empty() {
            return Err(ServiceError::AuthenticityError(
                "Notification secret is not configured".to_string(),
            ));
        }
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::AuthenticityError("Missing signature".to_string()))?;
        let provided = hex::decode(signature)
            .map_err(|_| ServiceError::AuthenticityError("Malformed signature".to_string()))?;

        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("HMAC key: {}", e)))?;
        mac.update(raw);
        mac.verify_slice(&provided)
            .map_err(|_| ServiceError::AuthenticityError("Signature mismatch".to_string()))
    }

    pub fn parse_notification(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<GatewayNotification, ServiceError> {
        self.verify_signature(raw, signature)?;

        let event: Value = serde_json::from_slice(raw)
            .map_err(|e| ServiceError::ValidationError(format!("Invalid notification body: {}", e)))?;
        let name = event
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let outcome = match name.as_str() {
            "charge.success" => GatewayOutcome::Success,
            "charge.failed" => GatewayOutcome::Declined,
            _ => return Ok(GatewayNotification::Ignored { event: name }),
        };

        let envelope: NotificationEnvelope = serde_json::from_value(event).map_err(|e| {
            ServiceError::ValidationError(format!("Invalid notification payload: {}", e))
        })?;
        validate_reference(&envelope.data.reference)?;

        let order_id = envelope.data.order_id()?.ok_or_else(|| {
            ServiceError::ValidationError("Notification carries no order id".to_string())
        })?;

        let mut result = envelope.data.into_result(Some(order_id));
        // The event name is authoritative for the outcome
        result.outcome = outcome;
        debug!(event = %envelope.event, %order_id, "Authenticated gateway notification");

        Ok(GatewayNotification::Payment { order_id, result })
    }
}
