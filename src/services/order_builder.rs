use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::common::{line_total_minor, minor_to_major};
use crate::entities::PaymentState;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::repositories::{CatalogStore, NewOrder, NewOrderLine, OrderStore};

pub const MAX_LINES_PER_ORDER: usize = 50;
pub const MAX_QUANTITY_PER_LINE: i64 = 100;

/// Contact details captured with an order. Shape is validated, content is not interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CustomerDetails {
    #[validate(length(min = 1, max = 100), custom = "not_blank")]
    #[schema(example = "Ada Obi")]
    pub name: String,
    #[validate(custom = "validate_phone")]
    #[schema(example = "+234 801 234 5678")]
    pub phone: String,
    #[validate(length(min = 1, max = 300), custom = "not_blank")]
    #[schema(example = "12 Marina Road, Lagos Island")]
    pub address: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub notes: Option<String>,
}

/// One requested cart line. Client `name`/`price` are accepted but never read.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CartLine {
    #[serde(alias = "mealId", alias = "meal_id")]
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub item_id: String,
    #[serde(alias = "qty")]
    #[schema(example = 2)]
    pub quantity: i64,
    #[serde(default, skip_serializing)]
    #[schema(value_type = Option<String>)]
    pub name: Option<Value>,
    #[serde(default, skip_serializing)]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Value>,
}

impl CartLine {
    pub fn new(item_id: Uuid, quantity: i64) -> Self {
        Self {
            item_id: item_id.to_string(),
            quantity,
            name: None,
            price: None,
        }
    }
}

/// Result returned to the client so it can initialise payment for the trusted amount
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    #[schema(value_type = String, example = "8500.00")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "1500.00")]
    pub delivery: Decimal,
    #[schema(value_type = String, example = "8500.00")]
    pub total: Decimal,
    pub total_minor: i64,
    pub currency: String,
    pub payment_state: PaymentState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal_minor: i64,
    pub delivery_minor: i64,
    pub total_minor: i64,
}

/// Server-side pricing rules. Never derived from client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    pub delivery_fee_minor: i64,
    pub currency: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            delivery_fee_minor: 150_000,
            currency: "NGN".to_string(),
        }
    }
}

impl PricingPolicy {
    /// Delivery is zero for an empty subtotal, otherwise the flat fee.
    pub fn delivery_for(&self, subtotal_minor: i64) -> i64 {
        if subtotal_minor == 0 {
            0
        } else {
            self.delivery_fee_minor
        }
    }

    pub fn totals<I>(&self, line_totals: I) -> Result<OrderTotals, ServiceError>
    where
        I: IntoIterator<Item = i64>,
    {
        let overflow = || ServiceError::ValidationError("Order amount is too large".to_string());
        let subtotal_minor = line_totals
            .into_iter()
            .try_fold(0_i64, |acc, line| acc.checked_add(line))
            .ok_or_else(overflow)?;
        let delivery_minor = self.delivery_for(subtotal_minor);
        let total_minor = subtotal_minor
            .checked_add(delivery_minor)
            .ok_or_else(overflow)?;
        Ok(OrderTotals {
            subtotal_minor,
            delivery_minor,
            total_minor,
        })
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let trimmed = phone.trim();
    let len = trimmed.chars().count();
    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    if (7..=20).contains(&len) && allowed && digits > 0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message =
            Some("phone must be 7-20 characters of digits, spaces, '+', '-', '(' or ')'".into());
        Err(err)
    }
}

/// Parses ids and quantities, then merges duplicate ids in order of first appearance.
fn normalise_lines(lines: &[CartLine]) -> Result<Vec<(Uuid, i32)>, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError("Cart is empty".to_string()));
    }
    if lines.len() > MAX_LINES_PER_ORDER {
        return Err(ServiceError::ValidationError(format!(
            "Cart has more than {} lines",
            MAX_LINES_PER_ORDER
        )));
    }

    let mut merged: Vec<(Uuid, i64)> = Vec::with_capacity(lines.len());
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(lines.len());

    for line in lines {
        let raw_id = line.item_id.trim();
        let id = Uuid::parse_str(raw_id)
            .map_err(|_| ServiceError::ValidationError(format!("Invalid item id: {}", raw_id)))?;
        if line.quantity < 1 || line.quantity > MAX_QUANTITY_PER_LINE {
            return Err(ServiceError::ValidationError(format!(
                "Invalid quantity for item {}: must be between 1 and {}",
                id, MAX_QUANTITY_PER_LINE
            )));
        }
        match index.get(&id) {
            Some(&i) => merged[i].1 += line.quantity,
            None => {
                index.insert(id, merged.len());
                merged.push((id, line.quantity));
            }
        }
    }

    merged
        .into_iter()
        .map(|(id, qty)| {
            if qty > MAX_QUANTITY_PER_LINE {
                Err(ServiceError::ValidationError(format!(
                    "Invalid quantity for item {}: must be between 1 and {}",
                    id, MAX_QUANTITY_PER_LINE
                )))
            } else {
                Ok((id, qty as i32))
            }
        })
        .collect()
}

/// Turns a cart submission into a durable `Pending` order priced from the catalog
#[derive(Clone)]
pub struct OrderBuilder {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    event_sender: Arc<EventSender>,
    pricing: PricingPolicy,
}

impl OrderBuilder {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        event_sender: Arc<EventSender>,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            catalog,
            orders,
            event_sender,
            pricing,
        }
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    #[instrument(skip(self, customer, lines), fields(lines = lines.len()))]
    pub async fn build_order(
        &self,
        customer: CustomerDetails,
        lines: Vec<CartLine>,
    ) -> Result<PlacedOrder, ServiceError> {
        let result = self.build_order_inner(customer, lines).await;
        if let Err(err) = &result {
            let reason = match err {
                ServiceError::ValidationError(_) => "validation",
                ServiceError::NotFound(_) => "item_unavailable",
                _ => "internal",
            };
            metrics::ORDERS_REJECTED.with_label_values(&[reason]).inc();
            warn!(error = %err, "Order rejected");
        }
        result
    }

    async fn build_order_inner(
        &self,
        customer: CustomerDetails,
        lines: Vec<CartLine>,
    ) -> Result<PlacedOrder, ServiceError> {
        customer.validate()?;
        let requested = normalise_lines(&lines)?;

        let ids: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
        let catalog: HashMap<Uuid, _> = self
            .catalog
            .find_available_items(&ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut order_lines = Vec::with_capacity(requested.len());
        for (id, quantity) in requested {
            let item = catalog
                .get(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Meal not found: {}", id)))?;
            order_lines.push(NewOrderLine {
                meal_id: item.id,
                name: item.name.clone(),
                unit_price_minor: item.price_minor,
                quantity,
                line_total_minor: line_total_minor(item.price_minor, quantity)?,
            });
        }

        let totals = self
            .pricing
            .totals(order_lines.iter().map(|l| l.line_total_minor))?;

        let notes = customer
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let order = self
            .orders
            .create(NewOrder {
                customer_name: customer.name.trim().to_string(),
                customer_phone: customer.phone.trim().to_string(),
                delivery_address: customer.address.trim().to_string(),
                notes,
                subtotal_minor: totals.subtotal_minor,
                delivery_minor: totals.delivery_minor,
                total_minor: totals.total_minor,
                currency: self.pricing.currency.clone(),
                lines: order_lines,
            })
            .await?;

        metrics::ORDERS_CREATED.inc();
        info!(order_id = %order.id, total_minor = order.total_minor, "Order created");
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.id,
                total_minor: order.total_minor,
                currency: order.currency.clone(),
            })
            .await;

        Ok(PlacedOrder {
            order_id: order.id,
            subtotal: minor_to_major(order.subtotal_minor),
            delivery: minor_to_major(order.delivery_minor),
            total: minor_to_major(order.total_minor),
            total_minor: order.total_minor,
            currency: order.currency,
            payment_state: order.payment_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Ada".into(),
            phone: "+234 801 234 5678".into(),
            address: "12 Marina Rd".into(),
            notes: None,
        }
    }

    #[test]
    fn totals_follow_delivery_rule() {
        let policy = PricingPolicy::default();
        assert_eq!(
            policy.totals([700_000]).unwrap(),
            OrderTotals {
                subtotal_minor: 700_000,
                delivery_minor: 150_000,
                total_minor: 850_000
            }
        );
        assert_eq!(policy.totals(std::iter::empty()).unwrap().total_minor, 0);
        assert!(policy.totals([i64::MAX, 1]).is_err());
    }

    #[test]
    fn duplicate_ids_are_merged_in_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lines = vec![CartLine::new(a, 1), CartLine::new(b, 2), CartLine::new(a, 3)];
        assert_eq!(normalise_lines(&lines).unwrap(), vec![(a, 4), (b, 2)]);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_matches!(normalise_lines(&[]), Err(ServiceError::ValidationError(_)));

        let mut bad_id = CartLine::new(Uuid::new_v4(), 1);
        bad_id.item_id = "not-a-uuid".into();
        assert_matches!(
            normalise_lines(&[bad_id]),
            Err(ServiceError::ValidationError(msg)) if msg.contains("not-a-uuid")
        );

        for qty in [0, -1, 101] {
            assert_matches!(
                normalise_lines(&[CartLine::new(Uuid::new_v4(), qty)]),
                Err(ServiceError::ValidationError(_))
            );
        }

        let id = Uuid::new_v4();
        assert_matches!(
            normalise_lines(&[CartLine::new(id, 60), CartLine::new(id, 60)]),
            Err(ServiceError::ValidationError(_))
        );

        let too_many: Vec<_> = (0..=MAX_LINES_PER_ORDER)
            .map(|_| CartLine::new(Uuid::new_v4(), 1))
            .collect();
        assert_matches!(normalise_lines(&too_many), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn customer_validation() {
        assert!(customer().validate().is_ok());

        let mut c = customer();
        c.name = "   ".into();
        assert!(c.validate().is_err());

        let mut c = customer();
        c.phone = "call me".into();
        assert!(c.validate().is_err());

        let mut c = customer();
        c.address = "x".repeat(301);
        assert!(c.validate().is_err());

        let mut c = customer();
        c.notes = Some("n".repeat(501));
        assert!(c.validate().is_err());
    }

    #[test]
    fn client_price_fields_are_accepted_on_the_wire() {
        let line: CartLine = serde_json::from_value(serde_json::json!({
            "mealId": Uuid::new_v4().to_string(),
            "qty": 2,
            "name": "Free food",
            "price": 1
        }))
        .unwrap();
        assert_eq!(line.quantity, 2);

        let unknown = serde_json::from_value::<CartLine>(serde_json::json!({
            "mealId": Uuid::new_v4().to_string(),
            "qty": 2,
            "discount": 100
        }));
        assert!(unknown.is_err());
    }
}
