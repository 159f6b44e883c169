// Storefront core
pub mod order_builder;
pub mod payment_gateway;
pub mod reconciliation;

// Entry points used by handlers
pub mod catalog;
pub mod orders;
pub mod payments;
