pub mod meal;
pub mod order;
pub mod order_line;

pub use order::{FailureReason, PaymentState};
