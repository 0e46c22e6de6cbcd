pub mod dunning;
pub mod idempotency;
pub mod money;
pub mod payment_order;
pub mod payment_transaction;
pub mod refund;
pub mod subscription;
pub mod subscription_schedule;
pub mod webhook_event;
