//! Test data factories. Each function builds a complete, valid value with
//! sensible defaults; use the closure parameter to override fields.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::use_cases::subscriptions::CreateSubscriptionInput;
use crate::domain::entities::idempotency::{CorrelationId, IdempotencyKey};
use crate::domain::entities::money::Money;
use crate::domain::entities::payment_order::PaymentOrder;
use crate::domain::entities::subscription::BillingCycle;

pub fn create_subscription_input(
    client_reference: &str,
    overrides: impl FnOnce(&mut CreateSubscriptionInput),
) -> CreateSubscriptionInput {
    let mut input = CreateSubscriptionInput {
        customer_id: Uuid::new_v4(),
        plan_code: "plan-basic".to_string(),
        client_reference: client_reference.to_string(),
        amount: Decimal::new(999, 2),
        currency: "USD".to_string(),
        billing_cycle: BillingCycle::Monthly,
        interval_days: None,
        payment_method_token: "tok-abc".to_string(),
        trial_end: None,
        first_billing_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
        max_retry_attempts: 10,
    };
    overrides(&mut input);
    input
}

pub fn create_test_order(overrides: impl FnOnce(&mut PaymentOrder)) -> PaymentOrder {
    let mut order = PaymentOrder::create(
        Uuid::new_v4(),
        Money::new(Decimal::new(2500, 2), "USD").unwrap(),
        &CorrelationId::new_id(),
        &format!("req-{}", Uuid::new_v4()),
        &IdempotencyKey::new(&format!("key-{}", Uuid::new_v4().simple())).unwrap(),
        Utc::now(),
    );
    overrides(&mut order);
    order
}
