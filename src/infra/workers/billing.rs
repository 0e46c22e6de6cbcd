use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{error, info};

use crate::application::ports::clock::Clock;
use crate::application::use_cases::subscriptions::SubscriptionUseCases;

/// Periodic driver for subscription billing. Each tick fans the due
/// subscriptions out across a semaphore-bounded set of tasks; different
/// subscriptions are independent, one subscription is never processed by two
/// tasks in the same pass.
pub async fn run_billing_loop(
    subscription_uc: Arc<SubscriptionUseCases>,
    clock: Arc<dyn Clock>,
    poll_secs: u64,
    concurrency: usize,
) {
    let mut ticker = interval(Duration::from_secs(poll_secs));
    let semaphore = Arc::new(Semaphore::new(concurrency));

    info!(
        "Billing worker started (polling every {}s, max {} concurrent)",
        poll_secs, concurrency
    );

    loop {
        ticker.tick().await;
        run_billing_pass(&subscription_uc, &clock, &semaphore).await;
    }
}

async fn run_billing_pass(
    subscription_uc: &Arc<SubscriptionUseCases>,
    clock: &Arc<dyn Clock>,
    semaphore: &Arc<Semaphore>,
) {
    let threshold = clock.now();
    let due = match subscription_uc.due_subscriptions(threshold).await {
        Ok(due) => due,
        Err(err) => {
            error!(error = %err, "Failed to load due subscriptions");
            return;
        }
    };

    if due.is_empty() {
        return;
    }

    info!(count = due.len(), threshold = %threshold, "Processing due subscriptions");

    let mut handles = Vec::with_capacity(due.len());

    for subscription in due {
        let uc = Arc::clone(subscription_uc);
        let sem = Arc::clone(semaphore);

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            if let Err(err) = uc.process_subscription(subscription.id).await {
                error!(
                    subscription_id = %subscription.id,
                    error = %err,
                    "Billing attempt failed"
                );
            }
        }));
    }

    for handle in handles {
        if let Err(err) = handle.await {
            error!(error = %err, "Billing task panicked");
        }
    }
}
