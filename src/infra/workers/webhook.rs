use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::app_error::AppError;
use crate::application::use_cases::webhooks::WebhookUseCases;
use crate::domain::entities::webhook_event::WebhookEvent;

/// Webhook worker: a fast tick that drains pending events and a slower tick
/// that requeues events abandoned in `Processing`.
pub async fn run_webhook_loops(
    webhook_uc: Arc<WebhookUseCases>,
    poll_millis: u64,
    stale_sweep_secs: u64,
) {
    let mut process_ticker = interval(Duration::from_millis(poll_millis));
    let mut stale_ticker = interval(Duration::from_secs(stale_sweep_secs));

    info!(
        "Webhook worker started (polling every {}ms, stale sweep every {}s)",
        poll_millis, stale_sweep_secs
    );

    loop {
        tokio::select! {
            _ = process_ticker.tick() => {
                process_next(&webhook_uc).await;
            }
            _ = stale_ticker.tick() => {
                sweep_stale(&webhook_uc).await;
            }
        }
    }
}

async fn process_next(webhook_uc: &Arc<WebhookUseCases>) {
    let next = match webhook_uc.fetch_next_pending().await {
        Ok(next) => next,
        Err(err) => {
            error!(error = %err, "Failed to fetch pending webhook events");
            return;
        }
    };
    let Some(event) = next else {
        return;
    };

    let claimed = match webhook_uc.mark_processing(event.id).await {
        Ok(claimed) => claimed,
        Err(AppError::Conflict) => {
            debug!(event_id = %event.event_id, "Another consumer claimed the event");
            return;
        }
        Err(err) => {
            error!(event_id = %event.event_id, error = %err, "Failed to claim webhook event");
            return;
        }
    };

    match dispatch(&claimed) {
        Ok(()) => {
            if let Err(err) = webhook_uc.mark_completed(claimed.id).await {
                error!(event_id = %claimed.event_id, error = %err, "Failed to complete webhook event");
            }
        }
        Err(reason) => {
            warn!(event_id = %claimed.event_id, reason = %reason, "Webhook handler failed");
            if let Err(err) = webhook_uc.mark_failed(claimed.id, &reason).await {
                error!(event_id = %claimed.event_id, error = %err, "Failed to record webhook failure");
            }
        }
    }
}

/// Hand-off point for domain-specific reconciliation. Payment and
/// subscription events are acknowledged here; reconciliation consumers work
/// off the recorded rows.
fn dispatch(event: &WebhookEvent) -> Result<(), String> {
    info!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        dedupe_hash = %event.dedupe_hash,
        "Processing webhook event"
    );
    Ok(())
}

async fn sweep_stale(webhook_uc: &Arc<WebhookUseCases>) {
    match webhook_uc.requeue_stale().await {
        Ok(0) => {}
        Ok(count) => warn!(count = count, "Requeued stale webhook events"),
        Err(err) => error!(error = %err, "Stale webhook sweep failed"),
    }
}
