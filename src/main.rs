use dotenvy::dotenv;
use tracing::info;

use payrail::infra::setup::{init_app_context, init_tracing};
use payrail::infra::workers::billing::run_billing_loop;
use payrail::infra::workers::webhook::run_webhook_loops;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let ctx = init_app_context().await?;

    let billing_uc = ctx.subscriptions.clone();
    let billing_clock = ctx.clock.clone();
    let billing_poll_secs = ctx.config.billing_poll_secs;
    let billing_concurrency = ctx.config.billing_worker_concurrency;
    let billing = tokio::spawn(async move {
        run_billing_loop(
            billing_uc,
            billing_clock,
            billing_poll_secs,
            billing_concurrency,
        )
        .await;
    });

    let webhook_uc = ctx.webhooks.clone();
    let webhook_poll_millis = ctx.config.webhook_poll_millis;
    let stale_sweep_secs = ctx.config.webhook_stale_sweep_secs;
    let webhooks = tokio::spawn(async move {
        run_webhook_loops(webhook_uc, webhook_poll_millis, stale_sweep_secs).await;
    });

    info!("payrail worker running");

    tokio::select! {
        _ = billing => {}
        _ = webhooks => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
