use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::persistence::PostgresPersistence;
use crate::adapters::queue::redis_queue::RedisEventQueue;
use crate::application::ports::clock::{Clock, SystemClock};
use crate::application::ports::gateway::PaymentGateway;
use crate::application::use_cases::idempotency::IdempotencyGuard;
use crate::application::use_cases::payments::PaymentCommands;
use crate::application::use_cases::subscriptions::SubscriptionUseCases;
use crate::application::use_cases::webhooks::WebhookUseCases;
use crate::infra::config::AppConfig;
use crate::infra::db::init_db;
use crate::infra::gateway::http::HttpGateway;
use crate::infra::gateway::sandbox::SandboxGateway;

pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub payments: Arc<PaymentCommands>,
    pub subscriptions: Arc<SubscriptionUseCases>,
    pub webhooks: Arc<WebhookUseCases>,
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

pub async fn init_app_context() -> anyhow::Result<AppContext> {
    let config = Arc::new(AppConfig::from_env());

    let pool = init_db(&config.database_url).await?;
    let persistence = Arc::new(PostgresPersistence::new(pool));

    let queue = Arc::new(
        RedisEventQueue::new(&config.redis_url, &config.webhook_queue_key).await?,
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let gateway: Arc<dyn PaymentGateway> = if config.gateway_sandbox {
        tracing::warn!("Using sandbox payment gateway; no external calls will be made");
        Arc::new(SandboxGateway::new())
    } else {
        Arc::new(HttpGateway::new(
            &config.gateway_url,
            &config.gateway_api_login_id,
            SecretString::new(config.gateway_transaction_key.expose_secret().into()),
            config.gateway_timeout_secs,
        )?)
    };

    let guard = Arc::new(IdempotencyGuard::new(persistence.clone(), clock.clone()));

    let payments = Arc::new(PaymentCommands::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        guard.clone(),
        gateway.clone(),
        clock.clone(),
    ));

    let subscriptions = Arc::new(SubscriptionUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        guard,
        gateway,
        clock.clone(),
        config.auto_cancel_days,
    ));

    let webhooks = Arc::new(WebhookUseCases::new(
        persistence,
        queue,
        clock.clone(),
        config.webhook_stale_after_secs,
    ));

    Ok(AppContext {
        config,
        clock,
        payments,
        subscriptions,
        webhooks,
    })
}
