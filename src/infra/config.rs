use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    /// Payment gateway endpoint, e.g. the Authorize.Net sandbox URL.
    pub gateway_url: String,
    pub gateway_api_login_id: String,
    pub gateway_transaction_key: SecretString,
    pub gateway_timeout_secs: u64,
    /// Use the always-approving sandbox gateway instead of the HTTP client.
    pub gateway_sandbox: bool,
    /// Secret for verifying webhook signatures from the gateway.
    pub webhook_signature_key: SecretString,
    pub webhook_queue_key: String,
    pub billing_poll_secs: u64,
    pub billing_worker_concurrency: usize,
    pub webhook_poll_millis: u64,
    pub webhook_stale_sweep_secs: u64,
    pub webhook_stale_after_secs: i64,
    /// Days a subscription may stay delinquent before it is cancelled even
    /// with retries remaining.
    pub auto_cancel_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let gateway_url: String = get_env_default(
            "GATEWAY_URL",
            "https://apitest.authorize.net/xml/v1/request.api".to_string(),
        );
        let gateway_api_login_id: String = get_env_default("GATEWAY_API_LOGIN_ID", String::new());
        let gateway_transaction_key: SecretString = SecretString::new(
            get_env_default("GATEWAY_TRANSACTION_KEY", String::new()).into(),
        );
        let gateway_timeout_secs: u64 = get_env_default("GATEWAY_TIMEOUT_SECS", 30);
        let gateway_sandbox: bool = get_env_default("GATEWAY_SANDBOX", false);
        let webhook_signature_key: SecretString =
            SecretString::new(get_env_default("WEBHOOK_SIGNATURE_KEY", String::new()).into());
        let webhook_queue_key: String =
            get_env_default("WEBHOOK_QUEUE_KEY", "webhook:events".to_string());
        let billing_poll_secs: u64 = get_env_default("BILLING_POLL_SECS", 300);
        let billing_worker_concurrency: usize = get_env_default("BILLING_WORKER_CONCURRENCY", 4);
        let webhook_poll_millis: u64 = get_env_default("WEBHOOK_POLL_MILLIS", 1000);
        let webhook_stale_sweep_secs: u64 = get_env_default("WEBHOOK_STALE_SWEEP_SECS", 10);
        let webhook_stale_after_secs: i64 = get_env_default("WEBHOOK_STALE_AFTER_SECS", 300);
        let auto_cancel_days: i64 = get_env_default("AUTO_CANCEL_DAYS", 30);

        Self {
            database_url,
            redis_url,
            gateway_url,
            gateway_api_login_id,
            gateway_transaction_key,
            gateway_timeout_secs,
            gateway_sandbox,
            webhook_signature_key,
            webhook_queue_key,
            billing_poll_secs,
            billing_worker_concurrency,
            webhook_poll_millis,
            webhook_stale_sweep_secs,
            webhook_stale_after_secs,
            auto_cancel_days,
        }
    }
}
