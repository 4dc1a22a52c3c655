use anyhow::{Ok, Result};

use super::config_model::DotEnvyConfig;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = super::config_model::WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .expect("SERVER_PORT_WORKER is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
    };

    let database = super::config_model::Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let identity = super::config_model::Identity {
        base_url: std::env::var("IDENTITY_BASE_URL").expect("IDENTITY_BASE_URL is invalid"),
        api_key: std::env::var("IDENTITY_API_KEY").expect("IDENTITY_API_KEY is invalid"),
        timeout_seconds: std::env::var("IDENTITY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?,
    };

    let sweep = super::config_model::Sweep {
        interval_seconds: std::env::var("SWEEP_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()?,
        batch_limit: std::env::var("SWEEP_BATCH_LIMIT")
            .ok()
            .map(|value| value.parse())
            .transpose()?,
        internal_token: std::env::var("INTERNAL_SWEEP_TOKEN").ok(),
    };

    let notifier = super::config_model::Notifier {
        webhook_url: std::env::var("EXPIRY_NOTIFY_WEBHOOK_URL").ok(),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        identity,
        sweep,
        notifier,
    })
}
