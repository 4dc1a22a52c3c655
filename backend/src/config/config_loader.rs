use anyhow::{Ok, Result};

use super::config_model::DotEnvyConfig;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = super::config_model::BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = super::config_model::Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let stripe = super::config_model::Stripe {
        secret_key: std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
            .expect("STRIPE_WEBHOOK_SECRET is invalid"),
        success_url: std::env::var("STRIPE_SUCCESS_URL").expect("STRIPE_SUCCESS_URL is invalid"),
        cancel_url: std::env::var("STRIPE_CANCEL_URL").expect("STRIPE_CANCEL_URL is invalid"),
    };

    let identity = super::config_model::Identity {
        base_url: std::env::var("IDENTITY_BASE_URL").expect("IDENTITY_BASE_URL is invalid"),
        api_key: std::env::var("IDENTITY_API_KEY").expect("IDENTITY_API_KEY is invalid"),
        timeout_seconds: std::env::var("IDENTITY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        identity,
    })
}
