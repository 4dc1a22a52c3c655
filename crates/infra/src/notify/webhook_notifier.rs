use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use url::Url;

use domain::repositories::notifier::ExpiryNotifier;

/// Posts expiry notifications to a delivery webhook (the notification
/// service owns templates and channels; this side only emits the event).
pub struct WebhookExpiryNotifier {
    http: reqwest::Client,
    webhook_url: Url,
}

impl WebhookExpiryNotifier {
    pub fn new(webhook_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl ExpiryNotifier for WebhookExpiryNotifier {
    async fn subscription_expired(&self, email: &str, plan_code: &str) -> Result<()> {
        let body = json!({
            "event": "subscription_expired",
            "email": email,
            "plan_code": plan_code,
        });

        let resp = self.http.post(self.webhook_url.clone()).json(&body).send().await?;

        if !resp.status().is_success() {
            anyhow::bail!("notification webhook returned status {}", resp.status());
        }

        Ok(())
    }
}
