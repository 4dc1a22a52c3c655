use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// Best-effort expiry notifications. Failures are logged and swallowed;
/// no state transition depends on a send succeeding.
#[automock]
#[async_trait]
pub trait ExpiryNotifier {
    async fn subscription_expired(&self, email: &str, plan_code: &str) -> Result<()>;
}
