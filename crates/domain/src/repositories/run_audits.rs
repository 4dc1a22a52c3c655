use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait RunAuditRepository {
    /// Opens an audit row for a job run and returns its id.
    async fn start(&self, job: &str) -> Result<Uuid>;

    /// Completes the audit row with the run outcome and summary counts.
    async fn finish(
        &self,
        audit_id: Uuid,
        ok: bool,
        summary: serde_json::Value,
        error: Option<String>,
    ) -> Result<()>;
}
