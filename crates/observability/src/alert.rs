use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use url::Url;

use super::config::ServiceContext;

#[derive(Clone, Debug)]
pub(crate) struct AlertEvent {
    level: Level,
    timestamp: DateTime<Utc>,
    service_name: String,
    environment: String,
    component: String,
    target: String,
    file: Option<String>,
    line: Option<u32>,
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

/// Fans events out to the alert webhook from a bounded queue so a slow or
/// dead endpoint never blocks the thread emitting the log line.
#[derive(Clone)]
pub(crate) struct AlertSender {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertSender {
    pub(crate) fn new(webhook_url: Url) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(256);
        let http = reqwest::Client::new();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(error) = post_alert(&http, &webhook_url, &event).await {
                    warn!(error = %error, "Alert webhook delivery failed");
                }
            }
        });

        Self { tx }
    }

    fn try_notify(&self, event: AlertEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Alert queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Alert queue closed; dropping event");
            }
        }
    }
}

async fn post_alert(http: &reqwest::Client, url: &Url, event: &AlertEvent) -> anyhow::Result<()> {
    let body = json!({
        "level": event.level.to_string(),
        "timestamp": event.timestamp.to_rfc3339(),
        "service": event.service_name,
        "environment": event.environment,
        "component": event.component,
        "target": event.target,
        "file": event.file,
        "line": event.line,
        "message": event.message,
        "fields": event.fields,
    });

    let resp = http.post(url.clone()).json(&body).send().await?;

    if !resp.status().is_success() {
        anyhow::bail!("alert webhook returned status {}", resp.status());
    }

    Ok(())
}

pub(crate) struct AlertLayer {
    sender: AlertSender,
    service_context: ServiceContext,
}

impl AlertLayer {
    pub(crate) fn new(sender: AlertSender, service_context: ServiceContext) -> Self {
        Self {
            sender,
            service_context,
        }
    }
}

#[derive(Default)]
struct FieldMapVisitor {
    values: BTreeMap<String, String>,
}

impl Visit for FieldMapVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value.to_string()));
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldMapVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .values
            .remove("message")
            .map(|raw| unquote_debug_string(&raw));

        let alert = AlertEvent {
            level: *event.metadata().level(),
            timestamp: Utc::now(),
            service_name: self.service_context.service_name.clone(),
            environment: self.service_context.environment.clone(),
            component: self.service_context.component.clone(),
            target: event.metadata().target().to_string(),
            file: event.metadata().file().map(|f| f.to_string()),
            line: event.metadata().line(),
            message,
            fields: visitor.values,
        };

        self.sender.try_notify(alert);
    }
}

fn unquote_debug_string(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

fn redact(field_name: &str, value: String) -> String {
    if is_sensitive_key(field_name) {
        return "[REDACTED]".to_string();
    }
    value
}

fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    field.contains("webhook")
        || field.contains("secret")
        || field.contains("password")
        || field.contains("token")
        || field.contains("authorization")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_sensitive_field_names() {
        assert_eq!(
            redact("stripe_webhook_secret", "whsec_123".to_string()),
            "[REDACTED]"
        );
        assert_eq!(redact("user_id", "u-1".to_string()), "u-1");
    }

    #[test]
    fn unquotes_debug_formatted_messages() {
        assert_eq!(unquote_debug_string("\"quota exceeded\""), "quota exceeded");
        assert_eq!(unquote_debug_string("plain"), "plain");
    }
}
