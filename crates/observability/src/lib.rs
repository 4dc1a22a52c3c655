mod alert;
mod config;

use anyhow::Result;
use alert::{AlertLayer, AlertSender};
use config::ObservabilityConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the tracing stack for one process: an `EnvFilter` honoring
/// `RUST_LOG` with an `info` default, an RFC3339 fmt layer, and an optional
/// webhook sink for error-level events.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = config.alerts.as_ref().map(|alerts| {
        let sender = AlertSender::new(alerts.webhook_url.clone());

        AlertLayer::new(sender, config.service_context.clone()).with_filter(
            tracing_subscriber::filter::LevelFilter::from_level(alerts.min_level),
        )
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "Observability config warning"
        );
    }

    if config.alerts.is_some() {
        info!(
            component = %config.service_context.component,
            "Webhook error alerts enabled"
        );
    } else {
        info!(
            component = %config.service_context.component,
            "Webhook error alerts disabled"
        );
    }

    Ok(())
}
