//! Alert notification channels.
//!
//! Notifiers are fire-and-forget: [`dispatch`] spawns one send per channel
//! and never blocks the consumer. Failures are logged and counted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use surveil_core::{Alert, Severity};
use surveil_source::BoxFuture;
use surveil_telemetry::Metrics;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Endpoint rejected alert with status {status}")]
    Rejected { status: u16 },
}

/// Outbound alert delivery channel.
pub trait Notifier: Send + Sync {
    /// Channel name used in logs and metrics.
    fn channel(&self) -> &str;

    /// Alerts below this severity are not sent.
    fn min_severity(&self) -> Severity;

    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), NotifyError>>;
}

/// Arc wrapper for Notifier trait objects.
pub type DynNotifier = Arc<dyn Notifier>;

/// Writes alerts to the structured log.
pub struct LogNotifier {
    min_severity: Severity,
}

impl LogNotifier {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }
}

impl Notifier for LogNotifier {
    fn channel(&self) -> &str {
        "log"
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            warn!(
                alert_id = %alert.id,
                symbol = %alert.symbol,
                rule = %alert.rule_id,
                severity = alert.severity.as_str(),
                value = alert.value,
                threshold = alert.threshold,
                "ALERT: {}",
                alert.message
            );
            Ok(())
        })
    }
}

/// POSTs each alert as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    min_severity: Severity,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        min_severity: Severity,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            min_severity,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn channel(&self) -> &str {
        "webhook"
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(alert)
                .send()
                .await
                .map_err(|e| NotifyError::Delivery(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                });
            }
            debug!(alert_id = %alert.id, url = %self.url, "Webhook delivered");
            Ok(())
        })
    }
}

/// Notifier configuration (`[[notifiers]]` tables).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    Log {
        #[serde(default = "default_min_severity")]
        min_severity: Severity,
    },
    Webhook {
        url: String,
        #[serde(default = "default_min_severity")]
        min_severity: Severity,
        #[serde(default = "default_webhook_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_min_severity() -> Severity {
    Severity::Low
}

fn default_webhook_timeout_ms() -> u64 {
    5_000
}

impl NotifierConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Log { .. } => Ok(()),
            Self::Webhook {
                url, timeout_ms, ..
            } => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(format!("webhook url must be http(s): {url}"));
                }
                if *timeout_ms == 0 {
                    return Err("webhook timeout_ms must be positive".to_string());
                }
                Ok(())
            }
        }
    }

    pub fn build(&self) -> Result<DynNotifier, NotifyError> {
        let notifier: DynNotifier = match self {
            Self::Log { min_severity } => Arc::new(LogNotifier::new(*min_severity)),
            Self::Webhook {
                url,
                min_severity,
                timeout_ms,
            } => Arc::new(WebhookNotifier::new(
                url.clone(),
                *min_severity,
                Duration::from_millis(*timeout_ms),
            )?),
        };
        Ok(notifier)
    }
}

/// Spawn a send on every notifier whose threshold the alert meets.
///
/// Returns the number of sends spawned.
pub fn dispatch(notifiers: &[DynNotifier], alert: &Alert) -> usize {
    let mut spawned = 0;
    for notifier in notifiers {
        if alert.severity < notifier.min_severity() {
            Metrics::notification(notifier.channel(), "filtered");
            continue;
        }
        let notifier = Arc::clone(notifier);
        let alert = alert.clone();
        tokio::spawn(async move {
            match notifier.send(&alert).await {
                Ok(()) => Metrics::notification(notifier.channel(), "sent"),
                Err(e) => {
                    warn!(
                        channel = notifier.channel(),
                        alert_id = %alert.id,
                        error = %e,
                        "Notification failed"
                    );
                    Metrics::notification(notifier.channel(), "failed");
                }
            }
        });
        spawned += 1;
    }
    if spawned > 0 {
        info!(alert_id = %alert.id, channels = spawned, "Alert dispatched");
    }
    spawned
}
