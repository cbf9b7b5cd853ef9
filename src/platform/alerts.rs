use crate::config::AlertsConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;

/// Alert kinds emitted by the supervision core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum AlertKind {
    #[strum(serialize = "watchdog.stalled")]
    #[serde(rename = "watchdog.stalled")]
    WatchdogStalled,
    #[strum(serialize = "watchdog.recovered")]
    #[serde(rename = "watchdog.recovered")]
    WatchdogRecovered,
    #[strum(serialize = "budget.breach")]
    #[serde(rename = "budget.breach")]
    BudgetBreach,
    #[strum(serialize = "kill_switch.triggered")]
    #[serde(rename = "kill_switch.triggered")]
    KillSwitchTriggered,
}

impl AlertKind {
    pub fn severity(self) -> &'static str {
        match self {
            Self::WatchdogRecovered => "info",
            Self::WatchdogStalled | Self::BudgetBreach => "warning",
            Self::KillSwitchTriggered => "critical",
        }
    }
}

/// Notification transport for supervision alerts.
///
/// Delivery is best-effort: emitters go through [`notify`], which swallows
/// every error a sink returns.
pub trait AlertSink: Send + Sync {
    fn alert<'a>(
        &'a self,
        mission_id: &'a str,
        kind: AlertKind,
        detail: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Delivers an alert if a sink is configured. Failures are logged at debug
/// and dropped.
pub async fn notify(
    sink: Option<&Arc<dyn AlertSink>>,
    mission_id: &str,
    kind: AlertKind,
    detail: &str,
) {
    let Some(sink) = sink else {
        return;
    };
    if let Err(error) = sink.alert(mission_id, kind, detail).await {
        tracing::debug!(mission_id, kind = %kind, %error, "alert delivery failed");
    }
}

/// Picks the webhook sink when a URL is configured, the log sink otherwise.
pub fn from_config(config: &AlertsConfig) -> Arc<dyn AlertSink> {
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Arc::new(WebhookAlertSink::new(url, config.timeout_secs)),
        _ => Arc::new(LogAlertSink::new()),
    }
}

/// Writes every alert to the tracing log as a warning, tagged with its severity.
pub struct LogAlertSink;

impl LogAlertSink {
    pub fn new() -> Self {
        Self
    }
}

impl AlertSink for LogAlertSink {
    fn alert<'a>(
        &'a self,
        mission_id: &'a str,
        kind: AlertKind,
        detail: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tracing::warn!(mission_id, kind = %kind, severity = kind.severity(), detail, "alert");
            Ok(())
        })
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    ts: String,
    category: AlertKind,
    severity: &'static str,
    message: &'a str,
    mission_id: &'a str,
}

/// Posts alerts as JSON to an HTTP endpoint.
pub struct WebhookAlertSink {
    url: String,
    client: Client,
}

impl WebhookAlertSink {
    pub fn new(url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            url: url.to_string(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AlertSink for WebhookAlertSink {
    fn alert<'a>(
        &'a self,
        mission_id: &'a str,
        kind: AlertKind,
        detail: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let payload = WebhookPayload {
                ts: Utc::now().to_rfc3339(),
                category: kind,
                severity: kind.severity(),
                message: detail,
                mission_id,
            };
            self.client
                .post(&self.url)
                .json(&payload)
                .send()
                .await
                .with_context(|| format!("alert webhook request failed for {kind}"))?
                .error_for_status()
                .context("alert webhook rejected the alert")?;
            Ok(())
        })
    }
}
