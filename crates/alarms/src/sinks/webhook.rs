//! Posts each alarm as JSON to a configured webhook (Slack/Discord-style
//! incoming webhook, or any HTTP endpoint that accepts a JSON body).

use async_trait::async_trait;
use auditwatch_core::AlarmMessage;
use auditwatch_engine::sink::{AlarmSink, AlarmSinkError};
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::error::AlarmError;

pub struct WebhookAlarmSink {
    url: String,
    client: Client,
}

impl WebhookAlarmSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }

    async fn post(&self, alarm: &AlarmMessage) -> Result<(), AlarmError> {
        let payload = json!({
            "level": alarm.level.as_str(),
            "application": alarm.source_application,
            "rule": alarm.rule_name,
            "summary": alarm.summary,
            "detail": alarm.detail,
            "event_id": alarm.event_id,
            "timestamp": alarm.timestamp,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AlarmError::WebhookRejected { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl AlarmSink for WebhookAlarmSink {
    async fn raise_alarm(&self, alarm: AlarmMessage) -> Result<(), AlarmSinkError> {
        self.post(&alarm).await.map_err(|e| {
            warn!(url = %self.url, error = %e, "webhook alarm delivery failed");
            AlarmSinkError::DeliveryFailed(e.to_string())
        })
    }
}
