use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use convoy_core::config::QualityConfig;
use convoy_core::ConversationId;
use serde::Deserialize;
use serde_json::{json, Value};

/// Webhook answer for a post-conversation quality check. `quality_score`
/// runs 0 to 100; `report` is whatever structured detail the checker adds.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct QualityVerdict {
    pub success: bool,
    #[serde(default)]
    pub quality_score: i64,
    #[serde(default)]
    pub report: Value,
}

/// Post-conversation quality check seam. Inspection is best-effort; callers
/// log failures and move on.
#[async_trait]
pub trait QualityInspector: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn inspect(&self, conversation_id: &ConversationId) -> Result<QualityVerdict>;
}

/// Posts closed conversations to an external quality webhook.
pub struct HttpQualityInspector {
    http: reqwest::Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl HttpQualityInspector {
    pub fn new(config: &QualityConfig) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            webhook_url: config.webhook_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }
}

#[async_trait]
impl QualityInspector for HttpQualityInspector {
    fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn inspect(&self, conversation_id: &ConversationId) -> Result<QualityVerdict> {
        let url = self
            .webhook_url
            .as_deref()
            .context("quality webhook url is not configured")?;

        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&json!({ "conversation_id": conversation_id.0.clone() }))
            .send()
            .await
            .context("calling quality webhook")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("quality webhook answered {status}");
        }

        response
            .json::<QualityVerdict>()
            .await
            .context("decoding quality webhook answer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(webhook_url: Option<&str>) -> QualityConfig {
        QualityConfig {
            webhook_url: webhook_url.map(String::from),
            timeout_ms: 1_000,
            low_score_threshold: 70,
        }
    }

    #[test]
    fn unconfigured_webhook_disables_inspection() {
        let inspector = HttpQualityInspector::new(&config(None)).unwrap();
        assert!(!inspector.is_enabled());

        let inspector = HttpQualityInspector::new(&config(Some("http://127.0.0.1:9/q"))).unwrap();
        assert!(inspector.is_enabled());
    }

    #[tokio::test]
    async fn inspecting_without_a_webhook_is_an_error() {
        let inspector = HttpQualityInspector::new(&config(None)).unwrap();
        let result = inspector.inspect(&ConversationId("conv-1".into())).await;
        assert!(result.is_err());
    }

    #[test]
    fn decodes_a_verdict_with_missing_optionals() {
        let full: QualityVerdict = serde_json::from_value(json!({
            "success": true,
            "quality_score": 84,
            "report": { "tone": "ok" }
        }))
        .unwrap();
        assert_eq!(full.quality_score, 84);

        let sparse: QualityVerdict = serde_json::from_value(json!({ "success": false })).unwrap();
        assert!(!sparse.success);
        assert_eq!(sparse.quality_score, 0);
        assert_eq!(sparse.report, Value::Null);
    }
}
