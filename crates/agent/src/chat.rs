use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use convoy_core::config::{AgentConfig, CircuitBreakerConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Outbound payload for the conversational agent service, snake_case on the
/// wire.
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub message: String,
    pub customer_id: String,
    pub metadata: HashMap<String, Value>,
}

/// Agent service answer. `success = false` still carries a message explaining
/// why the agent declined.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Transport contract for the conversational agent service.
///
/// `Ok(None)` means the agent was unavailable (circuit open, transport
/// failure, non-2xx answer). Callers treat that as "try the next reply
/// source", never as a hard error.
#[async_trait]
pub trait ChatAgentClient: Send + Sync {
    async fn send_message(&self, request: ChatRequest) -> Result<Option<ChatResponse>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time breaker readout for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker for the agent service.
///
/// Closed admits every call. Reaching `failure_threshold` consecutive
/// failures opens the circuit; once `reset_timeout_ms` has elapsed the next
/// call goes out as a half-open probe. A successful probe closes the circuit
/// again, a failed probe reopens it immediately. A disabled breaker admits
/// everything and records nothing.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Whether a call may go out right now. Flips open to half-open once the
    /// reset timeout has elapsed.
    pub fn try_acquire(&self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let waited = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if waited >= Duration::from_millis(self.config.reset_timeout_ms) {
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let tripped = inner.state == BreakerState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold;
        if tripped {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// reqwest-backed client for the agent service.
pub struct HttpChatAgentClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl HttpChatAgentClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Liveness probe for diagnostics; does not touch the breaker.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(event_name = "agent_health_check_failed", reason = %error);
                false
            }
        }
    }
}

#[async_trait]
impl ChatAgentClient for HttpChatAgentClient {
    async fn send_message(&self, request: ChatRequest) -> Result<Option<ChatResponse>> {
        if !self.breaker.try_acquire() {
            warn!(
                event_name = "agent_circuit_open",
                conversation_id = %request.conversation_id,
                customer_id = %request.customer_id,
                "agent call rejected while the circuit is open"
            );
            return Ok(None);
        }

        let url = format!("{}/api/chat/message", self.base_url);
        let sent = self.http.post(&url).timeout(self.timeout).json(&request).send().await;

        let response = match sent {
            Ok(response) => response,
            Err(error) => {
                self.breaker.record_failure();
                warn!(
                    event_name = "agent_call_failed",
                    conversation_id = %request.conversation_id,
                    customer_id = %request.customer_id,
                    reason = %error,
                );
                return Ok(None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.breaker.record_failure();
            warn!(
                event_name = "agent_call_rejected",
                conversation_id = %request.conversation_id,
                customer_id = %request.customer_id,
                status = %status,
            );
            return Ok(None);
        }

        match response.json::<ChatResponse>().await {
            Ok(parsed) => {
                self.breaker.record_success();
                Ok(Some(parsed))
            }
            Err(error) => {
                self.breaker.record_failure();
                warn!(
                    event_name = "agent_response_undecodable",
                    conversation_id = %request.conversation_id,
                    customer_id = %request.customer_id,
                    reason = %error,
                );
                Ok(None)
            }
        }
    }
}
