use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use convoy_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let resolver = SourceResolver::from_working_directory();

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        resolver.source("server.bind_address", &["CONVOY_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        resolver.source("server.port", &["CONVOY_SERVER_PORT"]),
    ));

    lines.push(render_line(
        "database.url",
        &config.database.url,
        resolver.source("database.url", &["CONVOY_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        resolver.source("database.max_connections", &["CONVOY_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.connect_timeout_secs",
        &config.database.connect_timeout_secs.to_string(),
        resolver.source("database.connect_timeout_secs", &["CONVOY_DATABASE_CONNECT_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "agent.base_url",
        &config.agent.base_url,
        resolver.source("agent.base_url", &["CONVOY_AGENT_BASE_URL"]),
    ));
    lines.push(render_line(
        "agent.timeout_ms",
        &config.agent.timeout_ms.to_string(),
        resolver.source("agent.timeout_ms", &["CONVOY_AGENT_TIMEOUT_MS"]),
    ));
    lines.push(render_line(
        "agent.circuit_breaker.enabled",
        &config.agent.circuit_breaker.enabled.to_string(),
        resolver.source("agent.circuit_breaker.enabled", &["CONVOY_AGENT_BREAKER_ENABLED"]),
    ));

    lines.push(render_line(
        "llm.enabled",
        &config.llm.enabled.to_string(),
        resolver.source("llm.enabled", &["CONVOY_LLM_ENABLED"]),
    ));
    lines.push(render_line(
        "llm.model",
        &config.llm.model,
        resolver.source("llm.model", &["CONVOY_LLM_MODEL"]),
    ));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        resolver.source("llm.base_url", &["CONVOY_LLM_BASE_URL"]),
    ));

    let llm_api_key = match config.llm.api_key.as_ref() {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset>".to_string(),
    };
    lines.push(render_line(
        "llm.api_key",
        &llm_api_key,
        resolver.source("llm.api_key", &["CONVOY_LLM_API_KEY"]),
    ));

    lines.push(render_line(
        "review.requirement_threshold",
        &config.review.requirement_threshold.to_string(),
        resolver.source("review.requirement_threshold", &["CONVOY_REVIEW_REQUIREMENT_THRESHOLD"]),
    ));
    lines.push(render_line(
        "review.confidence_floor",
        &config.review.confidence_floor.to_string(),
        resolver.source("review.confidence_floor", &["CONVOY_REVIEW_CONFIDENCE_FLOOR"]),
    ));
    lines.push(render_line(
        "review.silent_floor",
        &config.review.silent_floor.to_string(),
        resolver.source("review.silent_floor", &["CONVOY_REVIEW_SILENT_FLOOR"]),
    ));
    lines.push(render_line(
        "review.max_auto_tasks",
        &config.review.max_auto_tasks.to_string(),
        resolver.source("review.max_auto_tasks", &["CONVOY_REVIEW_MAX_AUTO_TASKS"]),
    ));

    lines.push(render_line(
        "quality.webhook_url",
        config.quality.webhook_url.as_deref().unwrap_or("<unset>"),
        resolver.source("quality.webhook_url", &["CONVOY_QUALITY_WEBHOOK_URL"]),
    ));
    lines.push(render_line(
        "quality.low_score_threshold",
        &config.quality.low_score_threshold.to_string(),
        resolver.source("quality.low_score_threshold", &["CONVOY_QUALITY_LOW_SCORE_THRESHOLD"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        resolver.source("logging.level", &["CONVOY_LOGGING_LEVEL", "CONVOY_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        resolver.source("logging.format", &["CONVOY_LOGGING_FORMAT", "CONVOY_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

/// Attributes each rendered value to the env var, config file, or built-in
/// default it came from. Mirrors the precedence applied by `AppConfig::load`.
struct SourceResolver {
    config_file_doc: Option<Value>,
    config_file_path: Option<PathBuf>,
}

impl SourceResolver {
    fn from_working_directory() -> Self {
        let config_file_path = detect_config_path();
        let config_file_doc = load_config_file_doc(config_file_path.as_deref());
        Self { config_file_doc, config_file_path }
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        for env_key in env_keys.iter().copied() {
            if env::var_os(env_key).is_some() {
                return format!("env ({env_key})");
            }
        }

        if let Some(doc) = self.config_file_doc.as_ref() {
            if contains_path(doc, key_path) {
                let file_path = self
                    .config_file_path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("convoy.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/convoy.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
