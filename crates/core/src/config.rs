use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::escalation::ReviewPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub review: ReviewConfig,
    pub quality: QualityConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_ms: u64,
}

/// Thresholds steering requirement creation and human review routing.
#[derive(Clone, Debug)]
pub struct ReviewConfig {
    pub requirement_threshold: f64,
    pub confidence_floor: f64,
    pub silent_floor: f64,
    pub max_auto_tasks: u32,
}

impl ReviewConfig {
    pub fn policy(&self) -> ReviewPolicy {
        ReviewPolicy::new(self.confidence_floor, self.silent_floor, self.max_auto_tasks)
    }
}

#[derive(Clone, Debug)]
pub struct QualityConfig {
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
    pub low_score_threshold: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub agent_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            database: DatabaseConfig {
                url: "sqlite://convoy.db".to_string(),
                max_connections: 5,
                connect_timeout_secs: 30,
            },
            agent: AgentConfig {
                base_url: "http://127.0.0.1:3002".to_string(),
                timeout_ms: 10_000,
                circuit_breaker: CircuitBreakerConfig {
                    enabled: true,
                    failure_threshold: 5,
                    reset_timeout_ms: 60_000,
                },
            },
            llm: LlmConfig {
                enabled: false,
                base_url: None,
                api_key: None,
                model: "qwen-plus".to_string(),
                timeout_ms: 30_000,
            },
            review: ReviewConfig {
                requirement_threshold: 0.7,
                confidence_floor: 0.8,
                silent_floor: 0.9,
                max_auto_tasks: 2,
            },
            quality: QualityConfig { webhook_url: None, timeout_ms: 5_000, low_score_threshold: 70 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("convoy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(connect_timeout_secs) = database.connect_timeout_secs {
                self.database.connect_timeout_secs = connect_timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(base_url) = agent.base_url {
                self.agent.base_url = base_url;
            }
            if let Some(timeout_ms) = agent.timeout_ms {
                self.agent.timeout_ms = timeout_ms;
            }
            if let Some(breaker) = agent.circuit_breaker {
                if let Some(enabled) = breaker.enabled {
                    self.agent.circuit_breaker.enabled = enabled;
                }
                if let Some(failure_threshold) = breaker.failure_threshold {
                    self.agent.circuit_breaker.failure_threshold = failure_threshold;
                }
                if let Some(reset_timeout_ms) = breaker.reset_timeout_ms {
                    self.agent.circuit_breaker.reset_timeout_ms = reset_timeout_ms;
                }
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_ms) = llm.timeout_ms {
                self.llm.timeout_ms = timeout_ms;
            }
        }

        if let Some(review) = patch.review {
            if let Some(requirement_threshold) = review.requirement_threshold {
                self.review.requirement_threshold = requirement_threshold;
            }
            if let Some(confidence_floor) = review.confidence_floor {
                self.review.confidence_floor = confidence_floor;
            }
            if let Some(silent_floor) = review.silent_floor {
                self.review.silent_floor = silent_floor;
            }
            if let Some(max_auto_tasks) = review.max_auto_tasks {
                self.review.max_auto_tasks = max_auto_tasks;
            }
        }

        if let Some(quality) = patch.quality {
            if let Some(webhook_url) = quality.webhook_url {
                self.quality.webhook_url = Some(webhook_url);
            }
            if let Some(timeout_ms) = quality.timeout_ms {
                self.quality.timeout_ms = timeout_ms;
            }
            if let Some(low_score_threshold) = quality.low_score_threshold {
                self.quality.low_score_threshold = low_score_threshold;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CONVOY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CONVOY_SERVER_PORT") {
            self.server.port = parse_u16("CONVOY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CONVOY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CONVOY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CONVOY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CONVOY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CONVOY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CONVOY_DATABASE_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs =
                parse_u64("CONVOY_DATABASE_CONNECT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CONVOY_AGENT_BASE_URL") {
            self.agent.base_url = value;
        }
        if let Some(value) = read_env("CONVOY_AGENT_TIMEOUT_MS") {
            self.agent.timeout_ms = parse_u64("CONVOY_AGENT_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("CONVOY_AGENT_BREAKER_ENABLED") {
            self.agent.circuit_breaker.enabled = parse_bool("CONVOY_AGENT_BREAKER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CONVOY_AGENT_FAILURE_THRESHOLD") {
            self.agent.circuit_breaker.failure_threshold =
                parse_u32("CONVOY_AGENT_FAILURE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CONVOY_AGENT_RESET_TIMEOUT_MS") {
            self.agent.circuit_breaker.reset_timeout_ms =
                parse_u64("CONVOY_AGENT_RESET_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("CONVOY_LLM_ENABLED") {
            self.llm.enabled = parse_bool("CONVOY_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CONVOY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CONVOY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONVOY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CONVOY_LLM_TIMEOUT_MS") {
            self.llm.timeout_ms = parse_u64("CONVOY_LLM_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("CONVOY_REVIEW_REQUIREMENT_THRESHOLD") {
            self.review.requirement_threshold =
                parse_f64("CONVOY_REVIEW_REQUIREMENT_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CONVOY_REVIEW_CONFIDENCE_FLOOR") {
            self.review.confidence_floor = parse_f64("CONVOY_REVIEW_CONFIDENCE_FLOOR", &value)?;
        }
        if let Some(value) = read_env("CONVOY_REVIEW_SILENT_FLOOR") {
            self.review.silent_floor = parse_f64("CONVOY_REVIEW_SILENT_FLOOR", &value)?;
        }
        if let Some(value) = read_env("CONVOY_REVIEW_MAX_AUTO_TASKS") {
            self.review.max_auto_tasks = parse_u32("CONVOY_REVIEW_MAX_AUTO_TASKS", &value)?;
        }

        if let Some(value) = read_env("CONVOY_QUALITY_WEBHOOK_URL") {
            self.quality.webhook_url = Some(value);
        }
        if let Some(value) = read_env("CONVOY_QUALITY_TIMEOUT_MS") {
            self.quality.timeout_ms = parse_u64("CONVOY_QUALITY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("CONVOY_QUALITY_LOW_SCORE_THRESHOLD") {
            self.quality.low_score_threshold =
                parse_i64("CONVOY_QUALITY_LOW_SCORE_THRESHOLD", &value)?;
        }

        let log_level = read_env("CONVOY_LOGGING_LEVEL").or_else(|| read_env("CONVOY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONVOY_LOGGING_FORMAT").or_else(|| read_env("CONVOY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(agent_base_url) = overrides.agent_base_url {
            self.agent.base_url = agent_base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_database(&self.database)?;
        validate_agent(&self.agent)?;
        validate_llm(&self.llm)?;
        validate_review(&self.review)?;
        validate_quality(&self.quality)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("convoy.toml"), PathBuf::from("config/convoy.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.connect_timeout_secs == 0 || database.connect_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.connect_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    let base_url = agent.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "agent.base_url must start with http:// or https://".to_string(),
        ));
    }

    if agent.timeout_ms == 0 || agent.timeout_ms > 300_000 {
        return Err(ConfigError::Validation(
            "agent.timeout_ms must be in range 1..=300000".to_string(),
        ));
    }

    if agent.circuit_breaker.enabled {
        if agent.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "agent.circuit_breaker.failure_threshold must be greater than zero".to_string(),
            ));
        }
        if agent.circuit_breaker.reset_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "agent.circuit_breaker.reset_timeout_ms must be greater than zero".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_ms == 0 || llm.timeout_ms > 300_000 {
        return Err(ConfigError::Validation("llm.timeout_ms must be in range 1..=300000".to_string()));
    }

    if llm.enabled {
        let missing_url = llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing_url {
            return Err(ConfigError::Validation(
                "llm.base_url is required when llm.enabled is true".to_string(),
            ));
        }

        let missing_key = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "llm.api_key is required when llm.enabled is true".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_review(review: &ReviewConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("review.requirement_threshold", review.requirement_threshold),
        ("review.confidence_floor", review.confidence_floor),
        ("review.silent_floor", review.silent_floor),
    ] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{name} must be in range 0.0..=1.0")));
        }
    }

    // The thresholds gate progressively stricter outcomes and must stay
    // ordered, otherwise a reply could be auto-sent yet too weak to create
    // the requirement it talks about.
    if review.requirement_threshold > review.confidence_floor {
        return Err(ConfigError::Validation(
            "review.requirement_threshold must not exceed review.confidence_floor".to_string(),
        ));
    }
    if review.confidence_floor > review.silent_floor {
        return Err(ConfigError::Validation(
            "review.confidence_floor must not exceed review.silent_floor".to_string(),
        ));
    }

    Ok(())
}

fn validate_quality(quality: &QualityConfig) -> Result<(), ConfigError> {
    if let Some(webhook_url) = &quality.webhook_url {
        let url = webhook_url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "quality.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if quality.timeout_ms == 0 || quality.timeout_ms > 300_000 {
        return Err(ConfigError::Validation(
            "quality.timeout_ms must be in range 1..=300000".to_string(),
        ));
    }

    if !(0..=100).contains(&quality.low_score_threshold) {
        return Err(ConfigError::Validation(
            "quality.low_score_threshold must be in range 0..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    database: Option<DatabasePatch>,
    agent: Option<AgentPatch>,
    llm: Option<LlmPatch>,
    review: Option<ReviewPatch>,
    quality: Option<QualityPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    circuit_breaker: Option<CircuitBreakerPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CircuitBreakerPatch {
    enabled: Option<bool>,
    failure_threshold: Option<u32>,
    reset_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewPatch {
    requirement_threshold: Option<f64>,
    confidence_floor: Option<f64>,
    silent_floor: Option<f64>,
    max_auto_tasks: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct QualityPatch {
    webhook_url: Option<String>,
    timeout_ms: Option<u64>,
    low_score_threshold: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.review.confidence_floor == 0.8, "default confidence floor should be 0.8")?;
        ensure(config.review.max_auto_tasks == 2, "default auto-task ceiling should be 2")?;
        ensure(config.quality.low_score_threshold == 70, "default low-score threshold should be 70")?;
        ensure(config.agent.circuit_breaker.enabled, "circuit breaker should default to enabled")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LLM_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("convoy.toml");
            fs::write(
                &path,
                r#"
[llm]
enabled = true
base_url = "https://llm.internal.example"
api_key = "${TEST_LLM_API_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let api_key = config
                .llm
                .api_key
                .as_ref()
                .ok_or_else(|| "api key should be present".to_string())?;
            ensure(
                api_key.expose_secret() == "sk-from-env",
                "api key should be loaded from environment",
            )?;
            ensure(config.llm.enabled, "llm should be enabled from the file")?;
            Ok(())
        })();

        clear_vars(&["TEST_LLM_API_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONVOY_AGENT_BASE_URL", "http://agent-from-env:3002");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("convoy.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[agent]
base_url = "http://agent-from-file:3002"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.agent.base_url == "http://agent-from-env:3002",
                "env agent base url should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["CONVOY_AGENT_BASE_URL"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONVOY_LOG_LEVEL", "warn");
        env::set_var("CONVOY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CONVOY_LOG_LEVEL", "CONVOY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn review_thresholds_must_stay_ordered() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONVOY_REVIEW_SILENT_FLOOR", "0.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("confidence_floor")
            );
            ensure(has_message, "validation failure should mention the threshold ordering")
        })();

        clear_vars(&["CONVOY_REVIEW_SILENT_FLOOR"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONVOY_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["CONVOY_LLM_API_KEY"]);
        result
    }
}
