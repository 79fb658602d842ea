use convoy_agent::chat::{BreakerState, HttpChatAgentClient};
use convoy_core::config::{AppConfig, LoadOptions};
use convoy_db::connect_with_settings;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });

            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(check_database_connectivity(&runtime, &config));
                    let (connectivity, breaker) = check_agent_service(&runtime, &config);
                    checks.push(connectivity);
                    checks.push(breaker);
                }
                Err(error) => {
                    checks.push(DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to initialize async runtime: {error}"),
                    });
                    checks.push(skipped(
                        "agent_connectivity",
                        "skipped because the async runtime did not start",
                    ));
                    checks.push(skipped(
                        "agent_breaker",
                        "skipped because the async runtime did not start",
                    ));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped(
                "database_connectivity",
                "skipped because configuration did not load",
            ));
            checks.push(skipped("agent_connectivity", "skipped because configuration did not load"));
            checks.push(skipped("agent_breaker", "skipped because configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database_connectivity(
    runtime: &tokio::runtime::Runtime,
    config: &AppConfig,
) -> DoctorCheck {
    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.connect_timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_agent_service(
    runtime: &tokio::runtime::Runtime,
    config: &AppConfig,
) -> (DoctorCheck, DoctorCheck) {
    let client = match HttpChatAgentClient::new(&config.agent) {
        Ok(client) => client,
        Err(error) => {
            return (
                DoctorCheck {
                    name: "agent_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to build the agent client: {error}"),
                },
                skipped("agent_breaker", "skipped because the agent client did not build"),
            );
        }
    };

    let healthy = runtime.block_on(client.check_health());
    let connectivity = if healthy {
        DoctorCheck {
            name: "agent_connectivity",
            status: CheckStatus::Pass,
            details: format!("agent `{}` answered the health probe", config.agent.base_url),
        }
    } else {
        DoctorCheck {
            name: "agent_connectivity",
            status: CheckStatus::Fail,
            details: format!("agent `{}` did not answer the health probe", config.agent.base_url),
        }
    };

    let snapshot = client.breaker().snapshot();
    let breaker = DoctorCheck {
        name: "agent_breaker",
        status: if snapshot.state == BreakerState::Open {
            CheckStatus::Fail
        } else {
            CheckStatus::Pass
        },
        details: format!(
            "circuit {} with {} consecutive failures",
            snapshot.state.as_str(),
            snapshot.consecutive_failures
        ),
    };

    (connectivity, breaker)
}

fn skipped(name: &'static str, details: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: details.to_string() }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
