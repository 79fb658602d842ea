use crate::commands::{current_thread_runtime, load_validated_config, CommandResult};
use convoy_db::{connect_with_settings, migrations, ScenarioSeedInfo, SeedDataset};

pub fn run() -> CommandResult {
    let config = match load_validated_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.connect_timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<Vec<ScenarioSeedInfo>, (&'static str, String, u8)> =
            if verification.all_present {
                Ok(seed_result.scenarios_seeded)
            } else {
                Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(scenarios) => CommandResult::success("seed", seed_summary(&scenarios)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_summary(scenarios: &[ScenarioSeedInfo]) -> String {
    let scenario_lines = scenarios
        .iter()
        .map(|info| format!("  - {}: {} ({})", info.scenario, info.conversation_id, info.description))
        .collect::<Vec<_>>();
    format!("seeded the deterministic support flows:\n{}", scenario_lines.join("\n"))
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed =
        checks.iter().filter_map(|(check, present)| (!present).then_some(*check)).collect::<Vec<_>>();
    if failed.is_empty() {
        "some seeded rows did not land".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{seed_summary, verification_failure_message};
    use convoy_db::ScenarioSeedInfo;

    #[test]
    fn verification_failure_message_names_the_missing_checks() {
        let checks = [
            ("knowledge-entries", true),
            ("escalated-review", false),
            ("completed-quality-report", false),
        ];

        assert_eq!(
            verification_failure_message(&checks),
            "seed verification failed for checks: escalated-review, completed-quality-report"
        );
    }

    #[test]
    fn verification_failure_message_degrades_to_a_generic_line() {
        let checks = [("knowledge-entries", true), ("auto-flow-task", true)];

        assert_eq!(verification_failure_message(&checks), "some seeded rows did not land");
    }

    #[test]
    fn seed_summary_lists_one_line_per_scenario() {
        let scenarios = [ScenarioSeedInfo {
            scenario: "auto_flow",
            conversation_id: "conv-auto-001",
            description: "High-priority requirement auto-created with task and active problem",
        }];

        let summary = seed_summary(&scenarios);
        assert!(summary.starts_with("seeded the deterministic support flows:"));
        assert!(summary.contains(
            "  - auto_flow: conv-auto-001 (High-priority requirement auto-created with task and active problem)"
        ));
    }
}
