use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Canonical seeds and verification contract for the three core support flows.
const SEED_SCENARIOS: &[SeedScenarioContract] = &[
    SeedScenarioContract {
        scenario: "auto_flow",
        conversation_id: "conv-auto-001",
        customer_id: "cust-auto-001",
        channel: "web",
        status: "open",
        expected_message_count: 2,
        requirement_id: Some("req-auto-001"),
        task_id: Some("task-auto-001"),
        problem_id: Some("prob-auto-001"),
        problem_status: Some("in_progress"),
        review_request_id: None,
        quality_report_id: None,
        description: "High-priority requirement auto-created with task and active problem",
    },
    SeedScenarioContract {
        scenario: "escalated",
        conversation_id: "conv-esc-001",
        customer_id: "cust-esc-001",
        channel: "feishu",
        status: "open",
        expected_message_count: 1,
        requirement_id: None,
        task_id: None,
        problem_id: None,
        problem_status: None,
        review_request_id: Some("rev-esc-001"),
        quality_report_id: None,
        description: "Low-confidence suggestion parked in the pending review queue",
    },
    SeedScenarioContract {
        scenario: "completed",
        conversation_id: "conv-done-001",
        customer_id: "cust-done-001",
        channel: "web",
        status: "closed",
        expected_message_count: 3,
        requirement_id: None,
        task_id: None,
        problem_id: Some("prob-done-001"),
        problem_status: Some("resolved"),
        review_request_id: None,
        quality_report_id: Some("qr-done-001"),
        description: "Closed conversation with resolved problem and quality report",
    },
];

const SEED_CONVERSATION_IDS: &[&str] = &["conv-auto-001", "conv-esc-001", "conv-done-001"];

const SEED_KNOWLEDGE_IDS: &[&str] = &["kb-login-001", "kb-export-001"];

/// Seed dataset for the three core support flows.
///
/// Provides deterministic fixtures for:
/// 1. Auto-handled requirement intake
/// 2. Escalated review queue entry
/// 3. Completed conversation with quality report
pub struct SeedDataset;

impl SeedDataset {
    /// SQL fixture content for the seed data.
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Load the seed dataset into the database.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let scenarios_seeded = SEED_SCENARIOS
            .iter()
            .map(|scenario| ScenarioSeedInfo {
                scenario: scenario.scenario,
                conversation_id: scenario.conversation_id,
                description: scenario.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { scenarios_seeded })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let quoted_entries = sql_array_from_ids(SEED_KNOWLEDGE_IDS);
        let expected_entry_total = SEED_KNOWLEDGE_IDS.len() as i64;
        let existing_entry_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM knowledge_entries WHERE id IN {quoted_entries}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("knowledge-entries", existing_entry_count == expected_entry_total));

        for scenario in SEED_SCENARIOS {
            let conversation_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1 AND customer_id = ?2 AND channel = ?3 AND status = ?4)",
            )
            .bind(scenario.conversation_id)
            .bind(scenario.customer_id)
            .bind(scenario.channel)
            .bind(scenario.status)
            .fetch_one(pool)
            .await?;
            checks.push((scenario.conversation_label(), conversation_ok == 1));

            let message_count: Option<i64> = sqlx::query_scalar(
                "SELECT json_array_length(messages) FROM conversations WHERE id = ?1",
            )
            .bind(scenario.conversation_id)
            .fetch_optional(pool)
            .await?;
            checks.push((
                scenario.message_count_label(),
                message_count == Some(scenario.expected_message_count),
            ));

            if let Some(requirement_id) = scenario.requirement_id {
                let requirement_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM requirements WHERE id = ?1 AND conversation_id = ?2 AND status = 'pending')",
                )
                .bind(requirement_id)
                .bind(scenario.conversation_id)
                .fetch_one(pool)
                .await?;
                checks.push((scenario.requirement_label(), requirement_ok == 1));
            }

            if let Some(task_id) = scenario.task_id {
                let task_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1 AND conversation_id = ?2 AND requirement_id = ?3)",
                )
                .bind(task_id)
                .bind(scenario.conversation_id)
                .bind(scenario.requirement_id)
                .fetch_one(pool)
                .await?;
                checks.push((scenario.task_label(), task_ok == 1));
            }

            if let Some(problem_id) = scenario.problem_id {
                let problem_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM problems WHERE id = ?1 AND conversation_id = ?2 AND status = ?3)",
                )
                .bind(problem_id)
                .bind(scenario.conversation_id)
                .bind(scenario.problem_status)
                .fetch_one(pool)
                .await?;
                checks.push((scenario.problem_label(), problem_ok == 1));
            }

            if let Some(review_request_id) = scenario.review_request_id {
                let review_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM review_requests WHERE id = ?1 AND conversation_id = ?2 AND status = 'pending')",
                )
                .bind(review_request_id)
                .bind(scenario.conversation_id)
                .fetch_one(pool)
                .await?;
                checks.push((scenario.review_label(), review_ok == 1));
            }

            if let Some(quality_report_id) = scenario.quality_report_id {
                let report_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM quality_reports WHERE id = ?1 AND conversation_id = ?2)",
                )
                .bind(quality_report_id)
                .bind(scenario.conversation_id)
                .fetch_one(pool)
                .await?;
                checks.push((scenario.quality_label(), report_ok == 1));
            }
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Clean up seeded fixtures from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_conversations = sql_array_from_ids(SEED_CONVERSATION_IDS);
        let quoted_entries = sql_array_from_ids(SEED_KNOWLEDGE_IDS);

        sqlx::query(&format!(
            "DELETE FROM quality_reports WHERE conversation_id IN {quoted_conversations}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM review_requests WHERE conversation_id IN {quoted_conversations}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM problems WHERE conversation_id IN {quoted_conversations}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM tasks WHERE conversation_id IN {quoted_conversations}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM requirements WHERE conversation_id IN {quoted_conversations}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM conversations WHERE id IN {quoted_conversations}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM knowledge_entries WHERE id IN {quoted_entries}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedScenarioContract {
    scenario: &'static str,
    conversation_id: &'static str,
    customer_id: &'static str,
    channel: &'static str,
    status: &'static str,
    expected_message_count: i64,
    requirement_id: Option<&'static str>,
    task_id: Option<&'static str>,
    problem_id: Option<&'static str>,
    problem_status: Option<&'static str>,
    review_request_id: Option<&'static str>,
    quality_report_id: Option<&'static str>,
    description: &'static str,
}

impl SeedScenarioContract {
    fn conversation_label(&self) -> &'static str {
        match self.scenario {
            "auto_flow" => "auto-flow-conversation",
            "escalated" => "escalated-conversation",
            _ => "completed-conversation",
        }
    }

    fn message_count_label(&self) -> &'static str {
        match self.scenario {
            "auto_flow" => "auto-flow-message-count",
            "escalated" => "escalated-message-count",
            _ => "completed-message-count",
        }
    }

    fn requirement_label(&self) -> &'static str {
        match self.scenario {
            "auto_flow" => "auto-flow-requirement",
            "escalated" => "escalated-requirement",
            _ => "completed-requirement",
        }
    }

    fn task_label(&self) -> &'static str {
        match self.scenario {
            "auto_flow" => "auto-flow-task",
            "escalated" => "escalated-task",
            _ => "completed-task",
        }
    }

    fn problem_label(&self) -> &'static str {
        match self.scenario {
            "auto_flow" => "auto-flow-problem",
            "escalated" => "escalated-problem",
            _ => "completed-problem",
        }
    }

    fn review_label(&self) -> &'static str {
        match self.scenario {
            "auto_flow" => "auto-flow-review",
            "escalated" => "escalated-review",
            _ => "completed-review",
        }
    }

    fn quality_label(&self) -> &'static str {
        match self.scenario {
            "auto_flow" => "auto-flow-quality-report",
            "escalated" => "escalated-quality-report",
            _ => "completed-quality-report",
        }
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub scenarios_seeded: Vec<ScenarioSeedInfo>,
}

#[derive(Debug)]
pub struct ScenarioSeedInfo {
    pub scenario: &'static str,
    pub conversation_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
