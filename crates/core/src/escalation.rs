use serde::{Deserialize, Serialize};

/// Confidence floors and the auto-task ceiling used to route suggestions to
/// a human. Defaults mirror the production tuning; deployments can override
/// them through configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    pub confidence_floor: f64,
    pub silent_floor: f64,
    pub max_auto_tasks: u32,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self { confidence_floor: 0.8, silent_floor: 0.9, max_auto_tasks: 2 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscalationInput {
    pub confidence: f64,
    pub has_requirements: bool,
    pub tasks_created: u32,
    /// Explicit verdict from the conversational agent, when it gave one.
    /// Takes precedence over the recomputed decision.
    pub pipeline_flag: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationTrigger {
    PipelineFlagged,
    LowConfidence { confidence: f64, floor: f64 },
    TaskBurst { tasks_created: u32, max_auto_tasks: u32 },
    SilentDetection { confidence: f64, ceiling: f64 },
}

impl EscalationTrigger {
    fn reason(&self) -> String {
        match self {
            Self::PipelineFlagged => {
                "agent pipeline flagged the reply for human review".to_string()
            }
            Self::LowConfidence { confidence, floor } => {
                format!("confidence {confidence:.2} is below the automatic-send floor {floor:.2}")
            }
            Self::TaskBurst { tasks_created, max_auto_tasks } => {
                format!(
                    "{tasks_created} tasks were auto-created this turn, more than the {max_auto_tasks} allowed without sign-off"
                )
            }
            Self::SilentDetection { confidence, ceiling } => {
                format!(
                    "no requirements detected and confidence {confidence:.2} stays under the {ceiling:.2} ceiling; possible silent miss"
                )
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub escalate: bool,
    pub reason: String,
    pub trigger: Option<EscalationTrigger>,
}

impl EscalationDecision {
    fn auto(reason: impl Into<String>) -> Self {
        Self { escalate: false, reason: reason.into(), trigger: None }
    }

    fn escalate(trigger: EscalationTrigger) -> Self {
        Self { escalate: true, reason: trigger.reason(), trigger: Some(trigger) }
    }
}

impl ReviewPolicy {
    pub fn new(confidence_floor: f64, silent_floor: f64, max_auto_tasks: u32) -> Self {
        Self { confidence_floor, silent_floor, max_auto_tasks }
    }

    pub fn evaluate(&self, input: &EscalationInput) -> EscalationDecision {
        if let Some(flagged) = input.pipeline_flag {
            if flagged {
                return EscalationDecision::escalate(EscalationTrigger::PipelineFlagged);
            }
            return EscalationDecision::auto("agent pipeline cleared the reply for automatic send");
        }

        if input.confidence < self.confidence_floor {
            return EscalationDecision::escalate(EscalationTrigger::LowConfidence {
                confidence: input.confidence,
                floor: self.confidence_floor,
            });
        }

        if input.tasks_created > self.max_auto_tasks {
            return EscalationDecision::escalate(EscalationTrigger::TaskBurst {
                tasks_created: input.tasks_created,
                max_auto_tasks: self.max_auto_tasks,
            });
        }

        if !input.has_requirements && input.confidence < self.silent_floor {
            return EscalationDecision::escalate(EscalationTrigger::SilentDetection {
                confidence: input.confidence,
                ceiling: self.silent_floor,
            });
        }

        EscalationDecision::auto(format!(
            "confidence {:.2} within automatic limits",
            input.confidence
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{EscalationInput, EscalationTrigger, ReviewPolicy};

    fn input(confidence: f64, has_requirements: bool, tasks_created: u32) -> EscalationInput {
        EscalationInput { confidence, has_requirements, tasks_created, pipeline_flag: None }
    }

    #[test]
    fn low_confidence_always_escalates() {
        let policy = ReviewPolicy::default();

        // Sweep well below and just below the floor, with every combination
        // of the other factors.
        for pct in (0..80).step_by(4) {
            let confidence = f64::from(pct) / 100.0;
            for has_requirements in [true, false] {
                for tasks_created in [0, 1, 2] {
                    let decision =
                        policy.evaluate(&input(confidence, has_requirements, tasks_created));
                    assert!(
                        decision.escalate,
                        "confidence {confidence} must escalate (req={has_requirements}, tasks={tasks_created})"
                    );
                }
            }
        }
    }

    #[test]
    fn confident_reply_with_requirements_is_auto_handled() {
        let policy = ReviewPolicy::default();
        let decision = policy.evaluate(&input(0.85, true, 1));

        assert!(!decision.escalate);
        assert!(decision.trigger.is_none());
    }

    #[test]
    fn task_burst_escalates_even_at_high_confidence() {
        let policy = ReviewPolicy::default();

        let burst = policy.evaluate(&input(0.95, true, 3));
        assert!(burst.escalate);
        assert!(matches!(burst.trigger, Some(EscalationTrigger::TaskBurst { .. })));

        let within = policy.evaluate(&input(0.95, true, 2));
        assert!(!within.escalate);
    }

    #[test]
    fn silent_detection_guards_against_missed_requirements() {
        let policy = ReviewPolicy::default();

        let suspicious = policy.evaluate(&input(0.85, false, 0));
        assert!(suspicious.escalate);
        assert!(matches!(suspicious.trigger, Some(EscalationTrigger::SilentDetection { .. })));

        let confident = policy.evaluate(&input(0.92, false, 0));
        assert!(!confident.escalate);
    }

    #[test]
    fn pipeline_flag_overrides_the_recomputed_decision() {
        let policy = ReviewPolicy::default();

        let flagged = policy.evaluate(&EscalationInput {
            confidence: 0.99,
            has_requirements: true,
            tasks_created: 0,
            pipeline_flag: Some(true),
        });
        assert!(flagged.escalate);
        assert!(matches!(flagged.trigger, Some(EscalationTrigger::PipelineFlagged)));

        let cleared = policy.evaluate(&EscalationInput {
            confidence: 0.30,
            has_requirements: false,
            tasks_created: 0,
            pipeline_flag: Some(false),
        });
        assert!(!cleared.escalate);
    }

    #[test]
    fn thresholds_are_configurable() {
        let policy = ReviewPolicy::new(0.6, 0.7, 5);

        assert!(!policy.evaluate(&input(0.65, true, 4)).escalate);
        assert!(policy.evaluate(&input(0.55, true, 0)).escalate);
    }

    #[test]
    fn escalation_reasons_read_for_operators() {
        let policy = ReviewPolicy::default();
        let decision = policy.evaluate(&input(0.72, true, 0));

        assert!(decision.reason.contains("0.72"));
        assert!(decision.reason.contains("0.80"));
    }
}
