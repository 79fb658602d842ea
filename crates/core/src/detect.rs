use serde::{Deserialize, Serialize};

use crate::domain::requirement::{Priority, RequirementCategory, RequirementSource};

/// Every candidate carries this fixed confidence; the coordinator gates on
/// it with the configured creation threshold.
const DETECTION_CONFIDENCE: f64 = 0.8;

const TITLE_CHAR_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub request_keywords: Vec<String>,
    pub urgency_keywords: Vec<String>,
    pub technical_keywords: Vec<String>,
    pub product_keywords: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            request_keywords: vec![
                "需要".to_string(),
                "希望".to_string(),
                "想要".to_string(),
                "能不能".to_string(),
                "可以".to_string(),
                "功能".to_string(),
                "添加".to_string(),
                "修改".to_string(),
                "need".to_string(),
                "want".to_string(),
                "can you".to_string(),
                "add".to_string(),
            ],
            urgency_keywords: vec![
                "紧急".to_string(),
                "无法".to_string(),
                "宕机".to_string(),
                "崩溃".to_string(),
                "urgent".to_string(),
                "asap".to_string(),
            ],
            technical_keywords: vec![
                "报错".to_string(),
                "错误".to_string(),
                "异常".to_string(),
                "故障".to_string(),
                "登录".to_string(),
                "无法".to_string(),
                "bug".to_string(),
                "error".to_string(),
                "crash".to_string(),
                "login".to_string(),
            ],
            product_keywords: vec![
                "功能".to_string(),
                "添加".to_string(),
                "feature".to_string(),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequirementSignal {
    pub request_matches: Vec<String>,
    pub urgency_matches: Vec<String>,
    pub technical_matches: Vec<String>,
    pub product_matches: Vec<String>,
    pub detected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequirementCandidate {
    pub title: String,
    pub description: String,
    pub category: RequirementCategory,
    pub priority: Priority,
    pub confidence: f64,
    pub source: RequirementSource,
}

/// Keyword-gated requirement classification. Pure and synchronous; the
/// keyword sets are configuration so deployments can tune the gate without
/// touching code.
#[derive(Clone, Debug, Default)]
pub struct RequirementDetector {
    config: DetectorConfig,
}

impl RequirementDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn analyze(&self, text: &str) -> RequirementSignal {
        let normalized = text.to_lowercase();
        let request_matches = matches_in(&self.config.request_keywords, &normalized);
        let urgency_matches = matches_in(&self.config.urgency_keywords, &normalized);
        let technical_matches = matches_in(&self.config.technical_keywords, &normalized);
        let product_matches = matches_in(&self.config.product_keywords, &normalized);
        let detected = !request_matches.is_empty() || !urgency_matches.is_empty();

        RequirementSignal {
            request_matches,
            urgency_matches,
            technical_matches,
            product_matches,
            detected,
        }
    }

    /// Zero or one candidate per message. Empty input or text without any
    /// requirement-like keyword yields nothing.
    pub fn detect(&self, text: &str) -> Vec<RequirementCandidate> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let signal = self.analyze(text);
        if !signal.detected {
            return Vec::new();
        }

        let priority = if !signal.urgency_matches.is_empty() {
            Priority::Urgent
        } else if !signal.technical_matches.is_empty() {
            Priority::High
        } else {
            Priority::Medium
        };

        let category = if !signal.technical_matches.is_empty() {
            RequirementCategory::Technical
        } else if !signal.product_matches.is_empty() {
            RequirementCategory::Product
        } else {
            RequirementCategory::Service
        };

        vec![RequirementCandidate {
            title: extract_title(text),
            description: text.to_string(),
            category,
            priority,
            confidence: DETECTION_CONFIDENCE,
            source: RequirementSource::Conversation,
        }]
    }
}

fn matches_in(keywords: &[String], normalized_text: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|keyword| normalized_text.contains(keyword.as_str()))
        .cloned()
        .collect()
}

fn extract_title(text: &str) -> String {
    let title: String = text.chars().take(TITLE_CHAR_LIMIT).collect();
    if title.chars().count() < text.chars().count() {
        format!("{title}...")
    } else {
        title
    }
}
