use async_trait::async_trait;
use convoy_core::HistoryTurn;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Neutral,
    Negative,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Neutral => "neutral",
            Polarity::Negative => "negative",
        }
    }
}

/// Customer mood read from one message. `score` runs from 0 (hostile) to 1
/// (delighted) with 0.5 neutral; `confidence` is how sure the detector is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub polarity: Polarity,
    pub score: f64,
    pub confidence: f64,
}

/// Whether a message reads as a service problem report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemIntent {
    pub is_problem: bool,
    pub title: Option<String>,
    pub intent: Option<String>,
    pub confidence: f64,
}

/// Whether a message confirms or denies that an earlier problem went away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSignal {
    pub resolved: bool,
    pub reopened: bool,
    pub confidence: f64,
    pub reasoning: String,
}

/// Conversation understanding consumed by the reply pipeline and the problem
/// lifecycle. Implementations always answer; richer backends degrade to
/// heuristics internally instead of failing the caller.
#[async_trait]
pub trait InsightService: Send + Sync {
    async fn analyze_sentiment(&self, message: &str, history: &[HistoryTurn]) -> Sentiment;

    async fn detect_problem_intent(&self, message: &str, history: &[HistoryTurn])
        -> ProblemIntent;

    async fn detect_problem_resolution(
        &self,
        message: &str,
        history: &[HistoryTurn],
    ) -> ResolutionSignal;
}

/// Deterministic keyword heuristics. Serves both as the default production
/// implementation and as the tier richer services fall back to.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordInsight;

impl KeywordInsight {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InsightService for KeywordInsight {
    async fn analyze_sentiment(&self, message: &str, _history: &[HistoryTurn]) -> Sentiment {
        sentiment_of(message)
    }

    async fn detect_problem_intent(
        &self,
        message: &str,
        _history: &[HistoryTurn],
    ) -> ProblemIntent {
        problem_intent_of(message)
    }

    async fn detect_problem_resolution(
        &self,
        message: &str,
        _history: &[HistoryTurn],
    ) -> ResolutionSignal {
        resolution_of(message)
    }
}

const NEGATIVE_MARKERS: &[&str] = &[
    "不行", "投诉", "差", "退款", "bug", "错误", "失败", "无法", "不能", "不满", "糟糕", "愤怒",
];

const POSITIVE_MARKERS: &[&str] =
    &["感谢", "满意", "好", "解决了", "谢谢", "完美", "优秀", "赞", "棒"];

const PROBLEM_MARKERS: &[&str] = &[
    "报错", "错误", "异常", "崩溃", "无法", "失败", "卡顿", "白屏", "投诉", "不满意", "退款", "bug",
];

const KEYWORD_CONFIDENCE: f64 = 0.6;
const PROBLEM_TITLE_CHAR_LIMIT: usize = 20;

fn sentiment_of(message: &str) -> Sentiment {
    if message.trim().is_empty() {
        return Sentiment { polarity: Polarity::Neutral, score: 0.5, confidence: 0.5 };
    }

    // "问题解决了" reads positive even though 问题 phrasing usually flags
    // trouble.
    if mentions_problem_solved(message) {
        return Sentiment {
            polarity: Polarity::Positive,
            score: 0.8,
            confidence: KEYWORD_CONFIDENCE,
        };
    }

    let normalized = message.to_lowercase();
    let negative_hits = count_markers(&normalized, NEGATIVE_MARKERS);
    let positive_hits = count_markers(&normalized, POSITIVE_MARKERS);

    if negative_hits > positive_hits {
        Sentiment {
            polarity: Polarity::Negative,
            score: (0.5 - negative_hits as f64 * 0.1).max(0.1),
            confidence: KEYWORD_CONFIDENCE,
        }
    } else if positive_hits > negative_hits {
        Sentiment {
            polarity: Polarity::Positive,
            score: (0.5 + positive_hits as f64 * 0.1).min(0.95),
            confidence: KEYWORD_CONFIDENCE,
        }
    } else {
        Sentiment { polarity: Polarity::Neutral, score: 0.5, confidence: KEYWORD_CONFIDENCE }
    }
}

fn problem_intent_of(message: &str) -> ProblemIntent {
    let hit = PROBLEM_MARKERS.iter().any(|marker| message.contains(marker));
    if hit {
        ProblemIntent {
            is_problem: true,
            title: Some(message.chars().take(PROBLEM_TITLE_CHAR_LIMIT).collect()),
            intent: Some("inquiry".to_string()),
            confidence: 0.5,
        }
    } else {
        ProblemIntent { is_problem: false, title: None, intent: None, confidence: 0.2 }
    }
}

fn resolution_of(message: &str) -> ResolutionSignal {
    // Reopening phrasings win: "问题还是没解决" also contains a 问题…解决
    // window and must not count as resolved.
    if mentions_reopening(message) {
        return ResolutionSignal {
            resolved: false,
            reopened: true,
            confidence: 0.7,
            reasoning: "关键词命中：未解决/仍然异常".to_string(),
        };
    }
    if mentions_resolution(message) {
        return ResolutionSignal {
            resolved: true,
            reopened: false,
            confidence: 0.7,
            reasoning: "关键词命中：已解决/已修复".to_string(),
        };
    }
    ResolutionSignal {
        resolved: false,
        reopened: false,
        confidence: 0.3,
        reasoning: "未识别到明确结论".to_string(),
    }
}

fn mentions_problem_solved(message: &str) -> bool {
    contains_in_order(message, "问题", "解决")
        || contains_in_order(message, "解决", "问题")
        || contains_in_order(message, "已", "解决")
}

fn mentions_resolution(message: &str) -> bool {
    mentions_problem_solved(message)
        || contains_in_order(message, "感谢", "解决")
        || message.contains("已恢复")
        || message.contains("已修复")
}

fn mentions_reopening(message: &str) -> bool {
    message.contains("没解决")
        || message.contains("未解决")
        || contains_in_order(message, "还是", "问题")
        || ["报错", "错误", "异常"]
            .iter()
            .any(|marker| contains_in_order(message, "仍然", marker))
        || ["失败", "无法"]
            .iter()
            .any(|marker| contains_in_order(message, "依旧", marker))
}

fn count_markers(text: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|marker| text.contains(*marker)).count()
}

fn contains_in_order(text: &str, first: &str, second: &str) -> bool {
    match text.find(first) {
        Some(index) => text[index + first.len()..].contains(second),
        None => false,
    }
}
