use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeEntryId(pub String);

impl KnowledgeEntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Knowledge-base article surfaced to the reply pipeline by keyword match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: KnowledgeEntryId,
    pub title: String,
    pub content: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: KnowledgeEntryId::generate(),
            title: title.into(),
            content: content.into(),
            url: url.into(),
            tags,
            created_at: now,
            updated_at: now,
        }
    }

    /// Naive containment match used by the lookup contract: any term hitting
    /// the title or a tag counts.
    pub fn matches_any(&self, terms: &[&str]) -> bool {
        terms.iter().any(|term| {
            !term.is_empty()
                && (self.title.contains(term) || self.tags.iter().any(|tag| tag.contains(term)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::KnowledgeEntry;

    #[test]
    fn matches_on_title_or_tag_containment() {
        let entry = KnowledgeEntry::new(
            "登录问题排查指南",
            "常见登录故障的排查步骤",
            "https://kb.example.com/login",
            vec!["登录".to_string(), "账号".to_string()],
        );

        assert!(entry.matches_any(&["登录"]));
        assert!(entry.matches_any(&["账号"]));
        assert!(!entry.matches_any(&["计费"]));
        assert!(!entry.matches_any(&[""]));
    }
}
