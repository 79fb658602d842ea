use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Feishu,
    Wecom,
    Dingtalk,
    Internal,
}

impl Channel {
    /// IM integrations keep their threads forever; the platform never lets
    /// us close them.
    pub fn is_im(&self) -> bool {
        matches!(self, Channel::Feishu | Channel::Wecom | Channel::Dingtalk)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::Feishu => "feishu",
            Channel::Wecom => "wecom",
            Channel::Dingtalk => "dingtalk",
            Channel::Internal => "internal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Auto,
    Supervised,
    HumanFirst,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Auto => "auto",
            AgentMode::Supervised => "supervised",
            AgentMode::HumanFirst => "human_first",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Customer,
    Agent,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: String,
    pub sender: SenderKind,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn customer(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            sender: SenderKind::Customer,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            sender_id: "system".to_string(),
            sender: SenderKind::System,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }
}

/// One dialogue turn as the reply collaborators see it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub customer_id: String,
    pub channel: Channel,
    pub status: ConversationStatus,
    pub mode: AgentMode,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn open(customer_id: impl Into<String>, channel: Channel, first_message: Message) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::generate(),
            customer_id: customer_id.into(),
            channel,
            status: ConversationStatus::Open,
            mode: AgentMode::Supervised,
            messages: vec![first_message],
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ConversationStatus::Open
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn set_mode(&mut self, mode: AgentMode) {
        self.mode = mode;
        self.updated_at = Utc::now();
    }

    /// Closing is forbidden on IM channels and on already-closed threads.
    pub fn close(&mut self) -> Result<(), DomainError> {
        if self.channel.is_im() {
            return Err(DomainError::ImChannelClose { channel: self.channel });
        }
        if self.status == ConversationStatus::Closed {
            return Err(DomainError::InvariantViolation(format!(
                "conversation {} is already closed",
                self.id.0
            )));
        }
        self.status = ConversationStatus::Closed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Dialogue as role/content turns; customer messages keep their role,
    /// everything else reads as the agent side.
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.messages
            .iter()
            .map(|message| HistoryTurn {
                role: match message.sender {
                    SenderKind::Customer => "customer".to_string(),
                    SenderKind::Agent | SenderKind::System => "agent".to_string(),
                },
                content: message.content.clone(),
            })
            .collect()
    }
}
