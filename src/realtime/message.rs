use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message kinds pushed by the notification server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Error,
    SystemNotice,
    Chat,
    ForceLogout,
    Remind,
    Other(String),
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ERROR" => MessageType::Error,
            "SYSTEM_NOTICE" => MessageType::SystemNotice,
            "CHAT" => MessageType::Chat,
            "FORCE_LOGOUT" => MessageType::ForceLogout,
            "REMIND" => MessageType::Remind,
            _ => MessageType::Other(value),
        }
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Error => "ERROR".to_string(),
            MessageType::SystemNotice => "SYSTEM_NOTICE".to_string(),
            MessageType::Chat => "CHAT".to_string(),
            MessageType::ForceLogout => "FORCE_LOGOUT".to_string(),
            MessageType::Remind => "REMIND".to_string(),
            MessageType::Other(other) => other,
        }
    }
}

/// Frame envelope: `{ module, type, code, data, timestamp }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(default)]
    pub module: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub data: Value,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
}

impl WsMessage {
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// The payload as a structured system notice, if it has that shape
    pub fn system_notice(&self) -> Option<SystemNotice> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotice {
    pub id: String,
    pub title: String,
    pub content: String,
    pub level: NoticeLevel,
    pub create_time: Option<String>,
}

/// Subscription the frame arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Broadcast topic for system notices
    Public,
    /// Per-user queue
    User,
}
