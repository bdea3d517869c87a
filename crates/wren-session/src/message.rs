//! # Chat Messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 引导者 Wren
    Assistant,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Assistant => write!(f, "assistant"),
            Role::User => write!(f, "user"),
        }
    }
}

/// 对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp,
        }
    }

    /// 创建引导者消息
    pub fn assistant(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, text, timestamp)
    }

    /// 创建用户消息
    pub fn user(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::User, text, timestamp)
    }
}
