//! # Wren Storage Types
//!
//! 持久化记录的数据结构，以及写入结果的"是否真正落盘"区分。
//! 字段名按存储中的 JSON 形状序列化（camelCase）。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 存储键
pub mod keys {
    /// 本组件拥有的所有键的前缀
    pub const PREFIX: &str = "wren-";
    /// 连续天数记录
    pub const STREAK: &str = "wren-streak";
    /// 压力快照
    pub const STRESS: &str = "wren-stress";
    /// 会话阶段标记（纯文本）
    pub const SESSION_STATE: &str = "wren-session-state";
    /// 进行中会话快照
    pub const CURRENT_SESSION: &str = "wren-current-session";

    /// 全部已知键
    pub const ALL: [&str; 4] = [STREAK, STRESS, SESSION_STATE, CURRENT_SESSION];
}

/// 连续天数记录
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakRecord {
    /// 连续完成天数
    pub count: u32,
    /// 最近一次完成的日历日期（YYYY-MM-DD）
    pub last_completed_date: Option<NaiveDate>,
    /// 累计完成次数
    pub total_sessions: u32,
}

impl StreakRecord {
    /// 零记录
    pub fn zero() -> Self {
        Self::default()
    }

    /// 当前连续天数对应的等级
    pub fn tier(&self) -> StreakTier {
        StreakTier::for_count(self.count)
    }
}

/// 连续天数等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTier {
    /// 0-2 天
    Starting,
    /// 3-6 天
    Building,
    /// 7-13 天
    Committed,
    /// 14-29 天
    Master,
    /// 30 天以上
    Legendary,
}

impl StreakTier {
    /// 根据连续天数计算等级
    pub fn for_count(count: u32) -> Self {
        match count {
            30.. => StreakTier::Legendary,
            14..=29 => StreakTier::Master,
            7..=13 => StreakTier::Committed,
            3..=6 => StreakTier::Building,
            _ => StreakTier::Starting,
        }
    }
}

impl std::fmt::Display for StreakTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreakTier::Starting => write!(f, "starting"),
            StreakTier::Building => write!(f, "building"),
            StreakTier::Committed => write!(f, "committed"),
            StreakTier::Master => write!(f, "master"),
            StreakTier::Legendary => write!(f, "legendary"),
        }
    }
}

/// 压力快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressSnapshot {
    pub pre: Option<i32>,
    pub post: Option<i32>,
    pub session_date: DateTime<Utc>,
}

impl StressSnapshot {
    /// 创建空快照
    pub fn new(session_date: DateTime<Utc>) -> Self {
        Self {
            pre: None,
            post: None,
            session_date,
        }
    }

    /// 把部分更新合并进来：给出的字段覆盖，没给的保留
    pub fn merge(mut self, update: &StressSnapshotUpdate) -> Self {
        if let Some(pre) = update.pre {
            self.pre = Some(pre);
        }
        if let Some(post) = update.post {
            self.post = Some(post);
        }
        if let Some(date) = update.session_date {
            self.session_date = date;
        }
        self
    }
}

/// 压力快照的部分更新
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StressSnapshotUpdate {
    pub pre: Option<i32>,
    pub post: Option<i32>,
    pub session_date: Option<DateTime<Utc>>,
}

impl StressSnapshotUpdate {
    /// 只更新会前读数
    pub fn pre(level: i32) -> Self {
        Self {
            pre: Some(level),
            ..Self::default()
        }
    }

    /// 只更新会后读数
    pub fn post(level: i32) -> Self {
        Self {
            post: Some(level),
            ..Self::default()
        }
    }

    /// 设置会话日期
    pub fn with_session_date(mut self, date: DateTime<Utc>) -> Self {
        self.session_date = Some(date);
        self
    }
}

/// 进行中会话快照，仅用于刷新/重启后恢复
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress_pre: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress_post: Option<i32>,
    /// 已进行的秒数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// 阶段名（idle / intro / breathing / guidance / complete）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// 写入的持久化状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    /// 已写入后端
    Persisted,
    /// 无需写入（值未变化）
    Unchanged,
    /// 只在内存中生效，后端写入失败
    InMemoryOnly { reason: String },
}

impl Persistence {
    /// 后端状态与返回值一致
    pub fn is_durable(&self) -> bool {
        !matches!(self, Persistence::InMemoryOnly { .. })
    }
}

/// 带持久化状态的写入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome<T> {
    /// 内存中计算出的值（无论是否落盘都有效）
    pub value: T,
    pub persistence: Persistence,
}

impl<T> WriteOutcome<T> {
    pub fn new(value: T, persistence: Persistence) -> Self {
        Self { value, persistence }
    }

    pub fn is_durable(&self) -> bool {
        self.persistence.is_durable()
    }

    /// 取出值，丢弃持久化状态
    pub fn into_value(self) -> T {
        self.value
    }
}
