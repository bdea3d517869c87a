//! # Session Phases
//!
//! 引导冥想的固定线性阶段：idle → intro → breathing → guidance → complete。

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// 会话阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// 初始状态
    #[default]
    Idle,
    /// 开场
    Intro,
    /// 呼吸练习
    Breathing,
    /// 引导冥想
    Guidance,
    /// 已完成（终态）
    Complete,
}

impl Phase {
    /// 固定的阶段顺序
    pub const SEQUENCE: [Phase; 5] = [
        Phase::Idle,
        Phase::Intro,
        Phase::Breathing,
        Phase::Guidance,
        Phase::Complete,
    ];

    /// 下一个阶段；终态返回 None
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Intro),
            Phase::Intro => Some(Phase::Breathing),
            Phase::Breathing => Some(Phase::Guidance),
            Phase::Guidance => Some(Phase::Complete),
            Phase::Complete => None,
        }
    }

    /// 进入该阶段时是否追加脚本消息
    pub fn announces_on_entry(self) -> bool {
        matches!(self, Phase::Intro | Phase::Breathing | Phase::Guidance)
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Complete
    }

    /// "下一步"按钮的文案
    pub fn next_step_label(self) -> Option<&'static str> {
        match self {
            Phase::Idle => None,
            Phase::Intro => Some("Begin Breathing"),
            Phase::Breathing => Some("Continue Guidance"),
            Phase::Guidance => Some("Complete Session"),
            Phase::Complete => Some("View Results"),
        }
    }

    /// 存储中使用的名字
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Intro => "intro",
            Phase::Breathing => "breathing",
            Phase::Guidance => "guidance",
            Phase::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(Phase::Idle),
            "intro" => Ok(Phase::Intro),
            "breathing" => Ok(Phase::Breathing),
            "guidance" => Ok(Phase::Guidance),
            "complete" => Ok(Phase::Complete),
            other => Err(SessionError::UnknownPhase {
                name: other.to_string(),
            }),
        }
    }
}
