//! # Session Error Types

use thiserror::Error;

/// 会话错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 压力读数超出量表范围
    #[error("Stress level {level} out of range {min}..={max}")]
    StressOutOfRange { level: i32, min: i32, max: i32 },

    /// 无法识别的阶段名
    #[error("Unknown session phase: {name}")]
    UnknownPhase { name: String },
}

/// 会话结果类型
pub type SessionResult<T> = Result<T, SessionError>;
