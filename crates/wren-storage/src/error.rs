//! # Storage Error Types
//!
//! 定义本地存储相关的错误类型。
//!
//! 这些错误只在后端层（`KeyValueStore`）传播；`LocalStore` 会把它们
//! 记录到日志并降级为默认值或 [`crate::Persistence::InMemoryOnly`]。

use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 存储已满
    #[error("Storage quota exceeded: {used}/{limit}")]
    QuotaExceeded { used: u64, limit: u64 },

    /// 存储不可用（被禁用、隐私模式等）
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    /// 非法的键名
    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },

    /// 文件监听错误
    #[cfg(feature = "watch")]
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl StorageError {
    /// 创建不可用错误
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// 存储结果类型
pub type StorageResult<T> = Result<T, StorageError>;
