//! # Storage Traits
//!
//! 定义键值存储后端的核心 trait。语义对齐浏览器的 local storage：
//! 同步读写、值是原始字符串、键在同一个存储源内共享。

use crate::error::StorageResult;

/// 键值存储 trait
///
/// 所有后端实现必须提供的基本操作。实现需要是 `Send + Sync`，
/// 以便多个 `LocalStore` 实例（相当于多个浏览器标签页）共享同一后端。
pub trait KeyValueStore: Send + Sync {
    /// 读取键对应的原始字符串，键不存在时返回 `None`
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// 写入（完整替换）
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// 删除键；键不存在不算错误
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// 列出所有键
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// 获取存储统计信息
    fn get_stats(&self) -> StorageResult<StorageStats>;

    /// 健康检查
    fn health_check(&self) -> StorageResult<()> {
        self.keys().map(|_| ())
    }
}

/// 存储统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// 键数量
    pub total_keys: u64,
    /// 已用大小（字节，键 + 值）
    pub storage_size_bytes: u64,
    /// 配额（字节），None 表示不限
    pub quota_bytes: Option<u64>,
}

/// 计算一组键值对占用的字节数
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
