//! # MemoryStorage Implementation
//!
//! 基于内存 HashMap 的键值后端。用于测试和嵌入场景，
//! 支持配额和禁用开关，以便模拟 quota exceeded / storage disabled。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::storage::{entry_size, KeyValueStore, StorageStats};

/// 内存键值存储
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
    /// 配额（字节），None 表示不限
    quota_bytes: Option<u64>,
    /// 禁用后所有操作返回 Unavailable
    disabled: AtomicBool,
}

impl MemoryStorage {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置配额
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// 启用或禁用存储
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
        debug!("MemoryStorage disabled = {}", disabled);
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("memory storage is disabled"));
        }
        Ok(())
    }

    fn used_bytes(entries: &HashMap<String, String>) -> u64 {
        entries.iter().map(|(k, v)| entry_size(k, v)).sum()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.ensure_available()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.ensure_available()?;
        let mut entries = self.entries.write();

        if let Some(limit) = self.quota_bytes {
            let replaced = entries.get(key).map(|old| entry_size(key, old)).unwrap_or(0);
            let used = Self::used_bytes(&entries) - replaced + entry_size(key, value);
            if used > limit {
                return Err(StorageError::QuotaExceeded { used, limit });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.ensure_available()?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.ensure_available()?;
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn get_stats(&self) -> StorageResult<StorageStats> {
        self.ensure_available()?;
        let entries = self.entries.read();
        Ok(StorageStats {
            total_keys: entries.len() as u64,
            storage_size_bytes: Self::used_bytes(&entries),
            quota_bytes: self.quota_bytes,
        })
    }
}
