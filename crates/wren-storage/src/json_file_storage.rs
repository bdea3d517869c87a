//! # JsonFileStorage Implementation
//!
//! 基于文件目录的键值后端，扮演"浏览器 profile 的 local storage"。
//!
//! 存储结构:
//! ```text
//! <base_path>/
//! ├── wren-streak.value            # 连续天数记录 (JSON)
//! ├── wren-stress.value            # 压力快照 (JSON)
//! ├── wren-session-state.value     # 会话阶段标记 (纯文本)
//! └── wren-current-session.value   # 进行中会话快照 (JSON)
//! ```
//!
//! 每个键一个文件，先写临时文件再 rename，保证读者看不到半截内容。

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::storage::{entry_size, KeyValueStore, StorageStats};

/// 值文件扩展名
const VALUE_EXTENSION: &str = "value";
/// 临时文件扩展名
const TEMP_EXTENSION: &str = "tmp";

/// JsonFileStorage 配置
#[derive(Debug, Clone)]
pub struct JsonFileStorageConfig {
    /// 存储根目录
    pub base_path: PathBuf,
    /// 配额（字节），None 表示不限
    pub quota_bytes: Option<u64>,
}

impl JsonFileStorageConfig {
    /// 创建默认配置，路径中的 `~` 会被展开
    pub fn new(base_path: impl AsRef<str>) -> Self {
        let expanded = shellexpand::tilde(base_path.as_ref()).into_owned();
        Self {
            base_path: PathBuf::from(expanded),
            quota_bytes: None,
        }
    }

    /// 使用已有路径（不做展开）
    pub fn from_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            quota_bytes: None,
        }
    }

    /// 设置配额
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }
}

impl Default for JsonFileStorageConfig {
    fn default() -> Self {
        Self::from_path(crate::default_storage_path())
    }
}

/// 文件目录键值存储
#[derive(Debug)]
pub struct JsonFileStorage {
    config: JsonFileStorageConfig,
    /// 本进程最后一次写入的内容（None 表示删除），用于过滤自身触发的文件事件
    last_written: Mutex<HashMap<String, Option<String>>>,
}

impl JsonFileStorage {
    /// 创建存储并确保目录存在
    pub fn new(config: JsonFileStorageConfig) -> StorageResult<Self> {
        fs::create_dir_all(&config.base_path)?;
        info!("JsonFileStorage initialized at {:?}", config.base_path);
        Ok(Self {
            config,
            last_written: Mutex::new(HashMap::new()),
        })
    }

    /// 存储根目录
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// 键对应的文件路径
    fn item_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self
            .config
            .base_path
            .join(format!("{}.{}", key, VALUE_EXTENSION)))
    }

    /// 从文件路径反推键名；不是值文件时返回 None
    pub fn key_for_path(&self, path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != VALUE_EXTENSION {
            return None;
        }
        let key = path.file_stem()?.to_str()?;
        validate_key(key).ok()?;
        Some(key.to_string())
    }

    /// 判断当前内容是否就是本进程最近一次写入的内容
    pub fn is_own_write(&self, key: &str, content: Option<&str>) -> bool {
        self.last_written
            .lock()
            .get(key)
            .map(|last| last.as_deref() == content)
            .unwrap_or(false)
    }

    fn used_bytes(&self) -> StorageResult<u64> {
        let mut used = 0;
        for key in self.keys()? {
            if let Some(value) = self.get_item(&key)? {
                used += entry_size(&key, &value);
            }
        }
        Ok(used)
    }
}

impl KeyValueStore for JsonFileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.item_path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.item_path(key)?;

        if let Some(limit) = self.config.quota_bytes {
            let replaced = self
                .get_item(key)?
                .map(|old| entry_size(key, &old))
                .unwrap_or(0);
            let used = self.used_bytes()? - replaced + entry_size(key, value);
            if used > limit {
                return Err(StorageError::QuotaExceeded { used, limit });
            }
        }

        // 每次写入独立的临时文件，多个进程同时写同一个键时互不覆盖
        let temp_path = self.config.base_path.join(format!(
            "{}.{}.{}",
            key,
            Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ));
        fs::write(&temp_path, value)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        self.last_written
            .lock()
            .insert(key.to_string(), Some(value.to_string()));
        debug!("Wrote {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let path = self.item_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.last_written.lock().insert(key.to_string(), None);
        debug!("Removed {}", key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.config.base_path)? {
            let path = entry?.path();
            if let Some(key) = self.key_for_path(&path) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn get_stats(&self) -> StorageResult<StorageStats> {
        Ok(StorageStats {
            total_keys: self.keys()?.len() as u64,
            storage_size_bytes: self.used_bytes()?,
            quota_bytes: self.config.quota_bytes,
        })
    }

    fn health_check(&self) -> StorageResult<()> {
        if !self.config.base_path.is_dir() {
            return Err(StorageError::unavailable(format!(
                "storage directory missing: {:?}",
                self.config.base_path
            )));
        }
        Ok(())
    }
}

/// 键名只允许字母、数字、`-`、`_`，避免路径穿越
fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey {
            key: key.to_string(),
        })
    }
}
