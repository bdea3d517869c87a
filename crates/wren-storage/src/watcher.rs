//! # Storage Watcher
//!
//! 监听 [`JsonFileStorage`] 目录，把其他进程写入的变更发布到 [`ChangeBus`]，
//! 对应浏览器里"另一个窗口修改了 local storage"。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::StorageResult;
use crate::events::{ChangeBus, ChangeSource, StorageChange};
use crate::json_file_storage::JsonFileStorage;
use crate::storage::KeyValueStore;

/// 目录监听器，drop 时停止监听
pub struct StorageWatcher {
    path: PathBuf,
    watcher: RecommendedWatcher,
}

impl std::fmt::Debug for StorageWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageWatcher").field("path", &self.path).finish()
    }
}

impl StorageWatcher {
    /// 开始监听
    pub fn start(storage: Arc<JsonFileStorage>, bus: Arc<ChangeBus>) -> StorageResult<Self> {
        let path = storage.base_path().to_path_buf();
        // 同一内容的重复文件事件只发布一次
        let last_published: Mutex<HashMap<String, Option<String>>> = Mutex::new(HashMap::new());

        let handler_storage = Arc::clone(&storage);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove())
                    {
                        return;
                    }
                    for changed in &event.paths {
                        let Some(key) = handler_storage.key_for_path(changed) else {
                            continue;
                        };
                        let new_value = match handler_storage.get_item(&key) {
                            Ok(value) => value,
                            Err(e) => {
                                warn!("Failed to read changed key {}: {}", key, e);
                                continue;
                            }
                        };
                        if handler_storage.is_own_write(&key, new_value.as_deref()) {
                            continue;
                        }
                        {
                            let mut last = last_published.lock();
                            if last.get(&key) == Some(&new_value) {
                                continue;
                            }
                            last.insert(key.clone(), new_value.clone());
                        }

                        debug!("External change detected for {}", key);
                        bus.publish(&StorageChange {
                            key,
                            new_value,
                            source: ChangeSource::External,
                        });
                    }
                }
                Err(e) => warn!("Storage watch error: {}", e),
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        info!("Started watching storage directory: {:?}", path);
        Ok(Self { path, watcher })
    }

    /// 停止监听
    pub fn stop(mut self) -> StorageResult<()> {
        self.watcher.unwatch(&self.path)?;
        info!("Stopped watching storage directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_file_storage::JsonFileStorageConfig;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_external_process_write_is_published() {
        let temp_dir = TempDir::new().unwrap();
        let ours = Arc::new(
            JsonFileStorage::new(JsonFileStorageConfig::from_path(temp_dir.path())).unwrap(),
        );
        let theirs =
            JsonFileStorage::new(JsonFileStorageConfig::from_path(temp_dir.path())).unwrap();

        let bus = ChangeBus::new();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let _sub = bus.subscribe("observer", move |change| {
            let _ = tx.lock().send(change.clone());
        });

        let watcher = StorageWatcher::start(Arc::clone(&ours), Arc::clone(&bus)).unwrap();
        theirs.set_item("wren-streak", r#"{"count":7}"#).unwrap();

        let change = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(change.key, "wren-streak");
        assert_eq!(change.new_value.as_deref(), Some(r#"{"count":7}"#));
        assert_eq!(change.source, ChangeSource::External);

        watcher.stop().unwrap();
    }
}
