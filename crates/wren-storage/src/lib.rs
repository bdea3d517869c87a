//! # Wren Storage
//!
//! Wren 冥想应用的本地持久化组件。
//!
//! ## 功能特性
//!
//! - **连续天数**：按本地日历日期累计连续完成天数和总完成次数
//! - **压力快照**：会前/会后压力读数，部分更新自动合并
//! - **进行中会话快照**：会话中途刷新或重启后可恢复
//! - **尽力而为的写入**：写入失败不抛出，通过 [`Persistence`] 区分是否落盘
//! - **跨实例通知**：共享后端的其他实例（或其他进程）修改数据时回调
//!
//! ## 存储键
//!
//! ```text
//! wren-streak            {count, lastCompletedDate, totalSessions}
//! wren-stress            {pre, post, sessionDate}
//! wren-session-state     idle | intro | breathing | guidance | complete
//! wren-current-session   {stressPre?, stressPost?, duration?, completedAt?, startedAt?, phase?}
//! ```
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wren_storage::{JsonFileStorage, JsonFileStorageConfig, LocalStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = JsonFileStorage::new(JsonFileStorageConfig::new("~/.wren/storage"))?;
//!     let store = LocalStore::new(Arc::new(storage));
//!
//!     let outcome = store.record_completion();
//!     println!("streak: {} day(s)", outcome.value.count);
//!     if !outcome.is_durable() {
//!         eprintln!("streak was not saved");
//!     }
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod error;
pub mod events;
pub mod json_file_storage;
pub mod local_store;
pub mod memory_storage;
pub mod storage;
pub mod streak;
pub mod types;
#[cfg(feature = "watch")]
pub mod watcher;

// 重新导出主要类型
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{StorageError, StorageResult};
pub use events::{ChangeBus, ChangeSource, StorageChange, Subscription};
pub use json_file_storage::{JsonFileStorage, JsonFileStorageConfig};
pub use local_store::{LocalStore, DEFAULT_SESSION_FLAG};
pub use memory_storage::MemoryStorage;
pub use storage::{KeyValueStore, StorageStats};
pub use streak::apply_completion;
pub use types::{
    keys, Persistence, SessionSnapshot, StreakRecord, StreakTier, StressSnapshot,
    StressSnapshotUpdate, WriteOutcome,
};
#[cfg(feature = "watch")]
pub use watcher::StorageWatcher;

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 创建默认存储路径
pub fn default_storage_path() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".wren").join("storage"))
        .unwrap_or_else(|| std::path::PathBuf::from("./wren_storage"))
}
