//! # Local Store
//!
//! 面向应用的持久化组件：连续天数、压力快照、进行中会话快照、
//! 会话阶段标记，以及跨实例变更订阅。
//!
//! 所有操作都是尽力而为：读取失败降级为默认值，写入失败只记录日志，
//! 并通过 [`Persistence`] 告诉调用者这次写入是否真正落盘。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::StorageResult;
use crate::events::{ChangeBus, ChangeSource, StorageChange, Subscription};
use crate::memory_storage::MemoryStorage;
use crate::storage::KeyValueStore;
use crate::streak::apply_completion;
use crate::types::{
    keys, Persistence, SessionSnapshot, StreakRecord, StressSnapshot, StressSnapshotUpdate,
    WriteOutcome,
};

/// 会话阶段标记的默认值
pub const DEFAULT_SESSION_FLAG: &str = "idle";

/// 本地存储实例，相当于一个浏览器标签页
#[derive(Clone)]
pub struct LocalStore {
    instance_id: String,
    backend: Arc<dyn KeyValueStore>,
    bus: Arc<ChangeBus>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("instance_id", &self.instance_id)
            .field("clock", &self.clock)
            .finish()
    }
}

impl LocalStore {
    /// 基于给定后端创建实例（系统时钟、独立的变更总线）
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            backend,
            bus: ChangeBus::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// 内存后端
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// 替换时钟
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 打开共享同一后端和变更总线的另一个实例（"另一个标签页"）
    pub fn open_sibling(&self) -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            backend: Arc::clone(&self.backend),
            bus: Arc::clone(&self.bus),
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn backend(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.backend)
    }

    pub fn change_bus(&self) -> Arc<ChangeBus> {
        Arc::clone(&self.bus)
    }

    // ========== 连续天数 ==========

    /// 读取连续天数记录；不存在或无法解析时返回零记录
    pub fn read_streak(&self) -> StreakRecord {
        self.read_json(keys::STREAK).unwrap_or_default()
    }

    /// 记录一次完成
    ///
    /// 同一天重复完成时返回原记录，持久化状态为 `Unchanged`。
    /// 写入失败时仍返回计算出的新记录，之后的 `read_streak` 不一定能读到它。
    pub fn record_completion(&self) -> WriteOutcome<StreakRecord> {
        let current = self.read_streak();
        let today = self.clock.today();

        match apply_completion(&current, today) {
            None => {
                debug!("Session already completed on {}, streak unchanged", today);
                WriteOutcome::new(current, Persistence::Unchanged)
            }
            Some(updated) => {
                let persistence = self.write_json(keys::STREAK, &updated);
                info!(
                    "Recorded completion on {}: streak {} -> {}, total {}",
                    today, current.count, updated.count, updated.total_sessions
                );
                WriteOutcome::new(updated, persistence)
            }
        }
    }

    // ========== 压力快照 ==========

    /// 读取压力快照；不存在或无法解析时返回 None
    pub fn read_stress_snapshot(&self) -> Option<StressSnapshot> {
        self.read_json(keys::STRESS)
    }

    /// 合并写入压力快照
    pub fn write_stress_snapshot(&self, update: StressSnapshotUpdate) -> WriteOutcome<StressSnapshot> {
        let current = self
            .read_stress_snapshot()
            .unwrap_or_else(|| StressSnapshot::new(self.clock.now()));
        let merged = current.merge(&update);
        let persistence = self.write_json(keys::STRESS, &merged);
        WriteOutcome::new(merged, persistence)
    }

    // ========== 进行中会话 ==========

    /// 读取进行中会话快照
    pub fn read_in_progress_session(&self) -> Option<SessionSnapshot> {
        self.read_json(keys::CURRENT_SESSION)
    }

    /// 写入（整体覆盖）进行中会话快照
    pub fn write_in_progress_session(&self, snapshot: &SessionSnapshot) -> Persistence {
        self.write_json(keys::CURRENT_SESSION, snapshot)
    }

    /// 删除进行中会话快照
    pub fn clear_in_progress_session(&self) -> Persistence {
        self.remove(keys::CURRENT_SESSION)
    }

    // ========== 会话阶段标记 ==========

    /// 读取会话阶段标记（纯文本），默认 "idle"
    pub fn read_session_flag(&self) -> String {
        match self.backend.get_item(keys::SESSION_STATE) {
            Ok(Some(value)) if !value.is_empty() => value,
            Ok(_) => DEFAULT_SESSION_FLAG.to_string(),
            Err(e) => {
                warn!("Failed to load session state: {}", e);
                DEFAULT_SESSION_FLAG.to_string()
            }
        }
    }

    /// 写入会话阶段标记
    pub fn write_session_flag(&self, phase: &str) -> Persistence {
        self.write_raw(keys::SESSION_STATE, phase)
    }

    // ========== 全部清理 ==========

    /// 删除本组件拥有的所有键（用于完全重置，不在正常流程中调用）
    pub fn clear_all(&self) -> Persistence {
        let owned: Vec<String> = match self.backend.keys() {
            Ok(all) => all
                .into_iter()
                .filter(|key| key.starts_with(keys::PREFIX))
                .collect(),
            Err(e) => {
                warn!("Failed to list keys, clearing known keys only: {}", e);
                keys::ALL.iter().map(|k| k.to_string()).collect()
            }
        };

        let mut result = Persistence::Persisted;
        for key in owned {
            if let failed @ Persistence::InMemoryOnly { .. } = self.remove(&key) {
                result = failed;
            }
        }
        info!("Cleared all wren data");
        result
    }

    // ========== 变更订阅 ==========

    /// 订阅其他实例（或其他进程）对 `wren-` 键的修改
    ///
    /// 只在新值存在且能解析为 JSON 时回调；本实例自己的写入不会触发回调。
    pub fn subscribe_to_external_changes<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str, serde_json::Value) + Send + Sync + 'static,
    {
        self.bus.subscribe(self.instance_id.clone(), move |change| {
            if !change.key.starts_with(keys::PREFIX) {
                return;
            }
            let Some(raw) = change.new_value.as_deref() else {
                return;
            };
            match serde_json::from_str(raw) {
                Ok(value) => callback(&change.key, value),
                Err(e) => warn!("Failed to parse storage change for {}: {}", change.key, e),
            }
        })
    }

    // ========== 内部工具 ==========

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to load {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to parse {}: {}", key, e);
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Persistence {
        match serde_json::to_string(value) {
            Ok(raw) => self.write_raw(key, &raw),
            Err(e) => {
                warn!("Failed to serialize {}: {}", key, e);
                Persistence::InMemoryOnly {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn write_raw(&self, key: &str, raw: &str) -> Persistence {
        let result = self.backend.set_item(key, raw);
        self.finish_write(key, Some(raw), result)
    }

    fn remove(&self, key: &str) -> Persistence {
        let result = self.backend.remove_item(key);
        self.finish_write(key, None, result)
    }

    fn finish_write(
        &self,
        key: &str,
        new_value: Option<&str>,
        result: StorageResult<()>,
    ) -> Persistence {
        match result {
            Ok(()) => {
                self.bus.publish(&StorageChange {
                    key: key.to_string(),
                    new_value: new_value.map(str::to_string),
                    source: ChangeSource::Store(self.instance_id.clone()),
                });
                Persistence::Persisted
            }
            Err(e) => {
                warn!("Failed to save {}: {}", key, e);
                Persistence::InMemoryOnly {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, NaiveDate};
    use parking_lot::Mutex;

    fn store_at(clock: &Arc<FixedClock>) -> LocalStore {
        LocalStore::in_memory().with_clock(Arc::clone(clock) as Arc<dyn Clock>)
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_fresh_storage_reads_zero_record() {
        let store = LocalStore::in_memory();
        assert_eq!(
            store.read_streak(),
            StreakRecord {
                count: 0,
                last_completed_date: None,
                total_sessions: 0
            }
        );
    }

    #[test]
    fn test_streak_scenario() {
        let clock = Arc::new(FixedClock::on_date(2024, 1, 1));
        let store = store_at(&clock);

        let first = store.record_completion();
        assert_eq!(first.persistence, Persistence::Persisted);
        assert_eq!(
            first.value,
            StreakRecord {
                count: 1,
                last_completed_date: date(2024, 1, 1),
                total_sessions: 1
            }
        );

        clock.advance_days(1);
        let second = store.record_completion().into_value();
        assert_eq!(
            second,
            StreakRecord {
                count: 2,
                last_completed_date: date(2024, 1, 2),
                total_sessions: 2
            }
        );

        clock.advance_days(2);
        let third = store.record_completion().into_value();
        assert_eq!(
            third,
            StreakRecord {
                count: 1,
                last_completed_date: date(2024, 1, 4),
                total_sessions: 3
            }
        );
        assert_eq!(store.read_streak(), third);
    }

    #[test]
    fn test_same_day_completion_is_idempotent() {
        let clock = Arc::new(FixedClock::at(2024, 1, 1, 8, 0));
        let store = store_at(&clock);

        let first = store.record_completion().into_value();
        clock.advance(Duration::hours(10));
        let second = store.record_completion();

        assert_eq!(second.persistence, Persistence::Unchanged);
        assert_eq!(second.value, first);
        assert_eq!(store.read_streak(), first);
    }

    #[test]
    fn test_midnight_counts_as_new_day() {
        let clock = Arc::new(FixedClock::at(2024, 1, 1, 23, 59));
        let store = store_at(&clock);
        store.record_completion();

        clock.advance(Duration::minutes(2));
        let record = store.record_completion().into_value();
        assert_eq!(record.count, 2);
        assert_eq!(record.total_sessions, 2);
    }

    #[test]
    fn test_almost_two_days_elapsed_still_consecutive() {
        // 00:01 到次日 23:59，经过将近 48 小时，但日历上只差一天
        let clock = Arc::new(FixedClock::at(2024, 1, 1, 0, 1));
        let store = store_at(&clock);
        store.record_completion();

        clock.advance(Duration::hours(47) + Duration::minutes(58));
        assert_eq!(store.record_completion().value.count, 2);
    }

    #[test]
    fn test_malformed_streak_degrades_to_zero() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_item(keys::STREAK, "{not json").unwrap();
        let store = LocalStore::new(backend.clone());
        assert_eq!(store.read_streak(), StreakRecord::zero());

        backend.set_item(keys::STREAK, r#"{"count": -3}"#).unwrap();
        assert_eq!(store.read_streak(), StreakRecord::zero());
    }

    #[test]
    fn test_write_failure_returns_in_memory_record() {
        let backend = Arc::new(MemoryStorage::new());
        let store = LocalStore::new(backend.clone());
        backend.set_disabled(true);

        let outcome = store.record_completion();
        assert!(!outcome.is_durable());
        assert_eq!(outcome.value.count, 1);
        assert_eq!(outcome.value.total_sessions, 1);

        backend.set_disabled(false);
        assert_eq!(store.read_streak(), StreakRecord::zero());
    }

    #[test]
    fn test_quota_exceeded_is_swallowed() {
        let store = LocalStore::new(Arc::new(MemoryStorage::new().with_quota(8)));
        let outcome = store.write_stress_snapshot(StressSnapshotUpdate::pre(4));
        assert!(matches!(
            outcome.persistence,
            Persistence::InMemoryOnly { .. }
        ));
        assert_eq!(outcome.value.pre, Some(4));
        assert_eq!(store.read_stress_snapshot(), None);
    }

    #[test]
    fn test_stress_snapshot_partial_updates_merge() {
        let clock = Arc::new(FixedClock::on_date(2024, 5, 1));
        let store = store_at(&clock);

        let first = store.write_stress_snapshot(StressSnapshotUpdate::pre(4)).into_value();
        clock.advance(Duration::hours(1));
        store.write_stress_snapshot(StressSnapshotUpdate::post(2));

        let snapshot = store.read_stress_snapshot().unwrap();
        assert_eq!(snapshot.pre, Some(4));
        assert_eq!(snapshot.post, Some(2));
        assert_eq!(snapshot.session_date, first.session_date);
    }

    #[test]
    fn test_in_progress_session_roundtrip_and_clear() {
        let store = LocalStore::in_memory();
        assert_eq!(store.read_in_progress_session(), None);

        let snapshot = SessionSnapshot {
            stress_pre: Some(3),
            duration: Some(0),
            ..SessionSnapshot::default()
        };
        assert_eq!(store.write_in_progress_session(&snapshot), Persistence::Persisted);
        assert_eq!(store.read_in_progress_session(), Some(snapshot));

        store.clear_in_progress_session();
        assert_eq!(store.read_in_progress_session(), None);
    }

    #[test]
    fn test_session_flag_defaults_to_idle() {
        let store = LocalStore::in_memory();
        assert_eq!(store.read_session_flag(), "idle");
        store.write_session_flag("guidance");
        assert_eq!(store.read_session_flag(), "guidance");
    }

    #[test]
    fn test_clear_all_removes_owned_keys_only() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_item("other-app", "keep").unwrap();
        let store = LocalStore::new(backend.clone());

        store.record_completion();
        store.write_stress_snapshot(StressSnapshotUpdate::pre(2));
        store.write_session_flag("intro");
        store.write_in_progress_session(&SessionSnapshot::default());

        assert_eq!(store.clear_all(), Persistence::Persisted);
        assert_eq!(backend.keys().unwrap(), vec!["other-app"]);
        assert_eq!(store.read_streak(), StreakRecord::zero());
    }

    #[test]
    fn test_external_change_subscription() {
        let tab_a = LocalStore::in_memory();
        let tab_b = tab_a.open_sibling();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let subscription = tab_a.subscribe_to_external_changes(move |key, value| {
            sink.lock().push((key.to_string(), value));
        });

        // 自己的写入不通知自己
        tab_a.record_completion();
        assert!(seen.lock().is_empty());

        // 另一个标签页的写入会通知
        tab_b.write_stress_snapshot(StressSnapshotUpdate::pre(5));
        // 纯文本值无法解析为 JSON，被忽略
        tab_b.write_session_flag("breathing");
        // 删除没有新值，被忽略
        tab_b.clear_in_progress_session();

        {
            let seen = seen.lock();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].0, keys::STRESS);
            assert_eq!(seen[0].1["pre"], 5);
        }

        subscription.unsubscribe();
        tab_b.write_stress_snapshot(StressSnapshotUpdate::post(1));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_sibling_sees_shared_streak() {
        let tab_a = LocalStore::in_memory();
        let tab_b = tab_a.open_sibling();
        tab_a.record_completion();
        assert_eq!(tab_b.read_streak().total_sessions, 1);
        assert_ne!(tab_a.instance_id(), tab_b.instance_id());
    }

    #[test]
    fn test_write_path_independent_of_subscribers() {
        let store = LocalStore::in_memory();
        assert_eq!(store.change_bus().subscriber_count(), 0);
        assert!(store.record_completion().is_durable());
    }
}
