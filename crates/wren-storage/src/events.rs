//! # Change Events
//!
//! 存储变更通知，对应浏览器的跨标签页 `storage` 事件：
//! 一个实例的写入只通知 *其他* 实例的订阅者。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::debug;

/// 变更来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSource {
    /// 同进程内的某个存储实例
    Store(String),
    /// 其他进程（由文件监听器发现）
    External,
}

/// 一次存储变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// 新值，None 表示被删除
    pub new_value: Option<String>,
    pub source: ChangeSource,
}

type ChangeCallback = Arc<dyn Fn(&StorageChange) + Send + Sync>;

struct Subscriber {
    /// 订阅者所属的存储实例，来自同一实例的变更不会投递
    owner: String,
    callback: ChangeCallback,
}

/// 变更总线，被共享同一后端的所有存储实例共用
#[derive(Default)]
pub struct ChangeBus {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl ChangeBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注册订阅；返回的句柄被 drop 或调用 `unsubscribe` 时注销
    pub fn subscribe<F>(self: &Arc<Self>, owner: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&StorageChange) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                owner: owner.into(),
                callback: Arc::new(callback),
            },
        );
        debug!("Registered storage subscriber {}", id);
        Subscription {
            id,
            bus: Arc::downgrade(self),
        }
    }

    /// 发布变更
    ///
    /// 回调在锁外调用，回调内部可以安全地订阅或注销。
    pub fn publish(&self, change: &StorageChange) {
        let callbacks: Vec<ChangeCallback> = self
            .subscribers
            .iter()
            .filter(|entry| match &change.source {
                ChangeSource::Store(origin) => *origin != entry.value().owner,
                ChangeSource::External => true,
            })
            .map(|entry| Arc::clone(&entry.value().callback))
            .collect();

        for callback in callbacks {
            callback(change);
        }
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn remove(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            debug!("Removed storage subscriber {}", id);
        }
    }
}

/// 订阅句柄
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<ChangeBus>,
}

impl Subscription {
    /// 注销订阅
    pub fn unsubscribe(self) {
        // Drop 完成实际注销
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn change(key: &str, source: ChangeSource) -> StorageChange {
        StorageChange {
            key: key.to_string(),
            new_value: Some("1".to_string()),
            source,
        }
    }

    #[test]
    fn test_own_changes_are_not_delivered() {
        let bus = ChangeBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe("tab-a", move |c| sink.lock().push(c.key.clone()));

        bus.publish(&change("own", ChangeSource::Store("tab-a".into())));
        bus.publish(&change("other", ChangeSource::Store("tab-b".into())));
        bus.publish(&change("process", ChangeSource::External));

        assert_eq!(*seen.lock(), vec!["other", "process"]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = ChangeBus::new();
        let sub = bus.subscribe("tab-a", |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);

        {
            let _scoped = bus.subscribe("tab-a", |_| {});
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus = ChangeBus::new();
        let sub = bus.subscribe("tab-a", |_| {});
        drop(bus);
        sub.unsubscribe();
    }
}
