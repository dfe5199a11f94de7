//! ### English
//! Listener registry keyed by connection id.
//!
//! Iteration works on a snapshot taken under the lock, so a callback may add or remove
//! listeners (including itself) while being invoked without deadlocking or skipping entries.
//!
//! ### 中文
//! 以连接 id 为键的监听器注册表。
//!
//! 遍历基于在锁内获取的快照进行，因此回调在执行期间可以添加或移除监听器（包括自身），
//! 不会死锁也不会跳过条目。

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// ### English
/// Token returned by `add`, used for removal.
///
/// ### 中文
/// `add` 返回的令牌，用于移除。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// ### English
/// Mapping from a connection identifier to its registered callbacks.
///
/// ### 中文
/// 从连接标识到其已注册回调的映射。
pub struct ListenerRegistry<K, L: ?Sized> {
    entries: Mutex<HashMap<K, Vec<(ListenerId, Arc<L>)>>>,
    next_id: AtomicU64,
}

impl<K, L> ListenerRegistry<K, L>
where
    K: Copy + Eq + Hash,
    L: ?Sized,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, connection: K, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(connection)
            .or_default()
            .push((id, listener));
        id
    }

    /// ### English
    /// Removes one listener; returns whether it was registered.
    ///
    /// ### 中文
    /// 移除一个监听器；返回其此前是否已注册。
    pub fn remove(&self, connection: K, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(listeners) = entries.get_mut(&connection) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            entries.remove(&connection);
        }
        removed
    }

    /// ### English
    /// Drops every listener of a connection (connection torn down).
    ///
    /// ### 中文
    /// 移除某个连接的全部监听器（连接已断开）。
    pub fn remove_connection(&self, connection: K) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&connection)
            .map_or(0, |listeners| listeners.len())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// ### English
    /// Invokes `f` for every listener registered at the time of the call.
    ///
    /// The lock is released before the first callback runs.
    ///
    /// ### 中文
    /// 对调用时刻已注册的每个监听器执行 `f`。
    ///
    /// 第一个回调执行前即已释放锁。
    pub fn for_each(&self, mut f: impl FnMut(K, &L)) {
        let snapshot: Vec<(K, Arc<L>)> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .flat_map(|(connection, listeners)| {
                    listeners
                        .iter()
                        .map(move |(_, listener)| (*connection, Arc::clone(listener)))
                })
                .collect()
        };

        for (connection, listener) in snapshot {
            f(connection, &listener);
        }
    }

    /// ### English
    /// Like `for_each`, restricted to one connection.
    ///
    /// ### 中文
    /// 与 `for_each` 相同，但只针对单个连接。
    pub fn for_each_listener(&self, connection: K, mut f: impl FnMut(&L)) {
        let snapshot: Vec<Arc<L>> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&connection)
            .map(|listeners| {
                listeners
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect()
            })
            .unwrap_or_default();

        for listener in snapshot {
            f(&listener);
        }
    }
}

impl<K, L> Default for ListenerRegistry<K, L>
where
    K: Copy + Eq + Hash,
    L: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}
