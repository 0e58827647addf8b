//! 按脚本引擎实例划分的数据
//!
//! 每个引擎实例启动时登记一份上下文数据，停止时移除。
//! 只有在持有有效实例时才能访问对应数据。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::{BridgeError, BridgeResult};

/// 引擎实例标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// 实例数据注册表
pub struct InstanceRegistry<T> {
    instances: Mutex<HashMap<InstanceId, Arc<Mutex<T>>>>,
    next_id: AtomicU64,
}

impl<T> Default for InstanceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InstanceRegistry<T> {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 登记新实例
    pub fn start(&self, data: T) -> InstanceId {
        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, Arc::new(Mutex::new(data)));
        tracing::debug!(target: "bridge.instance", "Started {}", id);
        id
    }

    /// 移除实例，返回它的数据
    pub fn stop(&self, id: InstanceId) -> Option<Arc<Mutex<T>>> {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            tracing::debug!(target: "bridge.instance", "Stopped {}", id);
        }
        removed
    }

    pub fn get(&self, id: InstanceId) -> Option<Arc<Mutex<T>>> {
        self.lock().get(&id).cloned()
    }

    pub fn is_running(&self, id: InstanceId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 在实例数据上执行操作
    pub fn with<R>(&self, id: InstanceId, f: impl FnOnce(&mut T) -> R) -> BridgeResult<R> {
        let data = self
            .get(id)
            .ok_or_else(|| BridgeError::Instance(format!("{} is not running", id)))?;
        let mut guard = data
            .lock()
            .map_err(|_| BridgeError::Instance(format!("{} state is poisoned", id)))?;
        Ok(f(&mut guard))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<InstanceId, Arc<Mutex<T>>>> {
        // 注册表只保存 Arc，持锁期间不会 panic
        self.instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
