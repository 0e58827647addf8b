//! 活性检查
//!
//! 原生对象可能在脚本仍持有句柄时被销毁（原生侧回收或显式删除）。
//! 每次访问都要重新校验，而不是信任缓存的指针。

use std::sync::{Arc, Mutex, RwLock};

use crate::core::error::{BridgeError, BridgeResult};
use crate::marshal::tagger::{HandleId, HandleTable, NativePtr, Slot};

/// 原生对象有效性判定
///
/// 两个方法都应是 O(1) 且无副作用。
pub trait ValidityOracle {
    /// 指针是否指向一个有效的、已完整构造的对象
    fn is_valid(&self, ptr: NativePtr) -> bool;

    /// 对象是否正在等待销毁
    fn is_pending_destruction(&self, ptr: NativePtr) -> bool;

    fn is_live(&self, ptr: NativePtr) -> bool {
        self.is_valid(ptr) && !self.is_pending_destruction(ptr)
    }
}

impl<T: ValidityOracle + ?Sized> ValidityOracle for Arc<T> {
    fn is_valid(&self, ptr: NativePtr) -> bool {
        (**self).is_valid(ptr)
    }

    fn is_pending_destruction(&self, ptr: NativePtr) -> bool {
        (**self).is_pending_destruction(ptr)
    }
}

// 锁中毒时视为对象不可用
impl<T: ValidityOracle> ValidityOracle for RwLock<T> {
    fn is_valid(&self, ptr: NativePtr) -> bool {
        self.read().map(|inner| inner.is_valid(ptr)).unwrap_or(false)
    }

    fn is_pending_destruction(&self, ptr: NativePtr) -> bool {
        self.read()
            .map(|inner| inner.is_pending_destruction(ptr))
            .unwrap_or(true)
    }
}

impl<T: ValidityOracle> ValidityOracle for Mutex<T> {
    fn is_valid(&self, ptr: NativePtr) -> bool {
        self.lock().map(|inner| inner.is_valid(ptr)).unwrap_or(false)
    }

    fn is_pending_destruction(&self, ptr: NativePtr) -> bool {
        self.lock()
            .map(|inner| inner.is_pending_destruction(ptr))
            .unwrap_or(true)
    }
}

/// 句柄解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// 从未设置指针
    Absent,
    /// 指向有效对象
    Live(NativePtr),
    /// 曾经有效，现已销毁
    Released,
}

impl Resolved {
    pub fn live(self) -> Option<NativePtr> {
        match self {
            Resolved::Live(ptr) => Some(ptr),
            _ => None,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Resolved::Live(_))
    }

    pub fn is_released(self) -> bool {
        matches!(self, Resolved::Released)
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Resolved::Absent)
    }

    /// 转为调用方可用的结果
    ///
    /// `Released` 变为 [`BridgeError::StaleReference`]，不会退化成 `None`。
    /// `index` 是出错参数的位置，只用于错误信息。
    pub fn into_live(self, index: usize) -> BridgeResult<Option<NativePtr>> {
        match self {
            Resolved::Absent => Ok(None),
            Resolved::Live(ptr) => Ok(Some(ptr)),
            Resolved::Released => Err(BridgeError::StaleReference { index }),
        }
    }
}

/// 解析句柄槽位到原生对象
///
/// 空槽位返回 `Absent`；已释放或校验失败返回 `Released`；否则返回 `Live`。
/// 不修改侧表，没有中间的原生侧变化时重复调用结果相同。
pub fn resolve_handle_to_object<O: ValidityOracle + ?Sized>(
    table: &HandleTable,
    handle: Option<HandleId>,
    index: usize,
    oracle: &O,
) -> Resolved {
    match table.slot(handle, index) {
        Slot::Empty => Resolved::Absent,
        Slot::Released => Resolved::Released,
        Slot::Tagged(ptr) => {
            if oracle.is_live(ptr) {
                Resolved::Live(ptr)
            } else {
                tracing::trace!(target: "bridge.liveness", "Pointer {} is no longer valid", ptr);
                Resolved::Released
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod oracle {
    use super::ValidityOracle;
    use crate::marshal::tagger::NativePtr;
    use std::collections::HashSet;

    /// 测试用的有效性判定
    #[derive(Debug, Default)]
    pub struct SetOracle {
        pub valid: HashSet<NativePtr>,
        pub pending: HashSet<NativePtr>,
    }

    impl ValidityOracle for SetOracle {
        fn is_valid(&self, ptr: NativePtr) -> bool {
            self.valid.contains(&ptr)
        }

        fn is_pending_destruction(&self, ptr: NativePtr) -> bool {
            self.pending.contains(&ptr)
        }
    }
}
