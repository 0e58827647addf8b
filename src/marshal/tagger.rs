//! 指针标记
//!
//! 脚本句柄上挂载不透明的原生指针。指针存放在按句柄编号索引的侧表中，
//! 脚本对象本身只携带句柄编号。侧表不拥有原生对象：移除句柄不会释放其指向的对象，
//! 原生对象的生命周期完全由原生侧管理。

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;

use crate::core::error::{BridgeError, BridgeResult};

/// 主指针槽位
pub const PRIMARY_SLOT: usize = 0;

/// 不透明的原生指针
///
/// 只是一个非零地址值，不携带所有权。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePtr(NonZeroU64);

impl NativePtr {
    /// 从地址值创建，零地址返回 `None`
    pub fn new(addr: u64) -> Option<Self> {
        NonZeroU64::new(addr).map(Self)
    }

    pub fn from_raw<T>(ptr: *const T) -> Option<Self> {
        Self::new(ptr as usize as u64)
    }

    pub fn addr(self) -> u64 {
        self.0.get()
    }

    pub fn as_raw<T>(self) -> *mut T {
        self.0.get() as usize as *mut T
    }
}

impl fmt::Display for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// 脚本句柄编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u32);

impl HandleId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot {
    /// 从未设置
    #[default]
    Empty,
    /// 挂载了原生指针
    Tagged(NativePtr),
    /// 原生对象已销毁
    Released,
}

/// 句柄侧表
#[derive(Debug)]
pub struct HandleTable {
    slots: HashMap<HandleId, Vec<Slot>>,
    /// 反向索引：原生指针 -> 挂载它的 (句柄, 槽位)
    owners: HashMap<NativePtr, Vec<(HandleId, usize)>>,
    next_id: u32,
    max_slots: usize,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new(4)
    }
}

impl HandleTable {
    pub fn new(max_slots: usize) -> Self {
        Self {
            slots: HashMap::new(),
            owners: HashMap::new(),
            next_id: 1,
            max_slots: max_slots.max(1),
        }
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// 分配一个空句柄
    ///
    /// 编号回绕后跳过仍在使用的编号；所有编号都被占用时返回错误。
    pub fn create_handle(&mut self) -> BridgeResult<HandleId> {
        let start = self.next_id;
        loop {
            let id = HandleId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.slots.contains_key(&id) {
                self.slots.insert(id, Vec::new());
                return Ok(id);
            }
            if self.next_id == start {
                return Err(BridgeError::Instance("handle table is full".to_string()));
            }
        }
    }

    pub fn contains(&self, handle: HandleId) -> bool {
        self.slots.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 在句柄的指定槽位挂载指针，覆盖原有内容
    pub fn attach(&mut self, handle: HandleId, ptr: NativePtr, index: usize) -> BridgeResult<()> {
        if index >= self.max_slots {
            return Err(BridgeError::InvalidSlot {
                index,
                max: self.max_slots,
            });
        }
        let slots = self
            .slots
            .get_mut(&handle)
            .ok_or(BridgeError::UnknownHandle(handle))?;
        if slots.len() <= index {
            slots.resize(index + 1, Slot::Empty);
        }

        let previous = std::mem::replace(&mut slots[index], Slot::Tagged(ptr));
        if let Slot::Tagged(old) = previous {
            Self::unlink(&mut self.owners, old, handle, index);
        }
        self.owners.entry(ptr).or_default().push((handle, index));
        Ok(())
    }

    /// 读取槽位的三态内容；未知句柄或越界槽位视为空
    pub fn slot(&self, handle: Option<HandleId>, index: usize) -> Slot {
        handle
            .and_then(|h| self.slots.get(&h))
            .and_then(|slots| slots.get(index))
            .copied()
            .unwrap_or(Slot::Empty)
    }

    /// 取回挂载的指针
    ///
    /// 空句柄、空槽位和已释放槽位都返回 `None`，从不失败。
    /// 需要区分“已释放”时使用 [`HandleTable::slot`] 或活性检查。
    pub fn fetch(&self, handle: Option<HandleId>, index: usize) -> Option<NativePtr> {
        match self.slot(handle, index) {
            Slot::Tagged(ptr) => Some(ptr),
            Slot::Empty | Slot::Released => None,
        }
    }

    /// 原生对象销毁通知：所有挂载该指针的槽位变为 `Released`
    ///
    /// 返回受影响的槽位数。
    pub fn mark_released(&mut self, ptr: NativePtr) -> usize {
        let Some(owners) = self.owners.remove(&ptr) else {
            return 0;
        };
        let mut count = 0;
        for (handle, index) in owners {
            if let Some(slot) = self.slots.get_mut(&handle).and_then(|s| s.get_mut(index)) {
                if *slot == Slot::Tagged(ptr) {
                    *slot = Slot::Released;
                    count += 1;
                }
            }
        }
        tracing::debug!(target: "bridge.liveness", "Released {} slot(s) tagging {}", count, ptr);
        count
    }

    /// 把单个槽位标记为已释放
    pub fn release_slot(&mut self, handle: HandleId, index: usize) -> bool {
        let Some(slot) = self.slots.get_mut(&handle).and_then(|s| s.get_mut(index)) else {
            return false;
        };
        if let Slot::Tagged(ptr) = std::mem::replace(slot, Slot::Released) {
            Self::unlink(&mut self.owners, ptr, handle, index);
        }
        true
    }

    /// 移除句柄（脚本侧不再使用），不影响原生对象
    pub fn detach(&mut self, handle: HandleId) -> bool {
        let Some(slots) = self.slots.remove(&handle) else {
            return false;
        };
        for (index, slot) in slots.into_iter().enumerate() {
            if let Slot::Tagged(ptr) = slot {
                Self::unlink(&mut self.owners, ptr, handle, index);
            }
        }
        true
    }

    /// 当前挂载某指针的所有句柄
    pub fn handles_for(&self, ptr: NativePtr) -> Vec<HandleId> {
        self.owners
            .get(&ptr)
            .map(|owners| owners.iter().map(|(h, _)| *h).collect())
            .unwrap_or_default()
    }

    fn unlink(
        owners: &mut HashMap<NativePtr, Vec<(HandleId, usize)>>,
        ptr: NativePtr,
        handle: HandleId,
        index: usize,
    ) {
        if let Some(list) = owners.get_mut(&ptr) {
            list.retain(|entry| *entry != (handle, index));
            if list.is_empty() {
                owners.remove(&ptr);
            }
        }
    }
}
