//! 原生对象世界
//!
//! 原生对象是 ECS 实体，对象指针就是实体的 64 位标识。实体被销毁后其标识的
//! 世代号会递增，旧指针不会再被判定为有效。
//!
//! 销毁可能发生在驱动脚本的线程之外，因此每次销毁都会通过通道发出通知，
//! 由脚本线程取出后把对应句柄标记为已释放。

use bevy_ecs::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::marshal::liveness::ValidityOracle;
use crate::marshal::tagger::NativePtr;

/// 原生对象组件
#[derive(Component, Debug, Clone)]
pub struct NativeObject {
    pub class_name: String,
}

/// 子对象：挂在句柄辅助槽位上的指针来源
#[derive(Component, Debug, Clone, Copy)]
pub struct SubObject {
    pub owner: Entity,
}

/// 等待销毁标记
#[derive(Component, Debug, Default)]
pub struct PendingKill;

/// 销毁通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyNotice {
    pub ptr: NativePtr,
}

/// 原生对象世界
pub struct ObjectWorld {
    world: World,
    notice_tx: Sender<DestroyNotice>,
    notice_rx: Receiver<DestroyNotice>,
}

impl Default for ObjectWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectWorld {
    pub fn new() -> Self {
        let (notice_tx, notice_rx) = unbounded();
        Self {
            world: World::new(),
            notice_tx,
            notice_rx,
        }
    }

    /// 实体转对象指针
    pub fn ptr_of(entity: Entity) -> NativePtr {
        // 世代号从 1 开始，实体标识不会为零
        NativePtr::new(entity.to_bits()).unwrap_or_else(|| unreachable!("entity bits are never zero"))
    }

    /// 对象指针转实体
    pub fn entity_of(ptr: NativePtr) -> Option<Entity> {
        Entity::try_from_bits(ptr.addr()).ok()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// 销毁通知的接收端，可交给驱动脚本的线程
    pub fn destroy_notices(&self) -> Receiver<DestroyNotice> {
        self.notice_rx.clone()
    }

    /// 创建原生对象
    pub fn spawn(&mut self, class_name: impl Into<String>) -> NativePtr {
        let entity = self
            .world
            .spawn(NativeObject {
                class_name: class_name.into(),
            })
            .id();
        tracing::trace!(target: "bridge.world", "Spawned {:?}", entity);
        Self::ptr_of(entity)
    }

    /// 创建属于某对象的子对象
    pub fn spawn_sub_object(&mut self, owner: NativePtr, class_name: impl Into<String>) -> Option<NativePtr> {
        let owner = Self::entity_of(owner).filter(|e| self.world.get_entity(*e).is_some())?;
        let entity = self
            .world
            .spawn((
                NativeObject {
                    class_name: class_name.into(),
                },
                SubObject { owner },
            ))
            .id();
        Some(Self::ptr_of(entity))
    }

    pub fn class_name(&self, ptr: NativePtr) -> Option<&str> {
        let entity = Self::entity_of(ptr)?;
        self.world
            .get::<NativeObject>(entity)
            .map(|object| object.class_name.as_str())
    }

    /// 标记为等待销毁；对象仍存在但不再可用
    pub fn mark_pending_kill(&mut self, ptr: NativePtr) -> bool {
        let Some(entity) = Self::entity_of(ptr) else {
            return false;
        };
        match self.world.get_entity_mut(entity) {
            Some(mut entity_mut) => {
                entity_mut.insert(PendingKill);
                true
            }
            None => false,
        }
    }

    /// 销毁对象及其子对象，并发出销毁通知
    pub fn destroy(&mut self, ptr: NativePtr) -> bool {
        let Some(entity) = Self::entity_of(ptr) else {
            return false;
        };

        let children: Vec<Entity> = {
            let mut query = self.world.query::<(Entity, &SubObject)>();
            query
                .iter(&self.world)
                .filter(|(_, sub)| sub.owner == entity)
                .map(|(child, _)| child)
                .collect()
        };

        if !self.world.despawn(entity) {
            return false;
        }
        self.notify(ptr);

        for child in children {
            if self.world.despawn(child) {
                self.notify(Self::ptr_of(child));
            }
        }
        true
    }

    /// 销毁所有等待销毁的对象
    pub fn collect_garbage(&mut self) -> usize {
        let doomed: Vec<Entity> = {
            let mut query = self.world.query_filtered::<Entity, With<PendingKill>>();
            query.iter(&self.world).collect()
        };
        doomed
            .into_iter()
            .filter(|entity| self.destroy(Self::ptr_of(*entity)))
            .count()
    }

    pub fn object_count(&self) -> usize {
        self.world.entities().len() as usize
    }

    fn notify(&self, ptr: NativePtr) {
        tracing::trace!(target: "bridge.world", "Destroyed {}", ptr);
        // 接收端和发送端都由本结构持有，发送不会失败
        let _ = self.notice_tx.send(DestroyNotice { ptr });
    }
}

impl ValidityOracle for ObjectWorld {
    fn is_valid(&self, ptr: NativePtr) -> bool {
        Self::entity_of(ptr)
            .and_then(|entity| self.world.get_entity(entity))
            .map(|entity_ref| entity_ref.contains::<NativeObject>())
            .unwrap_or(false)
    }

    fn is_pending_destruction(&self, ptr: NativePtr) -> bool {
        Self::entity_of(ptr)
            .map(|entity| self.world.get::<PendingKill>(entity).is_some())
            .unwrap_or(false)
    }
}
