//! `World` 脚本命名空间
//!
//! 把 [`ObjectWorld`] 的生命周期操作暴露给脚本：
//!
//! ```javascript
//! const actor = World.spawn("Actor");
//! const mesh = World.attachSubObject(actor, "Mesh");
//! World.destroy(actor);
//! Bridge.isReleased(mesh); // true
//! ```

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::error::{BridgeError, BridgeResult};
use crate::marshal::args::{ArgKind, ArgSignature};
use crate::marshal::value::NativeValue;
use crate::native::world::ObjectWorld;

use super::js::JsBridge;

/// 子对象挂载在所属句柄上的槽位
pub const SUB_OBJECT_SLOT: usize = 1;

fn read(world: &RwLock<ObjectWorld>) -> BridgeResult<RwLockReadGuard<'_, ObjectWorld>> {
    world
        .read()
        .map_err(|_| BridgeError::Engine("object world lock is poisoned".to_string()))
}

fn write(world: &RwLock<ObjectWorld>) -> BridgeResult<RwLockWriteGuard<'_, ObjectWorld>> {
    world
        .write()
        .map_err(|_| BridgeError::Engine("object world lock is poisoned".to_string()))
}

/// 注册 `World.*` 函数
pub fn install_world_api(bridge: &JsBridge, world: Arc<RwLock<ObjectWorld>>) -> BridgeResult<()> {
    let w = Arc::clone(&world);
    bridge.register("World.spawn", [ArgKind::String], move |call| {
        let class_name = call.text(0)?;
        let ptr = write(&w)?.spawn(class_name);
        Ok(NativeValue::Object(ptr))
    })?;

    let w = Arc::clone(&world);
    bridge.register("World.destroy", [ArgKind::Object], move |call| {
        let Some(ptr) = call.object(0)? else {
            return Ok(NativeValue::Bool(false));
        };
        let destroyed = write(&w)?.destroy(ptr);
        if destroyed {
            call.with_state(|state| state.handles.mark_released(ptr))?;
        }
        Ok(NativeValue::Bool(destroyed))
    })?;

    let w = Arc::clone(&world);
    bridge.register("World.markPendingKill", [ArgKind::Object], move |call| {
        let Some(ptr) = call.object(0)? else {
            return Ok(NativeValue::Bool(false));
        };
        Ok(NativeValue::Bool(write(&w)?.mark_pending_kill(ptr)))
    })?;

    let w = Arc::clone(&world);
    bridge.register("World.className", [ArgKind::Object], move |call| {
        let class_name = match call.object(0)? {
            Some(ptr) => read(&w)?.class_name(ptr).map(str::to_string),
            None => None,
        };
        Ok(class_name.map(NativeValue::Text).unwrap_or(NativeValue::Undefined))
    })?;

    let w = Arc::clone(&world);
    bridge.register(
        "World.attachSubObject",
        [ArgKind::Object, ArgKind::String],
        move |call| {
            let Some(owner) = call.object(0)? else {
                return Ok(NativeValue::Null);
            };
            let class_name = call.text(1)?;
            let sub = write(&w)?
                .spawn_sub_object(owner, class_name)
                .ok_or_else(|| BridgeError::Conversion(format!("{} cannot own sub-objects", owner)))?;
            call.attach(0, sub, SUB_OBJECT_SLOT)?;
            Ok(NativeValue::Object(sub))
        },
    )?;

    let w = Arc::clone(&world);
    bridge.register("World.subObjectClass", [ArgKind::Object], move |call| {
        let class_name = match call.object_slot(0, SUB_OBJECT_SLOT)? {
            Some(ptr) => read(&w)?.class_name(ptr).map(str::to_string),
            None => None,
        };
        Ok(class_name.map(NativeValue::Text).unwrap_or(NativeValue::Undefined))
    })?;

    let w = Arc::clone(&world);
    bridge.register("World.objectCount", ArgSignature::empty(), move |_call| {
        Ok(NativeValue::Int32(read(&w)?.object_count() as i32))
    })?;

    let w = world;
    bridge.register("World.collectGarbage", ArgSignature::empty(), move |_call| {
        Ok(NativeValue::Int32(write(&w)?.collect_garbage() as i32))
    })?;

    tracing::debug!(target: "bridge.world", "World API installed");
    Ok(())
}
