//! 脚本引擎绑定层
//!
//! 封送层本身不依赖具体引擎，这里把它接到 QuickJS 上。
//!
//! 结构：
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   JavaScript                        │
//! │     World.spawn(...)   Bridge.isLive(...)           │
//! └──────────────────────────┬──────────────────────────┘
//!                            │
//!                            v
//! ┌─────────────────────────────────────────────────────┐
//! │   JsBridge (参数校验 / 值转换 / 异常桥接)            │
//! └──────────────────────────┬──────────────────────────┘
//!                            │
//!                            v
//! ┌─────────────────────────────────────────────────────┐
//! │   marshal (句柄表 / 活性检查 / 名称表 / 实例数据)     │
//! └──────────────────────────┬──────────────────────────┘
//!                            │
//!                            v
//! ┌─────────────────────────────────────────────────────┐
//! │   ObjectWorld (ECS 原生对象，销毁通知)               │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod js;
pub mod world_api;

pub use js::{
    caught_exception, throw_error, HandleKind, InstanceState, JsBridge, NativeCall, NativeFunction,
    NativeHandle,
};
pub use world_api::{install_world_api, SUB_OBJECT_SLOT};
