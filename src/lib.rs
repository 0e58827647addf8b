//! # Object Bridge
//!
//! 原生对象与脚本引擎之间的封送层。
//!
//! ## Features
//!
//! - **值转换**: UTF-16 字符串、驻留名称、带编码标记的文件内容
//! - **指针标记**: 脚本句柄上挂载多个原生指针槽位
//! - **活性检查**: 每次访问都重新确认原生对象仍然存在
//! - **参数校验**: 原生入口在使用参数前检查个数与类型
//! - **异常桥接**: 脚本异常转为包含调用栈或源码位置的诊断记录
//!
//! ## Example
//!
//! ```ignore
//! use object_bridge::bindings::{install_world_api, JsBridge};
//! use object_bridge::config::BridgeConfig;
//! use object_bridge::native::ObjectWorld;
//! use std::sync::{Arc, RwLock};
//!
//! let world = Arc::new(RwLock::new(ObjectWorld::new()));
//! let bridge = JsBridge::with_world(BridgeConfig::load_or_default(), world.clone())?;
//! bridge.install_builtins()?;
//! install_world_api(&bridge, world)?;
//! bridge.execute("const a = World.spawn('Actor'); World.destroy(a); Bridge.isReleased(a);")?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: 错误类型、诊断统计、日志
//! - [`config`]: 配置加载
//! - [`marshal`]: 与引擎无关的封送组件
//! - [`native`]: 基于 ECS 的原生对象世界
//! - [`bindings`]: QuickJS 适配

/// Core infrastructure: errors, diagnostics, logging
pub mod core;
/// Configuration system
pub mod config;
/// Engine-agnostic marshaling components
pub mod marshal;
/// Native object world
pub mod native;
/// Script engine bindings
pub mod bindings;

pub use crate::bindings::{JsBridge, NativeCall};
pub use crate::config::BridgeConfig;
pub use crate::core::{BridgeError, BridgeResult};
