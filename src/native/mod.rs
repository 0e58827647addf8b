//! 原生对象模型
//!
//! 由 ECS 世界承载的原生对象，以及供活性检查使用的有效性判定。

pub mod world;

pub use world::{DestroyNotice, NativeObject, ObjectWorld, PendingKill, SubObject};
