//! 原生对象与脚本值之间的封送层
//!
//! 各组件（从底层到上层）：
//! - `value` / `name` - 值转换（UTF-16 字符串、驻留名称、字节缓冲）
//! - `tagger` - 在脚本句柄上挂载原生指针
//! - `liveness` - 访问时重新校验原生指针是否仍然有效
//! - `args` - 原生入口的参数个数与类型校验
//! - `exception` - 脚本异常与诊断记录之间的转换
//! - `instance` - 按引擎实例划分的上下文数据
//!
//! 本模块不依赖具体的脚本引擎，引擎适配见 [`crate::bindings`]。

pub mod args;
pub mod exception;
pub mod instance;
pub mod liveness;
pub mod name;
pub mod tagger;
pub mod value;

#[cfg(test)]
mod property_tests;

pub use args::{check_length, check_types, ArgKind, ArgSignature, ValueProbe};
pub use exception::{describe, CaughtException, DiagnosticDetail, DiagnosticRecord, SourceLocation};
pub use instance::{InstanceId, InstanceRegistry};
pub use liveness::{resolve_handle_to_object, Resolved, ValidityOracle};
pub use name::{NameTable, NativeName};
pub use tagger::{HandleId, HandleTable, NativePtr, Slot, PRIMARY_SLOT};
pub use value::{decode_file_content, detect_encoding, DecodePolicy, NativeString, NativeValue, TextEncoding};
