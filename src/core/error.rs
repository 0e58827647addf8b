//! 统一错误处理模块
//!
//! 提供桥接层范围内的统一错误类型定义
//!
//! ## 错误分类
//!
//! - **参数错误** (`ArgumentCount` / `ArgumentType`): 脚本传入的参数个数或类型不符，
//!   在任何副作用发生之前中止本次原生调用
//! - **失效引用** (`StaleReference`): 句柄指向的原生对象已被销毁
//! - **转换错误** (`Conversion`): 字节内容无法按任何支持的编码解码
//! - **脚本异常** (`Script`): 脚本执行抛出且未被捕获的异常
//!
//! 所有面向脚本的错误都会以可捕获的脚本异常形式抛出，不会终止宿主进程。

use thiserror::Error;

use crate::marshal::args::ArgKind;
use crate::marshal::exception::DiagnosticRecord;
use crate::marshal::tagger::HandleId;

/// 桥接层核心错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Bad parameters, the function expect {expected}, but {provided} provided.")]
    ArgumentCount { expected: usize, provided: usize },

    #[error("Bad parameters #{index}, expect {expected}, but got {actual}.")]
    ArgumentType {
        index: usize,
        expected: ArgKind,
        actual: &'static str,
    },

    #[error("Bad parameters #{index}, the native object has been released.")]
    StaleReference { index: usize },

    #[error("Conversion fault: {0}")]
    Conversion(String),

    #[error("Invalid slot index {index}, a handle holds at most {max} slots")]
    InvalidSlot { index: usize, max: usize },

    #[error("Unknown script handle: {0}")]
    UnknownHandle(HandleId),

    #[error("{0}")]
    Script(DiagnosticRecord),

    #[error("Script instance error: {0}")]
    Instance(String),

    #[error("Script engine error: {0}")]
    Engine(String),
}

impl BridgeError {
    /// 错误类型名称（用于统计聚合）
    pub fn kind_name(&self) -> &'static str {
        match self {
            BridgeError::ArgumentCount { .. } => "ArgumentCount",
            BridgeError::ArgumentType { .. } => "ArgumentType",
            BridgeError::StaleReference { .. } => "StaleReference",
            BridgeError::Conversion(_) => "Conversion",
            BridgeError::InvalidSlot { .. } => "InvalidSlot",
            BridgeError::UnknownHandle(_) => "UnknownHandle",
            BridgeError::Script(_) => "Script",
            BridgeError::Instance(_) => "Instance",
            BridgeError::Engine(_) => "Engine",
        }
    }
}

impl From<rquickjs::Error> for BridgeError {
    fn from(err: rquickjs::Error) -> Self {
        BridgeError::Engine(err.to_string())
    }
}

/// 桥接层结果类型别名
pub type BridgeResult<T> = Result<T, BridgeError>;
