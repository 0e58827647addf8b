//! 参数校验
//!
//! 每个暴露给脚本的原生入口在读取任何参数之前，先校验参数个数再校验参数类型。
//! 校验只使用脚本引擎自身的类型谓词，不做任何转换，因此没有副作用。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{BridgeError, BridgeResult};

/// 参数类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgKind {
    /// 32位整数
    Int32,
    /// 浮点数（包含整数）
    Number,
    /// 字符串
    String,
    /// 不透明的外部值
    External,
    /// 可调用对象
    Function,
    /// 任意对象
    Object,
}

impl ArgKind {
    /// 用该类型谓词检查一个脚本值
    pub fn accepts<V: ValueProbe + ?Sized>(self, value: &V) -> bool {
        match self {
            ArgKind::Int32 => value.is_int32(),
            ArgKind::Number => value.is_number(),
            ArgKind::String => value.is_string(),
            ArgKind::External => value.is_external(),
            ArgKind::Function => value.is_function(),
            ArgKind::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ArgKind::Int32 => "a int32",
            ArgKind::Number => "a number",
            ArgKind::String => "a string",
            ArgKind::External => "an external",
            ArgKind::Function => "a function",
            ArgKind::Object => "an object",
        };
        f.write_str(text)
    }
}

/// 脚本值的类型谓词
///
/// 由具体脚本引擎的值类型实现。
pub trait ValueProbe {
    fn is_int32(&self) -> bool;
    fn is_number(&self) -> bool;
    fn is_string(&self) -> bool;
    fn is_external(&self) -> bool;
    fn is_function(&self) -> bool;
    fn is_object(&self) -> bool;

    /// 用于错误信息的实际类型名
    fn type_name(&self) -> &'static str;
}

/// 参数描述列表
///
/// 在注册时确定，之后每次调用都会查询。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgSignature {
    kinds: Box<[ArgKind]>,
}

impl ArgSignature {
    pub fn new(kinds: &[ArgKind]) -> Self {
        Self {
            kinds: kinds.into(),
        }
    }

    /// 不带参数的签名
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> &[ArgKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl From<&[ArgKind]> for ArgSignature {
    fn from(kinds: &[ArgKind]) -> Self {
        Self::new(kinds)
    }
}

impl<const N: usize> From<[ArgKind; N]> for ArgSignature {
    fn from(kinds: [ArgKind; N]) -> Self {
        Self::new(&kinds)
    }
}

/// 校验参数个数
///
/// 多余的参数不算错误，少于期望个数时失败。
pub fn check_length(provided: usize, expected: usize) -> BridgeResult<()> {
    if provided < expected {
        let err = BridgeError::ArgumentCount { expected, provided };
        tracing::warn!(target: "bridge.args", "{}", err);
        return Err(err);
    }
    Ok(())
}

/// 先校验个数，再按顺序校验每个参数的类型
///
/// 返回第一个不匹配的参数（从0开始的下标）。
pub fn check_types<V: ValueProbe>(args: &[V], signature: &ArgSignature) -> BridgeResult<()> {
    check_length(args.len(), signature.len())?;

    for (index, (kind, value)) in signature.kinds().iter().zip(args).enumerate() {
        if !kind.accepts(value) {
            let err = BridgeError::ArgumentType {
                index,
                expected: *kind,
                actual: value.type_name(),
            };
            tracing::warn!(target: "bridge.args", "{}", err);
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod probe {
    use super::ValueProbe;

    /// 测试用的脚本值替身
    #[derive(Debug, Clone, PartialEq)]
    pub enum Probe {
        Int(i32),
        Float(f64),
        Str(&'static str),
        External,
        Function,
        Object,
        Undefined,
    }

    impl ValueProbe for Probe {
        fn is_int32(&self) -> bool {
            match self {
                Probe::Int(_) => true,
                Probe::Float(f) => f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64,
                _ => false,
            }
        }

        fn is_number(&self) -> bool {
            matches!(self, Probe::Int(_) | Probe::Float(_))
        }

        fn is_string(&self) -> bool {
            matches!(self, Probe::Str(_))
        }

        fn is_external(&self) -> bool {
            matches!(self, Probe::External)
        }

        fn is_function(&self) -> bool {
            matches!(self, Probe::Function)
        }

        fn is_object(&self) -> bool {
            matches!(self, Probe::External | Probe::Function | Probe::Object)
        }

        fn type_name(&self) -> &'static str {
            match self {
                Probe::Int(_) => "int32",
                Probe::Float(_) => "number",
                Probe::Str(_) => "string",
                Probe::External => "external",
                Probe::Function => "function",
                Probe::Object => "object",
                Probe::Undefined => "undefined",
            }
        }
    }
}
