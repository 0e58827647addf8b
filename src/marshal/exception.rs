//! 异常桥接
//!
//! 把脚本引擎捕获到的异常整理成可读的诊断记录。优先使用完整调用栈，
//! 没有调用栈时退回到 `(资源名:行号: 列号)` 的位置描述。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 异常的源位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub resource: String,
    pub line: i32,
    pub column: i32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{}: {})", self.resource, self.line, self.column)
    }
}

/// 从脚本引擎读取到的异常原始信息
///
/// 字段读取失败时留空，而不是继续抛出。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaughtException {
    pub message: String,
    pub stack: Option<String>,
    pub location: Option<SourceLocation>,
}

impl CaughtException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_location(mut self, resource: impl Into<String>, line: i32, column: i32) -> Self {
        self.location = Some(SourceLocation {
            resource: resource.into(),
            line,
            column,
        });
        self
    }
}

/// 诊断附加信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticDetail {
    StackTrace(String),
    Location(SourceLocation),
    None,
}

/// 诊断记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub message: String,
    pub detail: DiagnosticDetail,
}

impl DiagnosticRecord {
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: DiagnosticDetail::None,
        }
    }

    pub fn stack_trace(&self) -> Option<&str> {
        match &self.detail {
            DiagnosticDetail::StackTrace(stack) => Some(stack),
            _ => None,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match &self.detail {
            DiagnosticDetail::Location(location) => Some(location),
            _ => None,
        }
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            DiagnosticDetail::StackTrace(stack) => write!(f, "{}\n{}", self.message, stack),
            DiagnosticDetail::Location(location) => write!(f, "{} at {}", self.message, location),
            DiagnosticDetail::None => f.write_str(&self.message),
        }
    }
}

/// 生成诊断记录
///
/// 调用栈与位置信息二选一：只在没有调用栈时才使用位置。
pub fn describe(caught: &CaughtException) -> DiagnosticRecord {
    let detail = match caught.stack.as_deref().map(str::trim_end) {
        Some(stack) if !stack.is_empty() => DiagnosticDetail::StackTrace(stack.to_string()),
        _ => match &caught.location {
            Some(location) => DiagnosticDetail::Location(location.clone()),
            None => DiagnosticDetail::None,
        },
    };
    DiagnosticRecord {
        message: caught.message.clone(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_trace_preferred() {
        let caught = CaughtException::new("Error: boom")
            .with_stack("    at f (main.js:3)\n")
            .with_location("main.js", 3, 5);
        let record = describe(&caught);
        assert_eq!(record.stack_trace(), Some("    at f (main.js:3)"));
        assert!(record.location().is_none());
        let text = record.to_string();
        assert!(text.starts_with("Error: boom\n"));
        assert!(text.contains("at f (main.js:3)"));
        assert!(!text.contains("(main.js:3: 5)"));
    }

    #[test]
    fn test_location_fallback() {
        let caught = CaughtException::new("TypeError: x is undefined").with_location("game.js", 12, 4);
        let record = describe(&caught);
        assert_eq!(
            record.to_string(),
            "TypeError: x is undefined at (game.js:12: 4)"
        );
    }

    #[test]
    fn test_empty_stack_uses_location() {
        let caught = CaughtException::new("oops")
            .with_stack("")
            .with_location("a.js", 1, 0);
        assert!(describe(&caught).location().is_some());
    }

    #[test]
    fn test_plain_message() {
        let record = describe(&CaughtException::new("thrown string"));
        assert_eq!(record, DiagnosticRecord::plain("thrown string"));
        assert_eq!(record.to_string(), "thrown string");
    }
}
