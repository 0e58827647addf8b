//! 核心模块
//!
//! 包含桥接层的基础设施：
//! - `error` - 错误类型定义
//! - `error_aggregator` - 错误统计与报告
//! - `logging` - 日志初始化
//! - `utils` - 通用工具函数

pub mod error;
pub mod error_aggregator;
pub mod logging;
pub mod utils;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{BridgeError, BridgeResult};

// 重新导出错误聚合器
pub use error_aggregator::{DiagnosticAggregator, ErrorRecord, ErrorStats, ErrorSummary};

pub use logging::init_logging;
