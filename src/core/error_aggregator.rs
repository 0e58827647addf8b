//! 错误聚合和报告模块
//!
//! 统计桥接层的失败（参数错误、失效引用、脚本异常等），保留最近的诊断记录。

use crate::config::DiagnosticsConfig;
use crate::core::error::BridgeError;
use crate::marshal::exception::DiagnosticRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// 错误统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStats {
    /// 错误总数
    pub total_count: u64,
    /// 按错误类型分组的计数
    pub by_kind: HashMap<String, u64>,
    /// 按错误来源分组的计数
    pub by_source: HashMap<String, u64>,
    /// 最近发生的错误（最多保留N条）
    pub recent_errors: VecDeque<ErrorRecord>,
    /// 错误率（每秒）
    pub error_rate: f64,
    /// 最后更新时间戳
    pub last_updated: u64,
}

impl Default for ErrorStats {
    fn default() -> Self {
        Self {
            total_count: 0,
            by_kind: HashMap::new(),
            by_source: HashMap::new(),
            recent_errors: VecDeque::new(),
            error_rate: 0.0,
            last_updated: crate::core::utils::current_timestamp(),
        }
    }
}

impl ErrorStats {
    /// 获取最常见的错误类型
    pub fn most_common_kind(&self) -> Option<(&String, &u64)> {
        self.by_kind.iter().max_by_key(|(_, count)| *count)
    }

    /// 获取最常见的错误来源
    pub fn most_common_source(&self) -> Option<(&String, &u64)> {
        self.by_source.iter().max_by_key(|(_, count)| *count)
    }
}

/// 错误记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// 错误类型
    pub kind: String,
    /// 错误来源（原生函数名或脚本资源名）
    pub source: String,
    /// 错误消息
    pub message: String,
    /// 时间戳（秒）
    pub timestamp: u64,
    /// 脚本异常的诊断记录
    pub diagnostic: Option<DiagnosticRecord>,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<String>, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            message: message.into(),
            timestamp: crate::core::utils::current_timestamp(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: DiagnosticRecord) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }
}

/// 诊断聚合器
///
/// 收集、统计和报告桥接层的错误信息。克隆后共享同一份统计。
#[derive(Clone)]
pub struct DiagnosticAggregator {
    /// 错误统计（线程安全）
    stats: Arc<Mutex<ErrorStats>>,
    /// 最大保留的错误记录数
    max_recent_errors: usize,
    /// 错误率计算窗口（秒）
    error_rate_window: u64,
}

impl Default for DiagnosticAggregator {
    fn default() -> Self {
        Self::with_config(&DiagnosticsConfig::default())
    }
}

impl DiagnosticAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带配置的聚合器
    pub fn with_config(config: &DiagnosticsConfig) -> Self {
        Self {
            stats: Arc::new(Mutex::new(ErrorStats::default())),
            max_recent_errors: config.max_recent_errors,
            error_rate_window: config.error_rate_window_secs.max(1),
        }
    }

    /// 记录错误
    pub fn record_error(&self, error: &BridgeError, source: impl Into<String>) {
        let mut record = ErrorRecord::new(error.kind_name(), source, error.to_string());
        if let BridgeError::Script(diagnostic) = error {
            record = record.with_diagnostic(diagnostic.clone());
        }
        self.push(record);
    }

    /// 记录脚本异常的诊断信息
    pub fn record_diagnostic(&self, diagnostic: &DiagnosticRecord, source: impl Into<String>) {
        let record = ErrorRecord::new("Script", source, diagnostic.message.clone())
            .with_diagnostic(diagnostic.clone());
        self.push(record);
    }

    /// 获取错误统计
    pub fn get_stats(&self) -> ErrorStats {
        self.lock().clone()
    }

    /// 获取错误摘要
    pub fn get_summary(&self) -> ErrorSummary {
        let stats = self.lock();
        ErrorSummary {
            total_errors: stats.total_count,
            error_rate: stats.error_rate,
            most_common_kind: stats.most_common_kind().map(|(t, c)| (t.clone(), *c)),
            most_common_source: stats.most_common_source().map(|(s, c)| (s.clone(), *c)),
            recent_error_count: stats.recent_errors.len(),
            last_updated: stats.last_updated,
        }
    }

    /// 最近一条记录
    pub fn last_record(&self) -> Option<ErrorRecord> {
        self.lock().recent_errors.back().cloned()
    }

    /// 清除所有统计
    pub fn clear(&self) {
        *self.lock() = ErrorStats::default();
    }

    /// 导出错误报告（JSON格式）
    pub fn export_report(&self) -> Result<String, serde_json::Error> {
        let stats = self.get_stats();
        serde_json::to_string_pretty(&stats)
    }

    fn push(&self, record: ErrorRecord) {
        let window = self.error_rate_window;
        let mut stats = self.lock();
        stats.total_count += 1;

        *stats.by_kind.entry(record.kind.clone()).or_insert(0) += 1;
        *stats.by_source.entry(record.source.clone()).or_insert(0) += 1;

        stats.recent_errors.push_back(record);
        while stats.recent_errors.len() > self.max_recent_errors {
            stats.recent_errors.pop_front();
        }

        let now = crate::core::utils::current_timestamp();
        let window_start = now.saturating_sub(window);
        let in_window = stats
            .recent_errors
            .iter()
            .filter(|r| r.timestamp >= window_start)
            .count();
        stats.error_rate = in_window as f64 / window as f64;
        stats.last_updated = now;
    }

    fn lock(&self) -> MutexGuard<'_, ErrorStats> {
        // 统计数据在持锁期间不会处于不一致状态
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 错误摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// 错误总数
    pub total_errors: u64,
    /// 错误率（每秒）
    pub error_rate: f64,
    /// 最常见的错误类型
    pub most_common_kind: Option<(String, u64)>,
    /// 最常见的错误来源
    pub most_common_source: Option<(String, u64)>,
    /// 最近错误数量
    pub recent_error_count: usize,
    /// 最后更新时间戳
    pub last_updated: u64,
}

impl ErrorSummary {
    /// 格式化错误摘要为字符串
    pub fn format(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("总错误数: {}", self.total_errors));
        lines.push(format!("错误率: {:.2} 错误/秒", self.error_rate));

        if let Some((ref kind, count)) = self.most_common_kind {
            lines.push(format!("最常见错误类型: {} ({}次)", kind, count));
        }

        if let Some((ref source, count)) = self.most_common_source {
            lines.push(format!("最常见错误来源: {} ({}次)", source, count));
        }

        lines.push(format!("最近错误数: {}", self.recent_error_count));

        lines.join("\n")
    }
}
