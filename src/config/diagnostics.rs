use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 诊断配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// 保留的最近错误条数
    pub max_recent_errors: usize,

    /// 错误率计算窗口（秒）
    pub error_rate_window_secs: u64,

    /// 脚本异常是否写入日志
    pub log_script_errors: bool,
}

impl_default!(DiagnosticsConfig {
    max_recent_errors: 1000,
    error_rate_window_secs: 60,
    log_script_errors: true,
});

impl DiagnosticsConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.error_rate_window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "error_rate_window_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
