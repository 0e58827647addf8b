//! 日志初始化

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 初始化日志系统
///
/// 优先使用 `RUST_LOG` 环境变量，未设置时使用配置中的级别。
/// 重复调用是安全的，只有第一次生效。返回本次调用是否安装了订阅者。
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.log_to_console {
        return false;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::info!(target: "bridge", "Logging initialized at {}", config.level.as_directive());
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            log_to_console: true,
        };
        init_logging(&config);
        // 第二次安装一定失败，但不会 panic
        assert!(!init_logging(&config));
    }

    #[test]
    fn test_console_disabled() {
        let config = LoggingConfig {
            level: LogLevel::Info,
            log_to_console: false,
        };
        assert!(!init_logging(&config));
    }
}
