//! 核心工具函数

/// 获取当前Unix时间戳（秒）
///
/// 返回自1970年1月1日以来的秒数。
///
/// # 示例
///
/// ```rust
/// use object_bridge::core::utils::current_timestamp;
///
/// let timestamp = current_timestamp();
/// assert!(timestamp > 0);
/// ```
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
