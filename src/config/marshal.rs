use super::{ConfigError, ConfigResult};
use crate::impl_default;
use crate::marshal::value::DecodePolicy;
use serde::{Deserialize, Serialize};

/// 单个句柄允许的最大槽位数上限
pub const MAX_SLOTS_LIMIT: usize = 64;

/// 访问已释放对象时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StalePolicy {
    /// 抛出脚本异常
    #[default]
    Throw,
    /// 忽略本次调用，返回 undefined
    Ignore,
}

/// 封送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// 非法字节序列的处理方式
    pub decode_policy: DecodePolicy,

    /// 已释放对象的处理方式
    pub stale_policy: StalePolicy,

    /// 每个句柄的槽位数
    pub max_slots_per_handle: usize,
}

impl_default!(MarshalConfig {
    decode_policy: DecodePolicy::Lossy,
    stale_policy: StalePolicy::Throw,
    max_slots_per_handle: 4,
});

impl MarshalConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_slots_per_handle == 0 || self.max_slots_per_handle > MAX_SLOTS_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max_slots_per_handle must be in 1..={}",
                MAX_SLOTS_LIMIT
            )));
        }
        Ok(())
    }
}
