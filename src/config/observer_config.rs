//! # 观察器配置结构定义

use serde::{Deserialize, Serialize};

/// SDK 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// 项目 API Key，用于拉取客户端元数据
    #[serde(default)]
    pub api_key: String,
    /// 收集端根地址；缺省时 SDK 进入离线降级模式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    /// 需要脱敏的请求/响应头规则（大小写不敏感，规则串包含头名即命中）
    #[serde(default)]
    pub redact_headers: Vec<String>,
    /// 请求体脱敏字段路径
    #[serde(default)]
    pub redact_request_body: Vec<String>,
    /// 响应体脱敏字段路径
    #[serde(default)]
    pub redact_response_body: Vec<String>,
    /// 是否输出调试日志
    #[serde(default)]
    pub debug: bool,
    /// 宿主服务版本号，原样写入每个遥测载荷
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    /// 自定义标签，原样写入每个遥测载荷
    #[serde(default)]
    pub tags: Vec<String>,
    /// 捕获与后台清理行为
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl ObserverConfig {
    /// 是否处于离线模式（不拉取元数据、不上报）
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.root_url.is_none()
    }
}

/// 捕获与后台清理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// 单侧消息体的最大捕获字节数，超限则跳过捕获（不影响透传）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// 计时条目视为孤儿的秒数
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// 孤儿清理任务的扫描间隔（秒）
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            stale_after_secs: default_stale_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

const fn default_stale_after_secs() -> u64 {
    1800
}

const fn default_sweep_interval_secs() -> u64 {
    60
}
