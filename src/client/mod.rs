//! # 客户端元数据
//!
//! 初始化时用 API Key 向收集端换取项目元数据。
//! 401 意味着凭证本身无效，必须立即失败；
//! 其余失败由调用方决定是否降级为离线模式。

use serde::{Deserialize, Serialize};

use crate::error::{ObserverError, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 收集端返回的项目元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientMetadata {
    /// 项目标识，写入每个载荷
    pub project_id: String,
    /// 投递主题
    pub topic_id: String,
    /// 发布端项目标识（兼容字段）
    #[serde(default)]
    pub pubsub_project_id: String,
    /// 发布端凭证（兼容字段，本 SDK 不使用）
    #[serde(default)]
    pub pubsub_push_service_account: serde_json::Value,
}

/// 从收集端拉取项目元数据
pub async fn fetch_client_metadata(
    http: &reqwest::Client,
    root_url: &str,
    api_key: &str,
) -> Result<ClientMetadata> {
    let base = root_url.trim_end_matches('/');
    let url = format!("{base}/api/client_metadata");

    ldebug!(
        "system",
        LogStage::ExternalApi,
        LogComponent::MetadataClient,
        "metadata_fetch",
        "拉取项目元数据",
        url = url
    );

    let response = http
        .get(&url)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| ObserverError::network_with_source("元数据请求失败", e))?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ObserverError::auth("无效的 API Key"));
    }

    let response = response
        .error_for_status()
        .map_err(|e| ObserverError::network_with_source("元数据请求返回异常状态", e))?;

    response
        .json::<ClientMetadata>()
        .await
        .map_err(|e| ObserverError::network_with_source("元数据解析失败", e))
}
