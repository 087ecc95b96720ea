//! # 内置投递端点
//!
//! [`HttpSink`] 把载荷 POST 到收集端；[`LogSink`] 是离线降级端点，
//! 只把载荷写入本地日志。自定义端点实现 [`EventSink`] 即可接入。

use async_trait::async_trait;
use url::Url;

use super::EventSink;
use crate::error::{ObserverError, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use crate::payload::Payload;

/// 仅写日志的降级端点
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, topic: &str, payload: &Payload) -> Result<()> {
        let body = serde_json::to_string(payload)?;
        ldebug!(
            payload.msg_id,
            LogStage::Publish,
            LogComponent::Publisher,
            "payload_logged",
            "离线模式，载荷仅写入日志",
            topic = topic,
            bytes = body.len()
        );
        Ok(())
    }
}

/// 通过 HTTP POST 投递到收集端
///
/// 载荷发往 `{endpoint}/{topic}`，非 2xx 响应视为投递失败。
#[derive(Debug, Clone)]
pub struct HttpSink {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpSink {
    /// 创建端点
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    fn topic_url(&self, topic: &str) -> Result<Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{topic}")).map_err(|e| {
            ObserverError::publish_with_source(format!("无效的投递地址: {base}/{topic}"), e)
        })
    }
}

#[async_trait]
impl EventSink for HttpSink {
    async fn publish(&self, topic: &str, payload: &Payload) -> Result<()> {
        let url = self.topic_url(topic)?;
        self.http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ObserverError::publish_with_source("投递请求失败", e))?
            .error_for_status()
            .map_err(|e| ObserverError::publish_with_source("收集端返回异常状态", e))?;
        Ok(())
    }
}
