//! # 测试 Mock 对象
//!
//! 提供投递端的 Mock 实现，用于验证发布行为而不依赖网络。

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ObserverError, Result};
use crate::payload::Payload;
use crate::publish::EventSink;

/// 记录所有投递的 Mock 端点
///
/// 克隆共享同一份记录，便于一份留在测试、一份交给发布器。
/// 发布是异步的，断言前用 [`RecordingSink::wait_for`] 等待到位。
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    published: Arc<Mutex<Vec<(String, Payload)>>>,
}

impl RecordingSink {
    /// 创建空端点
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收到的 (主题, 载荷) 列表
    #[must_use]
    pub fn published(&self) -> Vec<(String, Payload)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 已收到的载荷数
    #[must_use]
    pub fn len(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 是否尚未收到任何载荷
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 轮询等待至少 `count` 个载荷到位，超时返回 `false`
    pub async fn wait_for(&self, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.len() >= count
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, topic: &str, payload: &Payload) -> Result<()> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), payload.clone()));
        Ok(())
    }
}

/// 总是投递失败的 Mock 端点
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn publish(&self, _topic: &str, _payload: &Payload) -> Result<()> {
        Err(ObserverError::publish("mock 端点拒绝投递"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_recordings() {
        let sink = RecordingSink::new();
        let clone = sink.clone();

        let payload = crate::payload::PayloadBuilder::new(
            "proj_t",
            crate::redact::RedactionEngine::default(),
            None,
            Vec::new(),
        )
        .build(
            crate::payload::SDK_TYPE_SERVER,
            &crate::payload::CapturedExchange {
                request: crate::payload::CapturedRequest::default(),
                response: crate::payload::CapturedResponse::default(),
                duration: Duration::ZERO,
            },
            crate::context::ContextSnapshot::detached(),
        );
        clone.publish("t", &payload).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert!(sink.wait_for(1).await);
    }

    #[tokio::test]
    async fn failing_sink_always_errors() {
        let payload = crate::payload::PayloadBuilder::new(
            "proj_t",
            crate::redact::RedactionEngine::default(),
            None,
            Vec::new(),
        )
        .build(
            crate::payload::SDK_TYPE_SERVER,
            &crate::payload::CapturedExchange {
                request: crate::payload::CapturedRequest::default(),
                response: crate::payload::CapturedResponse::default(),
                duration: Duration::ZERO,
            },
            crate::context::ContextSnapshot::detached(),
        );
        assert!(FailingSink.publish("t", &payload).await.is_err());
    }
}
