//! # 发布通道
//!
//! 载荷通过 [`EventSink`] 抽象投递，默认实现见 [`sinks`]。
//! 发布是即发即忘的：投递在独立任务中进行，失败只记日志，
//! 绝不阻塞请求路径，也绝不向宿主应用冒泡。

mod sinks;

pub use sinks::{HttpSink, LogSink};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::payload::Payload;
use crate::{ldebug, lwarn};

/// 遥测载荷的投递端点抽象
#[async_trait]
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// 将载荷投递到指定主题
    async fn publish(&self, topic: &str, payload: &Payload) -> Result<()>;
}

/// 即发即忘的发布器
#[derive(Debug, Clone)]
pub struct Publisher {
    sink: Arc<dyn EventSink>,
    topic: Option<String>,
    debug: bool,
}

impl Publisher {
    /// 创建发布器；`topic` 缺省时所有载荷被静默丢弃
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, topic: Option<String>, debug: bool) -> Self {
        Self { sink, topic, debug }
    }

    /// 异步投递一个载荷
    pub fn dispatch(&self, payload: Payload) {
        let Some(topic) = self.topic.clone() else {
            ldebug!(
                payload.msg_id,
                LogStage::Publish,
                LogComponent::Publisher,
                "publish_skipped",
                "未配置投递主题，丢弃载荷"
            );
            return;
        };

        let sink = Arc::clone(&self.sink);
        let debug = self.debug;
        tokio::spawn(async move {
            if let Err(error) = sink.publish(&topic, &payload).await {
                lwarn!(
                    payload.msg_id,
                    LogStage::Publish,
                    LogComponent::Publisher,
                    "publish_failed",
                    "载荷投递失败",
                    topic = topic,
                    category = error.category(),
                    error = error
                );
            } else if debug {
                ldebug!(
                    payload.msg_id,
                    LogStage::Publish,
                    LogComponent::Publisher,
                    "publish_ok",
                    "载荷投递成功",
                    topic = topic
                );
            }
        });
    }
}
