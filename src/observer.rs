//! # 观察器入口
//!
//! SDK 的装配点：加载配置、拉取项目元数据、编译脱敏规则、
//! 启动后台清理任务，并把各部件装配成请求钩子流水线。
//! 元数据拉取失败（认证失败除外）时进入降级模式，只透传不上报。

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::client::{self, ClientMetadata};
use crate::config::ObserverConfig;
use crate::error::{Context as _, ErrorCategory, Result};
use crate::logging::{LogComponent, LogStage};
use crate::pipeline::HookPipeline;
use crate::publish::{EventSink, HttpSink, LogSink, Publisher};
use crate::redact::RedactionEngine;
use crate::timing::TimingRegistry;
use crate::{linfo, lwarn};

/// SDK 总入口
///
/// 克隆成本低（内部共享），可直接放入 axum 状态或全局持有。
/// 最后一个句柄释放时后台清理任务随之停止。
#[derive(Debug, Clone)]
pub struct Observer {
    inner: Arc<ObserverInner>,
}

#[derive(Debug)]
struct ObserverInner {
    config: ObserverConfig,
    metadata: Option<ClientMetadata>,
    pipeline: HookPipeline,
    sweeper: tokio::task::JoinHandle<()>,
}

impl Drop for ObserverInner {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

impl Observer {
    /// 按配置初始化观察器
    ///
    /// 未配置收集端地址时直接进入离线模式；配置了地址则拉取
    /// 项目元数据。认证失败立即返回错误，其余拉取失败降级为
    /// 只透传不上报。
    pub async fn init(config: ObserverConfig) -> Result<Self> {
        let metadata = Self::resolve_metadata(&config).await?;
        let sink: Arc<dyn EventSink> = match (&config.root_url, &metadata) {
            (Some(root_url), Some(_)) => Arc::new(HttpSink::new(events_endpoint(root_url)?)),
            _ => Arc::new(LogSink),
        };
        Self::init_with_sink(config, metadata, sink)
    }

    /// 以注入的投递端装配观察器
    ///
    /// 跳过元数据拉取，供测试和自定义传输使用。`metadata` 为空时
    /// 观察器处于降级模式。
    pub fn init_with_sink(
        config: ObserverConfig,
        metadata: Option<ClientMetadata>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let redaction = RedactionEngine::from_config(&config)?;

        let timings = Arc::new(TimingRegistry::new());
        let sweeper = timings.spawn_sweeper(
            Duration::from_secs(config.capture.sweep_interval_secs),
            Duration::from_secs(config.capture.stale_after_secs),
        );

        let topic = metadata.as_ref().map(|m| m.topic_id.clone());
        let publisher = Publisher::new(sink, topic, config.debug);
        let pipeline = HookPipeline::new(
            &config,
            metadata.as_ref(),
            redaction,
            Arc::clone(&timings),
            publisher,
        );

        let mode = if metadata.is_some() {
            "online"
        } else if config.is_offline() {
            "offline"
        } else {
            "degraded"
        };
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Observer,
            "observer_ready",
            "观察器初始化完成",
            mode = mode,
            debug = config.debug
        );

        Ok(Self {
            inner: Arc::new(ObserverInner {
                config,
                metadata,
                pipeline,
                sweeper,
            }),
        })
    }

    async fn resolve_metadata(config: &ObserverConfig) -> Result<Option<ClientMetadata>> {
        let Some(root_url) = &config.root_url else {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Observer,
                "offline_mode",
                "未配置收集端地址，进入离线模式"
            );
            return Ok(None);
        };

        let http = reqwest::Client::new();
        match client::fetch_client_metadata(&http, root_url, &config.api_key).await {
            Ok(metadata) => Ok(Some(metadata)),
            // 调用方错误（凭证无效等）必须立刻暴露而不是静默降级
            Err(err) if err.category() == ErrorCategory::Client => Err(err),
            Err(err) => {
                lwarn!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Observer,
                    "metadata_fetch_failed",
                    "拉取项目元数据失败，降级为只透传",
                    category = err.category(),
                    error = err
                );
                Ok(None)
            }
        }
    }

    /// 请求生命周期钩子流水线
    #[must_use]
    pub fn pipeline(&self) -> &HookPipeline {
        &self.inner.pipeline
    }

    /// 当前生效的配置
    #[must_use]
    pub fn config(&self) -> &ObserverConfig {
        &self.inner.config
    }

    /// 元数据中的项目标识
    ///
    /// 离线或降级模式下没有元数据，返回 `None`。
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.inner
            .metadata
            .as_ref()
            .map(|metadata| metadata.project_id.as_str())
    }
}

fn events_endpoint(root_url: &str) -> Result<Url> {
    let base = root_url.trim_end_matches('/');
    Url::parse(&format!("{base}/api/events")).context("解析上报地址失败")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_endpoint_normalizes_trailing_slash() {
        let url = events_endpoint("https://collect.example.com/").expect("地址应可解析");
        assert_eq!(url.as_str(), "https://collect.example.com/api/events");
    }

    #[tokio::test]
    async fn offline_config_initializes_without_network() {
        let config = ObserverConfig {
            debug: true,
            ..ObserverConfig::default()
        };
        let observer = Observer::init(config).await.expect("离线初始化应成功");
        assert!(observer.config().is_offline());
        assert!(observer.project_id().is_none());
    }
}
