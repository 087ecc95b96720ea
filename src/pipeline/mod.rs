//! # 钩子流水线
//!
//! 请求生命周期的汇聚点：请求进入时登记计时并创建上下文，
//! 处理期错误登记到环境上下文，响应发出时结算时长、组装载荷并投递。
//! 同一请求的终结钩子只会产出一次非零时长，重复触发得到零时长载荷。

use std::sync::Arc;
use std::time::Instant;

use crate::client::ClientMetadata;
use crate::config::ObserverConfig;
use crate::context::{self, ContextSnapshot, RequestContext};
use crate::logging::{LogComponent, LogStage};
use crate::payload::{
    CapturedExchange, CapturedRequest, CapturedResponse, PayloadBuilder, SDK_TYPE_OUTGOING,
    SDK_TYPE_SERVER,
};
use crate::publish::Publisher;
use crate::redact::RedactionEngine;
use crate::timing::TimingRegistry;
use crate::{ldebug, linfo};

/// 请求生命周期钩子的汇聚点
#[derive(Debug)]
pub struct HookPipeline {
    timings: Arc<TimingRegistry>,
    /// 元数据缺失（离线/降级）时为空，此时终结钩子只清理计时
    builder: Option<PayloadBuilder>,
    publisher: Publisher,
    debug: bool,
}

impl HookPipeline {
    pub(crate) fn new(
        config: &ObserverConfig,
        metadata: Option<&ClientMetadata>,
        redaction: RedactionEngine,
        timings: Arc<TimingRegistry>,
        publisher: Publisher,
    ) -> Self {
        let builder = metadata.map(|m| {
            PayloadBuilder::new(
                m.project_id.clone(),
                redaction,
                config.service_version.clone(),
                config.tags.clone(),
            )
        });
        Self {
            timings,
            builder,
            publisher,
            debug: config.debug,
        }
    }

    /// 请求开始：登记计时起点并创建关联上下文
    #[must_use]
    pub fn on_request_start(&self, request_id: &str) -> Arc<RequestContext> {
        self.timings.start(request_id);
        let ctx = RequestContext::new();
        if self.debug {
            ldebug!(
                request_id,
                LogStage::RequestStart,
                LogComponent::Pipeline,
                "request_started",
                "开始采集请求",
                msg_id = ctx.correlation_id()
            );
        }
        ctx
    }

    /// 处理期错误：登记到环境上下文，调用方位置记入记录
    #[track_caller]
    pub fn on_error<E>(&self, error: &E)
    where
        E: std::error::Error,
    {
        context::report_error(error);
    }

    /// 响应发出：结算时长、组装载荷并异步投递
    ///
    /// 计时条目无论是否降级都会被取出，保证注册表不泄漏。
    pub fn on_response_send(
        &self,
        request_id: &str,
        ctx: Option<&Arc<RequestContext>>,
        request: CapturedRequest,
        response: CapturedResponse,
    ) {
        let duration = self.timings.take_elapsed(request_id);

        let Some(builder) = &self.builder else {
            ldebug!(
                request_id,
                LogStage::ResponseSend,
                LogComponent::Pipeline,
                "capture_skipped",
                "缺少项目元数据，跳过采集"
            );
            return;
        };

        let snapshot = ctx.map_or_else(ContextSnapshot::detached, |c| c.snapshot());
        let status_code = response.status_code;
        let exchange = CapturedExchange {
            request,
            response,
            duration,
        };
        let payload = builder.build(SDK_TYPE_SERVER, &exchange, snapshot);

        if self.debug {
            linfo!(
                request_id,
                LogStage::ResponseSend,
                LogComponent::Pipeline,
                "exchange_captured",
                "请求采集完成",
                msg_id = payload.msg_id,
                status_code = status_code,
                duration_ns = payload.duration,
                error_count = payload.errors.len()
            );
        }

        self.publisher.dispatch(payload);
    }

    /// 开始采集一次出站调用
    ///
    /// 消息标识全新生成；存在环境上下文时父级指向它，
    /// 否则产出无父级的独立载荷。
    #[must_use]
    pub fn start_nested(&self) -> NestedCall {
        let snapshot = RequestContext::current()
            .map_or_else(ContextSnapshot::detached, |ctx| {
                ContextSnapshot::child_of(&ctx)
            });
        NestedCall {
            snapshot,
            redaction: None,
            started: Instant::now(),
        }
    }

    /// 结束出站调用采集并投递载荷
    pub fn finish_nested(
        &self,
        call: NestedCall,
        request: CapturedRequest,
        response: CapturedResponse,
    ) {
        let Some(builder) = &self.builder else {
            ldebug!(
                call.snapshot.msg_id,
                LogStage::ResponseSend,
                LogComponent::Pipeline,
                "nested_capture_skipped",
                "缺少项目元数据，跳过出站调用采集"
            );
            return;
        };

        let exchange = CapturedExchange {
            request,
            response,
            duration: call.started.elapsed(),
        };
        let payload = match &call.redaction {
            Some(custom) => builder.build_with(SDK_TYPE_OUTGOING, &exchange, call.snapshot, custom),
            None => builder.build(SDK_TYPE_OUTGOING, &exchange, call.snapshot),
        };
        self.publisher.dispatch(payload);
    }
}

/// 出站调用的采集句柄
///
/// 在发起下游调用前创建，调用完成后连同捕获的事实交回
/// [`HookPipeline::finish_nested`] 收尾。
#[derive(Debug)]
pub struct NestedCall {
    snapshot: ContextSnapshot,
    redaction: Option<RedactionEngine>,
    started: Instant,
}

impl NestedCall {
    /// 覆盖本次调用使用的脱敏规则
    #[must_use]
    pub fn with_redaction(mut self, redaction: RedactionEngine) -> Self {
        self.redaction = Some(redaction);
        self
    }

    /// 本次出站调用的消息标识
    #[must_use]
    pub fn msg_id(&self) -> &str {
        &self.snapshot.msg_id
    }

    /// 本次出站调用的父级消息标识
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.snapshot.parent_id.as_deref()
    }
}
