//! # 请求上下文
//!
//! 每个被观察的请求持有一个 [`RequestContext`]：关联标识、父子链路
//! 与处理期间登记的错误。上下文通过任务本地槽在 `.await` 链路内环境
//! 可见；跨 `tokio::spawn` 边界不会自动传递，需要显式携带 `Arc` 句柄。

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

tokio::task_local! {
    static CURRENT: Arc<RequestContext>;
}

/// 处理期间登记的单条错误记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorRecord {
    /// 错误发生时刻，RFC3339 毫秒精度
    pub timestamp: String,
    /// 错误的 Rust 类型名
    pub error_type: String,
    /// 错误描述
    pub message: String,
    /// 登记位置（文件:行:列）
    pub stack_trace: String,
    /// 错误链根因的描述，没有来源链时缺省
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_error_message: Option<String>,
}

impl ErrorRecord {
    /// 手工构造一条错误记录
    #[must_use]
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            error_type: error_type.into(),
            message: message.into(),
            stack_trace: stack_trace.into(),
            root_error_message: None,
        }
    }

    /// 从一个具体错误构造记录，保留类型名与根因
    #[must_use]
    pub fn from_error<E>(error: &E, location: &'static Location<'static>) -> Self
    where
        E: std::error::Error,
    {
        let mut record = Self::new(
            std::any::type_name::<E>(),
            error.to_string(),
            location.to_string(),
        );
        record.root_error_message = root_cause(error);
        record
    }
}

fn root_cause(error: &dyn std::error::Error) -> Option<String> {
    let mut source = error.source()?;
    while let Some(next) = source.source() {
        source = next;
    }
    Some(source.to_string())
}

/// 一次 HTTP 交换的关联上下文
#[derive(Debug)]
pub struct RequestContext {
    correlation_id: String,
    parent_id: Option<String>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl RequestContext {
    /// 创建根上下文：全新关联标识，无父级
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            correlation_id: Uuid::new_v4().to_string(),
            parent_id: None,
            errors: Mutex::new(Vec::new()),
        })
    }

    /// 派生子上下文：全新关联标识，父级指向当前上下文
    #[must_use]
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            correlation_id: Uuid::new_v4().to_string(),
            parent_id: Some(self.correlation_id.clone()),
            errors: Mutex::new(Vec::new()),
        })
    }

    /// 本次交换的消息标识
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// 父级消息标识
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// 登记一条错误记录
    pub fn append_error(&self, record: ErrorRecord) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// 当前时刻的不可变快照
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            msg_id: self.correlation_id.clone(),
            parent_id: self.parent_id.clone(),
            errors: self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// 环境中当前生效的上下文
    #[must_use]
    pub fn current() -> Option<Arc<Self>> {
        CURRENT.try_with(Arc::clone).ok()
    }
}

/// 上下文在载荷构建时刻的不可变快照
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    /// 消息标识
    pub msg_id: String,
    /// 父级消息标识
    pub parent_id: Option<String>,
    /// 已登记的错误
    pub errors: Vec<ErrorRecord>,
}

impl ContextSnapshot {
    /// 无上下文时的兜底快照：全新消息标识，无父级，无错误
    #[must_use]
    pub fn detached() -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            parent_id: None,
            errors: Vec::new(),
        }
    }

    /// 从现有上下文派生出站调用的快照：
    /// 全新消息标识，父级指向该上下文
    #[must_use]
    pub fn child_of(ctx: &RequestContext) -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            parent_id: Some(ctx.correlation_id().to_string()),
            errors: Vec::new(),
        }
    }
}

/// 在给定上下文中运行 future，使其在整条 `.await` 链路内环境可见
pub async fn scope<F>(ctx: Arc<RequestContext>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, fut).await
}

/// 将一个错误登记到环境上下文
///
/// 调用方所在位置会被记录为 `stack_trace`。
/// 脱离任何上下文调用时静默丢弃，绝不影响宿主请求。
#[track_caller]
pub fn report_error<E>(error: &E)
where
    E: std::error::Error,
{
    let record = ErrorRecord::from_error(error, Location::caller());
    if let Some(ctx) = RequestContext::current() {
        ctx.append_error(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn root_context_has_no_parent() {
        let ctx = RequestContext::new();
        assert!(!ctx.correlation_id().is_empty());
        assert!(ctx.parent_id().is_none());
    }

    #[test]
    fn child_links_to_parent() {
        let parent = RequestContext::new();
        let child = parent.child();
        assert_ne!(child.correlation_id(), parent.correlation_id());
        assert_eq!(child.parent_id(), Some(parent.correlation_id()));
        assert!(child.snapshot().errors.is_empty());
    }

    #[test]
    fn snapshot_clones_errors() {
        let ctx = RequestContext::new();
        ctx.append_error(ErrorRecord::new("io", "磁盘已满", "src/x.rs:1:1"));
        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.errors[0].message, "磁盘已满");

        // 快照之后的追加不影响已取得的快照
        ctx.append_error(ErrorRecord::new("io", "第二条", "src/x.rs:2:1"));
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(ctx.snapshot().errors.len(), 2);
    }

    #[test]
    fn error_record_keeps_type_name_and_root_cause() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "缺少文件");
        let outer = crate::error::ObserverError::config_with_source("加载失败", inner);
        let record = ErrorRecord::from_error(&outer, Location::caller());

        assert!(record.error_type.contains("ObserverError"));
        assert!(record.message.contains("加载失败"));
        assert_eq!(record.root_error_message.as_deref(), Some("缺少文件"));
        assert!(record.stack_trace.contains(".rs"));
    }

    #[tokio::test]
    async fn scope_makes_context_visible() {
        let ctx = RequestContext::new();
        let id = ctx.correlation_id().to_string();

        let seen = scope(Arc::clone(&ctx), async move {
            RequestContext::current().map(|c| c.correlation_id().to_string())
        })
        .await;

        assert_eq!(seen, Some(id));
        assert!(RequestContext::current().is_none());
    }

    #[tokio::test]
    async fn report_error_reaches_ambient_context() {
        let ctx = RequestContext::new();
        scope(Arc::clone(&ctx), async {
            let err = io::Error::new(io::ErrorKind::BrokenPipe, "管道断开");
            report_error(&err);
        })
        .await;

        let errors = ctx.snapshot().errors;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].error_type.starts_with("std::io"));
        assert!(errors[0].message.contains("管道断开"));
    }

    #[tokio::test]
    async fn report_error_without_context_is_silent() {
        let err = io::Error::other("无人接收");
        report_error(&err);
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit_scope() {
        let ctx = RequestContext::new();
        let inherited = scope(ctx, async {
            tokio::spawn(async { RequestContext::current().is_some() })
                .await
                .expect("任务应正常结束")
        })
        .await;
        assert!(!inherited);
    }
}
