//! # 日志模块
//!
//! 提供统一的结构化日志宏与初始化入口。所有日志都携带
//! `request_id`、生命周期阶段与来源组件三个字段，便于按请求聚合检索。

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// SDK 初始化
    Startup,
    /// 请求进入
    RequestStart,
    /// 业务处理中
    Handling,
    /// 响应发出
    ResponseSend,
    /// 载荷投递
    Publish,
    /// 后台任务
    BackgroundTask,
    /// 外部接口调用
    ExternalApi,
    /// 内部流转
    Internal,
    /// 错误路径
    Error,
}

impl LogStage {
    /// 日志字段中使用的阶段名
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::RequestStart => "request_start",
            Self::Handling => "handling",
            Self::ResponseSend => "response_send",
            Self::Publish => "publish",
            Self::BackgroundTask => "background_task",
            Self::ExternalApi => "external_api",
            Self::Internal => "internal",
            Self::Error => "error",
        }
    }
}

/// 日志来源组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 观察器入口
    Observer,
    /// 配置加载
    Config,
    /// 钩子流水线
    Pipeline,
    /// 计时注册表
    Timing,
    /// 请求上下文
    Context,
    /// 脱敏引擎
    Redaction,
    /// 发布器
    Publisher,
    /// 元数据客户端
    MetadataClient,
    /// 框架中间件
    Middleware,
}

impl LogComponent {
    /// 日志字段中使用的组件名
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observer => "observer",
            Self::Config => "config",
            Self::Pipeline => "pipeline",
            Self::Timing => "timing",
            Self::Context => "context",
            Self::Redaction => "redaction",
            Self::Publisher => "publisher",
            Self::MetadataClient => "metadata_client",
            Self::Middleware => "middleware",
        }
    }
}

/// 记录 error 级别的结构化日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $event:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            component = $component.as_str(),
            event = $event,
            $($key = ?$value,)*
            "{}",
            $message
        )
    };
}

/// 记录 warn 级别的结构化日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $event:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            component = $component.as_str(),
            event = $event,
            $($key = ?$value,)*
            "{}",
            $message
        )
    };
}

/// 记录 info 级别的结构化日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $event:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            component = $component.as_str(),
            event = $event,
            $($key = ?$value,)*
            "{}",
            $message
        )
    };
}

/// 记录 debug 级别的结构化日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $event:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            component = $component.as_str(),
            event = $event,
            $($key = ?$value,)*
            "{}",
            $message
        )
    };
}

/// 初始化全局日志订阅器
///
/// 宿主应用已有订阅器时静默让位，不会覆盖既有配置。
/// `RUST_LOG` 环境变量优先于 `debug` 参数。
pub fn init_logging(debug: bool) {
    let default_filter = if debug {
        "info,api_observer=debug"
    } else {
        "info,api_observer=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .ok();
}
