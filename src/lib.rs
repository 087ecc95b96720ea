//! # API Observer SDK
//!
//! 进程内 HTTP 遥测采集库：捕获请求与响应、脱敏敏感信息、
//! 关联分布式调用链，并把载荷异步上报给收集端。
//! 采集失败只降级不报错，绝不影响宿主应用的请求处理。

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod observer;
pub mod payload;
pub mod pipeline;
pub mod publish;
pub mod redact;
pub mod testing;
pub mod timing;

// Re-export commonly used types
pub use client::ClientMetadata;
pub use config::{CaptureConfig, ObserverConfig, load_config, load_config_from};
pub use context::{ContextSnapshot, ErrorRecord, RequestContext, report_error, scope};
pub use error::{ObserverError, Result};
pub use logging::init_logging;
pub use middleware::{RequestId, observe};
pub use observer::Observer;
pub use payload::{Payload, PayloadBuilder};
pub use pipeline::{HookPipeline, NestedCall};
pub use publish::{EventSink, HttpSink, LogSink, Publisher};
pub use redact::{REDACTED, RedactionEngine};
pub use timing::TimingRegistry;
