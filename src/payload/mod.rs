//! # 遥测载荷
//!
//! 定义捕获事实的中间结构与上报载荷，并在构建时统一套用脱敏。
//! 消息体在脱敏之后再做 Base64 编码，任意字节内容都能以文本形式传输。

use base64::{Engine as _, engine::general_purpose};
use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::context::{ContextSnapshot, ErrorRecord};
use crate::redact::RedactionEngine;

/// 服务端中间件采集的 SDK 标识
pub const SDK_TYPE_SERVER: &str = "RustAxum";

/// 出站调用采集的 SDK 标识
pub const SDK_TYPE_OUTGOING: &str = "RustOutgoing";

/// 捕获的请求侧事实
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// HTTP 方法
    pub method: String,
    /// 目标主机
    pub host: String,
    /// 含查询串的原始地址
    pub raw_url: String,
    /// 路由模板（未匹配路由时为原始路径）
    pub url_path: String,
    /// 路径参数
    pub path_params: IndexMap<String, String>,
    /// 查询参数，同名键聚合为列表
    pub query_params: IndexMap<String, Vec<String>>,
    /// 请求头，同名头聚合为列表
    pub headers: IndexMap<String, Vec<String>>,
    /// 请求体（脱敏前）
    pub body: String,
    /// 协议主版本号
    pub proto_major: u8,
    /// 协议次版本号
    pub proto_minor: u8,
}

impl Default for CapturedRequest {
    fn default() -> Self {
        Self {
            method: String::new(),
            host: String::new(),
            raw_url: String::new(),
            url_path: String::new(),
            path_params: IndexMap::new(),
            query_params: IndexMap::new(),
            headers: IndexMap::new(),
            body: String::new(),
            proto_major: 1,
            proto_minor: 1,
        }
    }
}

/// 捕获的响应侧事实
#[derive(Debug, Clone, Default)]
pub struct CapturedResponse {
    /// 状态码
    pub status_code: u16,
    /// 响应头，同名头聚合为列表
    pub headers: IndexMap<String, Vec<String>>,
    /// 响应体（脱敏前）
    pub body: String,
}

/// 一次完整的请求-响应交换
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    /// 请求侧事实
    pub request: CapturedRequest,
    /// 响应侧事实
    pub response: CapturedResponse,
    /// 从请求进入到响应发出的时长
    pub duration: Duration,
}

/// 上报给收集端的遥测载荷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    /// 处理时长（纳秒）
    pub duration: u64,
    /// 目标主机
    pub host: String,
    /// HTTP 方法
    pub method: String,
    /// 路径参数
    pub path_params: IndexMap<String, String>,
    /// 项目标识
    pub project_id: String,
    /// 协议主版本号
    pub proto_major: u8,
    /// 协议次版本号
    pub proto_minor: u8,
    /// 查询参数
    pub query_params: IndexMap<String, Vec<String>>,
    /// 含查询串的原始地址
    pub raw_url: String,
    /// Referer 头的首值，缺省为空串
    pub referer: String,
    /// 脱敏后 Base64 编码的请求体
    pub request_body: String,
    /// 脱敏后的请求头
    pub request_headers: IndexMap<String, Vec<String>>,
    /// 脱敏后 Base64 编码的响应体
    pub response_body: String,
    /// 脱敏后的响应头
    pub response_headers: IndexMap<String, Vec<String>>,
    /// 采集端标识
    pub sdk_type: String,
    /// 状态码
    pub status_code: u16,
    /// 载荷构建时刻，RFC3339 毫秒精度
    pub timestamp: String,
    /// 路由模板
    pub url_path: String,
    /// 处理期间登记的错误
    pub errors: Vec<ErrorRecord>,
    /// 消息标识
    pub msg_id: String,
    /// 父级消息标识
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// 宿主服务版本号
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    /// 自定义标签
    pub tags: Vec<String>,
}

/// 载荷构建器
///
/// 持有项目静态信息与默认脱敏引擎，每次构建产出一个独立载荷。
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    project_id: String,
    service_version: Option<String>,
    tags: Vec<String>,
    redaction: RedactionEngine,
}

impl PayloadBuilder {
    /// 创建构建器
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        redaction: RedactionEngine,
        service_version: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            service_version,
            tags,
            redaction,
        }
    }

    /// 用默认脱敏引擎构建载荷
    #[must_use]
    pub fn build(
        &self,
        sdk_type: &str,
        exchange: &CapturedExchange,
        snapshot: ContextSnapshot,
    ) -> Payload {
        self.build_with(sdk_type, exchange, snapshot, &self.redaction)
    }

    /// 用指定脱敏引擎构建载荷（出站调用可覆盖规则）
    #[must_use]
    pub fn build_with(
        &self,
        sdk_type: &str,
        exchange: &CapturedExchange,
        snapshot: ContextSnapshot,
        redaction: &RedactionEngine,
    ) -> Payload {
        let request = &exchange.request;
        let response = &exchange.response;

        // Referer 取自原始头，置换发生在其后
        let referer = request
            .headers
            .get("referer")
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or_default();

        Payload {
            duration: u64::try_from(exchange.duration.as_nanos()).unwrap_or(u64::MAX),
            host: request.host.clone(),
            method: request.method.clone(),
            path_params: request.path_params.clone(),
            project_id: self.project_id.clone(),
            proto_major: request.proto_major,
            proto_minor: request.proto_minor,
            query_params: request.query_params.clone(),
            raw_url: request.raw_url.clone(),
            referer,
            request_body: general_purpose::STANDARD
                .encode(redaction.redact_request_body(&request.body)),
            request_headers: redaction.redact_headers(&request.headers),
            response_body: general_purpose::STANDARD
                .encode(redaction.redact_response_body(&response.body)),
            response_headers: redaction.redact_headers(&response.headers),
            sdk_type: sdk_type.to_string(),
            status_code: response.status_code,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            url_path: request.url_path.clone(),
            errors: snapshot.errors,
            msg_id: snapshot.msg_id,
            parent_id: snapshot.parent_id,
            service_version: self.service_version.clone(),
            tags: self.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redact::REDACTED;

    fn builder() -> PayloadBuilder {
        let redaction = RedactionEngine::new(
            &["authorization".to_string()],
            &["$.password".to_string()],
            &["$.token".to_string()],
        )
        .expect("规则应可编译");
        PayloadBuilder::new(
            "proj_1",
            redaction,
            Some("1.2.3".to_string()),
            vec!["edge".to_string()],
        )
    }

    fn exchange() -> CapturedExchange {
        let mut request = CapturedRequest {
            method: "POST".to_string(),
            host: "api.example.test".to_string(),
            raw_url: "/login?next=%2Fhome".to_string(),
            url_path: "/login".to_string(),
            body: r#"{"password":"p@ss","user":"u"}"#.to_string(),
            ..CapturedRequest::default()
        };
        request.headers.insert(
            "authorization".to_string(),
            vec!["Bearer secret".to_string()],
        );
        request.headers.insert(
            "referer".to_string(),
            vec!["https://app.example.test/".to_string()],
        );

        let response = CapturedResponse {
            status_code: 201,
            headers: IndexMap::new(),
            body: r#"{"token":"t0k","ok":true}"#.to_string(),
        };

        CapturedExchange {
            request,
            response,
            duration: Duration::from_millis(12),
        }
    }

    fn decode(encoded: &str) -> String {
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .expect("应为合法 Base64");
        String::from_utf8(bytes).expect("应为 UTF-8")
    }

    #[test]
    fn build_applies_redaction_then_base64() {
        let payload = builder().build(SDK_TYPE_SERVER, &exchange(), ContextSnapshot::detached());

        assert_eq!(
            payload.request_headers["authorization"],
            vec![REDACTED.to_string()]
        );
        let request_body = decode(&payload.request_body);
        assert!(request_body.contains(r#""password":"[CLIENT_REDACTED]""#));
        assert!(request_body.contains(r#""user":"u""#));

        let response_body = decode(&payload.response_body);
        assert!(response_body.contains(r#""token":"[CLIENT_REDACTED]""#));
        assert!(response_body.contains(r#""ok":true"#));
    }

    #[test]
    fn build_fills_static_and_timing_fields() {
        let payload = builder().build(SDK_TYPE_SERVER, &exchange(), ContextSnapshot::detached());

        assert_eq!(payload.project_id, "proj_1");
        assert_eq!(payload.sdk_type, "RustAxum");
        assert_eq!(payload.duration, 12_000_000);
        assert_eq!(payload.status_code, 201);
        assert_eq!(payload.proto_major, 1);
        assert_eq!(payload.proto_minor, 1);
        assert_eq!(payload.referer, "https://app.example.test/");
        assert_eq!(payload.service_version.as_deref(), Some("1.2.3"));
        assert_eq!(payload.tags, vec!["edge".to_string()]);
        assert!(payload.timestamp.ends_with('Z'));
    }

    #[test]
    fn referer_defaults_to_empty() {
        let mut exchange = exchange();
        exchange.request.headers.shift_remove("referer");
        let payload = builder().build(SDK_TYPE_SERVER, &exchange, ContextSnapshot::detached());
        assert_eq!(payload.referer, "");
    }

    #[test]
    fn snapshot_fields_flow_into_payload() {
        let ctx = crate::context::RequestContext::new();
        ctx.append_error(crate::context::ErrorRecord::new(
            "io",
            "下游超时",
            "src/y.rs:3:7",
        ));
        let payload = builder().build(SDK_TYPE_SERVER, &exchange(), ctx.snapshot());

        assert_eq!(payload.msg_id, ctx.correlation_id());
        assert!(payload.parent_id.is_none());
        assert_eq!(payload.errors.len(), 1);
        assert_eq!(payload.errors[0].message, "下游超时");
    }

    #[test]
    fn absent_parent_id_is_omitted_from_json() {
        let payload = builder().build(SDK_TYPE_SERVER, &exchange(), ContextSnapshot::detached());
        let json = serde_json::to_string(&payload).expect("载荷应可序列化");
        assert!(!json.contains("parent_id"));

        let snapshot = ContextSnapshot {
            parent_id: Some("parent-1".to_string()),
            ..ContextSnapshot::detached()
        };
        let payload = builder().build(SDK_TYPE_OUTGOING, &exchange(), snapshot);
        let json = serde_json::to_string(&payload).expect("载荷应可序列化");
        assert!(json.contains(r#""parent_id":"parent-1""#));
    }

    #[test]
    fn custom_engine_overrides_default_rules() {
        let empty = RedactionEngine::default();
        let payload =
            builder().build_with(SDK_TYPE_OUTGOING, &exchange(), ContextSnapshot::detached(), &empty);

        // 空规则引擎不动消息体，但 Cookie 之外的头也原样保留
        let request_body = decode(&payload.request_body);
        assert!(request_body.contains(r#""password":"p@ss""#));
        assert_eq!(
            payload.request_headers["authorization"],
            vec!["Bearer secret".to_string()]
        );
    }
}
