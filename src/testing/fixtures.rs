//! # 测试数据 Fixtures
//!
//! 提供测试用的配置、元数据与捕获事实的预设数据。

use std::sync::Arc;

use serde_json::Value;

use super::mocks::RecordingSink;
use crate::client::ClientMetadata;
use crate::config::ObserverConfig;
use crate::observer::Observer;
use crate::payload::{CapturedRequest, CapturedResponse};

/// 离线测试配置，启用调试日志
#[must_use]
pub fn test_config() -> ObserverConfig {
    ObserverConfig {
        api_key: "key_test".to_string(),
        debug: true,
        ..ObserverConfig::default()
    }
}

/// 携带头与消息体脱敏规则的测试配置
#[must_use]
pub fn redacting_config() -> ObserverConfig {
    ObserverConfig {
        redact_headers: vec!["authorization".to_string(), "x-api-key".to_string()],
        redact_request_body: vec!["$.password".to_string(), "$.card.number".to_string()],
        redact_response_body: vec!["$.token".to_string()],
        ..test_config()
    }
}

/// 测试项目元数据
#[must_use]
pub fn test_metadata() -> ClientMetadata {
    ClientMetadata {
        project_id: "proj_test".to_string(),
        topic_id: "topic_test".to_string(),
        pubsub_project_id: String::new(),
        pubsub_push_service_account: Value::Null,
    }
}

/// 装配一个投递到记录端点的观察器
///
/// 跳过元数据拉取，后台任务在当前运行时中启动，
/// 需要在 tokio 运行时内调用。
#[must_use]
pub fn observer_with_recorder(config: ObserverConfig) -> (Observer, RecordingSink) {
    let sink = RecordingSink::new();
    let observer = Observer::init_with_sink(config, Some(test_metadata()), Arc::new(sink.clone()))
        .expect("测试观察器应可初始化");
    (observer, sink)
}

/// 预填充的 JSON 请求捕获
#[must_use]
pub fn json_request() -> CapturedRequest {
    let mut request = CapturedRequest {
        method: "POST".to_string(),
        host: "api.example.test".to_string(),
        raw_url: "/v1/orders?expand=items".to_string(),
        url_path: "/v1/orders".to_string(),
        body: r#"{"password":"p@ssw0rd","item":"book"}"#.to_string(),
        ..CapturedRequest::default()
    };
    request.headers.insert(
        "authorization".to_string(),
        vec!["Bearer secret-token".to_string()],
    );
    request.headers.insert(
        "content-type".to_string(),
        vec!["application/json".to_string()],
    );
    request
        .query_params
        .insert("expand".to_string(), vec!["items".to_string()]);
    request
}

/// 预填充的 JSON 响应捕获
#[must_use]
pub fn json_response() -> CapturedResponse {
    let mut response = CapturedResponse {
        status_code: 200,
        body: r#"{"token":"tkn_1","status":"created"}"#.to_string(),
        ..CapturedResponse::default()
    };
    response.headers.insert(
        "content-type".to_string(),
        vec!["application/json".to_string()],
    );
    response
}
