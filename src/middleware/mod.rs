//! # axum 采集中间件
//!
//! 在请求进入时捕获方法、地址、头与消息体，在响应发出后捕获
//! 状态与响应事实，交给钩子流水线组装上报。处理函数在请求
//! 上下文作用域内执行，期间登记的错误会进入同一载荷。
//! 客户端可见的响应原样返回，不添加、不改写任何头或字节。
//!
//! 经 [`axum::Router::route_layer`] 挂载时可见路由模板与路径参数；
//! 经 `layer` 挂载时回退到原始路径，但能观察到未匹配路由的请求。

use std::sync::Arc;

use axum::body::{Body, HttpBody as _, to_bytes};
use axum::extract::{FromRequestParts, MatchedPath, RawPathParams, Request, State};
use axum::http::request::Parts as RequestParts;
use axum::http::response::Parts as ResponseParts;
use axum::http::{HeaderMap, HeaderValue, Version, header};
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;
use std::ops::Deref;
use uuid::Uuid;

use crate::context;
use crate::observer::Observer;
use crate::payload::{CapturedRequest, CapturedResponse};

/// 请求ID类型
#[derive(Debug, Clone)]
pub struct RequestId(String);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for RequestId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// 采集中间件
///
/// 与 [`axum::middleware::from_fn_with_state`] 配合使用：
///
/// ```ignore
/// let app = Router::new()
///     .route("/users/{id}", get(handler))
///     .route_layer(middleware::from_fn_with_state(observer.clone(), observe));
/// ```
pub async fn observe(
    State(observer): State<Observer>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = RequestId::new();
    let max_body_bytes = observer.config().capture.max_body_bytes;

    let (mut parts, body) = request.into_parts();
    // 路由模板与路径参数由路由阶段写入扩展，layer 挂载时不存在
    let url_path = parts
        .extensions
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());
    let path_params = extract_path_params(&mut parts).await;
    let (body, request_capture) = buffer_body(body, max_body_bytes).await;
    drop_stale_length(&mut parts.headers, &request_capture);
    let captured_request = capture_request(&parts, request_capture.bytes(), path_params, url_path);

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(request_id.clone());

    let pipeline = observer.pipeline();
    let ctx = pipeline.on_request_start(request_id.as_str());
    let response = context::scope(Arc::clone(&ctx), next.run(request)).await;

    let (mut parts, body) = response.into_parts();
    let (body, response_capture) = buffer_body(body, max_body_bytes).await;
    drop_stale_length(&mut parts.headers, &response_capture);
    let captured_response = capture_response(&parts, response_capture.bytes());
    pipeline.on_response_send(
        request_id.as_str(),
        Some(&ctx),
        captured_request,
        captured_response,
    );

    Response::from_parts(parts, body)
}

async fn extract_path_params(parts: &mut RequestParts) -> IndexMap<String, String> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(_) => IndexMap::new(),
    }
}

/// 消息体缓冲结果
#[derive(Debug)]
enum BodyCapture {
    /// 已读入内存，原始字节可供捕获
    Captured(Bytes),
    /// 流式或超限，原样放行不捕获
    Skipped,
    /// 读取失败，消息体已被置空
    Failed,
}

impl BodyCapture {
    fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Captured(bytes) => Some(bytes),
            Self::Skipped | Self::Failed => None,
        }
    }
}

/// 在限额内缓冲消息体
///
/// 只有尺寸已知且不超限的消息体才会被读入内存，其余（流式或超限）
/// 原样放行且不捕获，透传行为不受影响。
async fn buffer_body(body: Body, max_bytes: usize) -> (Body, BodyCapture) {
    let within_limit = body
        .size_hint()
        .exact()
        .and_then(|size| usize::try_from(size).ok())
        .is_some_and(|size| size <= max_bytes);
    if !within_limit {
        return (body, BodyCapture::Skipped);
    }

    match to_bytes(body, max_bytes).await {
        Ok(bytes) => (Body::from(bytes.clone()), BodyCapture::Captured(bytes)),
        // 读取失败意味着连接已不可用，留空消息体
        Err(_) => (Body::empty(), BodyCapture::Failed),
    }
}

/// 消息体被置空后撤掉长度声明，头不能声明实际没有的字节
fn drop_stale_length(headers: &mut HeaderMap, capture: &BodyCapture) {
    if matches!(capture, BodyCapture::Failed) {
        headers.remove(header::CONTENT_LENGTH);
    }
}

fn capture_request(
    parts: &RequestParts,
    body: Option<&Bytes>,
    path_params: IndexMap<String, String>,
    url_path: Option<String>,
) -> CapturedRequest {
    let (proto_major, proto_minor) = protocol_version(parts.version);
    let host = parts
        .uri
        .host()
        .map(ToString::to_string)
        .or_else(|| header_text(parts.headers.get(header::HOST)))
        .unwrap_or_default();

    CapturedRequest {
        method: parts.method.as_str().to_string(),
        host,
        raw_url: parts.uri.to_string(),
        url_path: url_path.unwrap_or_else(|| parts.uri.path().to_string()),
        path_params,
        query_params: parse_query(parts.uri.query()),
        headers: header_map(&parts.headers),
        body: body_text(body),
        proto_major,
        proto_minor,
    }
}

fn capture_response(parts: &ResponseParts, body: Option<&Bytes>) -> CapturedResponse {
    CapturedResponse {
        status_code: parts.status.as_u16(),
        headers: header_map(&parts.headers),
        body: body_text(body),
    }
}

fn protocol_version(version: Version) -> (u8, u8) {
    if version == Version::HTTP_09 {
        (0, 9)
    } else if version == Version::HTTP_10 {
        (1, 0)
    } else if version == Version::HTTP_2 {
        (2, 0)
    } else if version == Version::HTTP_3 {
        (3, 0)
    } else {
        (1, 1)
    }
}

fn parse_query(query: Option<&str>) -> IndexMap<String, Vec<String>> {
    let mut params: IndexMap<String, Vec<String>> = IndexMap::new();
    let Some(query) = query else {
        return params;
    };
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

fn header_map(headers: &HeaderMap) -> IndexMap<String, Vec<String>> {
    let mut map: IndexMap<String, Vec<String>> = IndexMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

fn header_text(value: Option<&HeaderValue>) -> Option<String> {
    value.map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

fn body_text(body: Option<&Bytes>) -> String {
    body.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_groups_repeated_names() {
        let params = parse_query(Some("tag=a&tag=b&page=1"));
        assert_eq!(params["tag"], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(params["page"], vec!["1".to_string()]);
    }

    #[test]
    fn parse_query_decodes_percent_escapes() {
        let params = parse_query(Some("next=%2Fhome&q=a%20b"));
        assert_eq!(params["next"], vec!["/home".to_string()]);
        assert_eq!(params["q"], vec!["a b".to_string()]);
    }

    #[test]
    fn parse_query_handles_absent_query() {
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn header_map_groups_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.insert("host", HeaderValue::from_static("example.test"));

        let map = header_map(&headers);
        assert_eq!(map["accept"].len(), 2);
        assert_eq!(map["host"], vec!["example.test".to_string()]);
    }

    #[test]
    fn protocol_version_maps_known_versions() {
        assert_eq!(protocol_version(Version::HTTP_10), (1, 0));
        assert_eq!(protocol_version(Version::HTTP_11), (1, 1));
        assert_eq!(protocol_version(Version::HTTP_2), (2, 0));
    }

    #[tokio::test]
    async fn buffer_body_captures_small_exact_body() {
        let body = Body::from("hello");
        let (_rebuilt, capture) = buffer_body(body, 1024).await;
        assert_eq!(
            capture.bytes().map(|bytes| bytes.as_ref()),
            Some(b"hello".as_slice())
        );
    }

    #[tokio::test]
    async fn buffer_body_skips_oversized_body() {
        let body = Body::from(vec![0u8; 64]);
        let (rebuilt, capture) = buffer_body(body, 16).await;
        assert!(matches!(capture, BodyCapture::Skipped));

        // 超限消息体原样透传
        let bytes = to_bytes(rebuilt, 1024).await.expect("消息体应可读出");
        assert_eq!(bytes.len(), 64);
    }

    #[test]
    fn drop_stale_length_clears_header_only_on_failure() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("64"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        drop_stale_length(&mut headers, &BodyCapture::Skipped);
        assert!(headers.contains_key(header::CONTENT_LENGTH));

        drop_stale_length(&mut headers, &BodyCapture::Failed);
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn request_id_is_unique() {
        assert_ne!(RequestId::new().as_str(), RequestId::new().as_str());
    }
}
