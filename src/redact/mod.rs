//! # 脱敏引擎
//!
//! 在载荷离开进程之前改写敏感信息：
//! 头部按规则串匹配整列置换，消息体按字段路径定点置换。
//! 规则在构造期编译完成，运行期不再解析表达式。

mod fields;
mod headers;

pub use fields::FieldPath;

use indexmap::IndexMap;

use crate::config::ObserverConfig;
use crate::error::Result;

/// 脱敏后的占位值
pub const REDACTED: &str = "[CLIENT_REDACTED]";

/// 预编译的脱敏引擎
#[derive(Debug, Clone, Default)]
pub struct RedactionEngine {
    header_rules: Vec<String>,
    request_paths: Vec<FieldPath>,
    response_paths: Vec<FieldPath>,
}

impl RedactionEngine {
    /// 从规则列表构建引擎
    ///
    /// 头部规则统一转为小写；字段路径立即编译，
    /// 非法表达式在这里失败而不是在请求路径上。
    pub fn new(
        header_rules: &[String],
        request_body_paths: &[String],
        response_body_paths: &[String],
    ) -> Result<Self> {
        let request_paths = request_body_paths
            .iter()
            .map(|expr| FieldPath::parse(expr))
            .collect::<Result<Vec<_>>>()?;
        let response_paths = response_body_paths
            .iter()
            .map(|expr| FieldPath::parse(expr))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header_rules: header_rules
                .iter()
                .map(|rule| rule.to_ascii_lowercase())
                .collect(),
            request_paths,
            response_paths,
        })
    }

    /// 按配置构建引擎
    pub fn from_config(config: &ObserverConfig) -> Result<Self> {
        Self::new(
            &config.redact_headers,
            &config.redact_request_body,
            &config.redact_response_body,
        )
    }

    /// 对一组头部套用脱敏规则
    #[must_use]
    pub fn redact_headers(
        &self,
        headers: &IndexMap<String, Vec<String>>,
    ) -> IndexMap<String, Vec<String>> {
        headers::redact_headers(&self.header_rules, headers)
    }

    /// 对请求体套用字段脱敏
    #[must_use]
    pub fn redact_request_body(&self, body: &str) -> String {
        fields::redact_body(&self.request_paths, body)
    }

    /// 对响应体套用字段脱敏
    #[must_use]
    pub fn redact_response_body(&self, body: &str) -> String {
        fields::redact_body(&self.response_paths, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_compiles_paths_eagerly() {
        let err = RedactionEngine::new(&[], &["$.a[".to_string()], &[]).unwrap_err();
        assert!(err.to_string().contains("脱敏路径"));
    }

    #[test]
    fn engine_separates_request_and_response_paths() {
        let engine = RedactionEngine::new(
            &[],
            &["$.secret".to_string()],
            &["$.token".to_string()],
        )
        .expect("规则应可编译");

        let request = engine.redact_request_body(r#"{"secret":"a","token":"b"}"#);
        assert!(request.contains(r#""secret":"[CLIENT_REDACTED]""#));
        assert!(request.contains(r#""token":"b""#));

        let response = engine.redact_response_body(r#"{"secret":"a","token":"b"}"#);
        assert!(response.contains(r#""secret":"a""#));
        assert!(response.contains(r#""token":"[CLIENT_REDACTED]""#));
    }
}
