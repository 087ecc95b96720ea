//! # 字段路径脱敏
//!
//! 路径语法是 JSONPath 的一个受控子集：
//! 可选的 `$` 根前缀、`.name` 字段访问、`[n]` 数组下标、
//! `[*]` 与 `.*` 通配、`['name']` 引号字段。
//! 不支持 `..` 深度扫描，解析失败在配置阶段报错。

use serde_json::Value;

use super::REDACTED;
use crate::error::{ObserverError, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 一条预编译的字段路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// 对象字段
    Key(String),
    /// 数组下标
    Index(usize),
    /// 数组元素或对象所有值
    Wildcard,
}

impl FieldPath {
    /// 解析一条路径表达式
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(ObserverError::config("脱敏路径不能为空"));
        }

        let mut rest = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let mut segments = Vec::new();

        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('.') {
                if stripped.starts_with('.') {
                    return Err(ObserverError::config(format!(
                        "脱敏路径 '{expr}' 不支持 '..' 深度扫描"
                    )));
                }
                if stripped.is_empty() {
                    return Err(ObserverError::config(format!("脱敏路径 '{expr}' 以 '.' 结尾")));
                }
                rest = stripped;
                continue;
            }

            if let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']').ok_or_else(|| {
                    ObserverError::config(format!("脱敏路径 '{expr}' 缺少 ']'"))
                })?;
                segments.push(parse_bracket(expr, &stripped[..end])?);
                rest = &stripped[end + 1..];
                continue;
            }

            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            let name = &rest[..end];
            segments.push(if name == "*" {
                Segment::Wildcard
            } else {
                Segment::Key(name.to_string())
            });
            rest = &rest[end..];
        }

        if segments.is_empty() {
            return Err(ObserverError::config(format!(
                "脱敏路径 '{expr}' 不含任何字段"
            )));
        }

        Ok(Self {
            segments,
            raw: trimmed.to_string(),
        })
    }

    /// 原始表达式，用于日志
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 将文档中所有命中位置替换为占位值；未命中时不做任何改动
    pub(crate) fn apply(&self, value: &mut Value) {
        apply_segments(&self.segments, value);
    }
}

fn parse_bracket(expr: &str, inner: &str) -> Result<Segment> {
    let inner = inner.trim();
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
        let index = inner.parse::<usize>().map_err(|e| {
            ObserverError::config_with_source(format!("脱敏路径 '{expr}' 下标过大: [{inner}]"), e)
        })?;
        return Ok(Segment::Index(index));
    }
    if inner.len() >= 2 {
        let quoted = (inner.starts_with('\'') && inner.ends_with('\''))
            || (inner.starts_with('"') && inner.ends_with('"'));
        if quoted {
            return Ok(Segment::Key(inner[1..inner.len() - 1].to_string()));
        }
    }
    Err(ObserverError::config(format!(
        "脱敏路径 '{expr}' 中无效的下标 '[{inner}]'"
    )))
}

fn apply_segments(segments: &[Segment], value: &mut Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *value = Value::String(REDACTED.to_string());
        return;
    };

    match segment {
        Segment::Key(key) => {
            if let Some(child) = value.get_mut(key.as_str()) {
                apply_segments(rest, child);
            }
        }
        Segment::Index(index) => {
            if let Some(child) = value.get_mut(*index) {
                apply_segments(rest, child);
            }
        }
        Segment::Wildcard => match value {
            Value::Array(items) => {
                for item in items {
                    apply_segments(rest, item);
                }
            }
            Value::Object(map) => {
                for item in map.values_mut() {
                    apply_segments(rest, item);
                }
            }
            _ => {}
        },
    }
}

/// 对序列化后的消息体套用一组路径
///
/// 消息体无法按 JSON 解析时返回空字符串，不透出任何原始内容；
/// 路径列表为空时同样先解析再重序列化。
pub(crate) fn redact_body(paths: &[FieldPath], body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }
    match try_redact(paths, body) {
        Ok(redacted) => redacted,
        Err(error) => {
            ldebug!(
                "-",
                LogStage::Internal,
                LogComponent::Redaction,
                "body_dropped",
                "消息体无法解析，捕获内容置空",
                error = format!("{error}")
            );
            String::new()
        }
    }
}

fn try_redact(paths: &[FieldPath], body: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(body)?;
    for path in paths {
        path.apply(&mut value);
    }
    Ok(serde_json::to_string(&value)?)
}
