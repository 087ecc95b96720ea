//! # 头部脱敏
//!
//! 匹配方向是"规则串包含头名"：规则 `authorization-v2` 能命中头
//! `authorization`，反之不行。比较双方都先转小写。
//! `cookie` 头无条件脱敏，不依赖任何规则。

use indexmap::IndexMap;

use super::REDACTED;

/// 对一组头部套用规则，命中的头整个值列表收缩为单个占位值
pub(crate) fn redact_headers(
    rules: &[String],
    headers: &IndexMap<String, Vec<String>>,
) -> IndexMap<String, Vec<String>> {
    headers
        .iter()
        .map(|(name, values)| {
            if should_redact(rules, name) {
                (name.clone(), vec![REDACTED.to_string()])
            } else {
                (name.clone(), values.clone())
            }
        })
        .collect()
}

fn should_redact(rules: &[String], name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    if lowered == "cookie" {
        return true;
    }
    rules.iter().any(|rule| rule.contains(&lowered))
}
