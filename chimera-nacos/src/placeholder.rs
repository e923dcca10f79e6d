//! `${key}` / `${key:default}` 占位符解析

use crate::constants::{PLACEHOLDER_PREFIX, PLACEHOLDER_SUFFIX, PLACEHOLDER_VALUE_SEPARATOR};
use std::collections::HashSet;

/// 解析文本中的占位符
///
/// - 占位符的键本身可以包含占位符，先解析内层
/// - 解析出的值会继续解析其中的占位符
/// - 无法解析且没有默认值的占位符原样保留
/// - 循环引用的占位符原样保留
///
/// # Example
/// ```
/// use chimera_nacos::placeholder::resolve_placeholders;
///
/// let lookup = |key: &str| (key == "host").then(|| "localhost".to_string());
/// assert_eq!(resolve_placeholders("${host}:${port:8848}", lookup), "localhost:8848");
/// ```
pub fn resolve_placeholders<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut visiting = HashSet::new();
    parse_string_value(text, &lookup, &mut visiting)
}

fn parse_string_value<F>(value: &str, lookup: &F, visiting: &mut HashSet<String>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
        result.push_str(&rest[..start]);
        let body = &rest[start + PLACEHOLDER_PREFIX.len()..];

        let Some(end) = find_placeholder_end(body) else {
            // 没有闭合的后缀，余下部分原样输出
            result.push_str(&rest[start..]);
            return result;
        };

        let placeholder = &body[..end];
        let whole = &rest[start..start + PLACEHOLDER_PREFIX.len() + end + PLACEHOLDER_SUFFIX.len()];
        rest = &body[end + PLACEHOLDER_SUFFIX.len()..];

        if !visiting.insert(placeholder.to_string()) {
            tracing::warn!("Circular placeholder reference '{}' left unresolved", placeholder);
            result.push_str(whole);
            continue;
        }

        let key = parse_string_value(placeholder, lookup, visiting);
        let resolved = lookup(&key).or_else(|| {
            key.split_once(PLACEHOLDER_VALUE_SEPARATOR)
                .map(|(name, default)| lookup(name).unwrap_or_else(|| default.to_string()))
        });

        match resolved {
            Some(value) => result.push_str(&parse_string_value(&value, lookup, visiting)),
            None => {
                tracing::debug!("Could not resolve placeholder '{}'", key);
                result.push_str(whole);
            }
        }

        visiting.remove(placeholder);
    }

    result.push_str(rest);
    result
}

/// 找到与开头 `${` 匹配的 `}`，返回其在 `body` 中的位置
fn find_placeholder_end(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        if body[i..].starts_with(PLACEHOLDER_PREFIX) {
            depth += 1;
            i += PLACEHOLDER_PREFIX.len();
        } else if body[i..].starts_with(PLACEHOLDER_SUFFIX) {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
            i += PLACEHOLDER_SUFFIX.len();
        } else {
            i += body[i..].chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}
