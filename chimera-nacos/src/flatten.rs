//! 配置文档模型与展平
//!
//! YAML/JSON 反序列化和 XML 解析都先产出 [`ConfigNode`] 树，
//! 再由 [`flatten`] 收敛成 [`FlattenedKeySpace`]。

use crate::key_space::FlattenedKeySpace;
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use std::fmt;
use thiserror::Error;

/// 配置文档节点
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Null,
    Bool(bool),
    /// 数字按文本保存，避免精度和格式在展平时变化
    Number(String),
    String(String),
    List(Vec<ConfigNode>),
    Map(IndexMap<String, ConfigNode>),
}

impl ConfigNode {
    /// 标量的字符串表示；`null` 为空字符串
    ///
    /// 列表和映射没有标量表示，返回 `None`
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            ConfigNode::Null => Some(String::new()),
            ConfigNode::Bool(b) => Some(b.to_string()),
            ConfigNode::Number(n) => Some(n.clone()),
            ConfigNode::String(s) => Some(s.clone()),
            ConfigNode::List(_) | ConfigNode::Map(_) => None,
        }
    }

    /// 映射键的文本形式，复合键退化为调试格式
    fn key_text(&self) -> String {
        match self.scalar_string() {
            Some(key) => key,
            None => format!("{:?}", self),
        }
    }
}

/// YAML 合并键
const MERGE_KEY: &str = "<<";

/// 两个不同的叶子展平到同一个键
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("flattened key '{key}' is produced by more than one entry")]
pub struct FlattenError {
    pub key: String,
}

/// 浮点数保留小数部分，例如 `1.0` 而不是 `1`
fn float_to_string(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{:?}", value)
    }
}

impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ConfigNodeVisitor)
    }
}

struct ConfigNodeVisitor;

impl<'de> Visitor<'de> for ConfigNodeVisitor {
    type Value = ConfigNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Number(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Number(v.to_string()))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Number(v.to_string()))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Number(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Number(float_to_string(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ConfigNode, E> {
        Ok(ConfigNode::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ConfigNode, E> {
        Ok(ConfigNode::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<ConfigNode, D::Error>
    where
        D: Deserializer<'de>,
    {
        ConfigNode::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<ConfigNode, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<ConfigNode>()? {
            items.push(item);
        }
        Ok(ConfigNode::List(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<ConfigNode, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        // 文本键 -> 原始键节点，`1` 与 `"1"` 是不同的键
        let mut originals: IndexMap<String, ConfigNode> = IndexMap::new();
        let mut merged: Option<ConfigNode> = None;

        while let Some(key) = map.next_key::<ConfigNode>()? {
            let text = key.key_text();
            match originals.entry(text) {
                Entry::Occupied(entry) if *entry.get() == key => {
                    return Err(de::Error::custom(format!(
                        "duplicate key '{}' in the same mapping",
                        entry.key()
                    )));
                }
                Entry::Occupied(entry) => {
                    return Err(de::Error::custom(format!(
                        "keys {:?} and {:?} in the same mapping both flatten to '{}'",
                        entry.get(),
                        key,
                        entry.key()
                    )));
                }
                Entry::Vacant(entry) => {
                    let text = entry.key().clone();
                    entry.insert(key.clone());
                    let value = map.next_value::<ConfigNode>()?;
                    if key == ConfigNode::String(MERGE_KEY.to_string()) {
                        merged = Some(value);
                    } else {
                        entries.insert(text, value);
                    }
                }
            }
        }

        if let Some(sources) = merged {
            apply_merge(&mut entries, sources).map_err(de::Error::custom)?;
        }
        Ok(ConfigNode::Map(entries))
    }

    // YAML 自定义标签（例如 `!secret value`）只保留被标记的值
    fn visit_enum<A>(self, data: A) -> Result<ConfigNode, A::Error>
    where
        A: EnumAccess<'de>,
    {
        let (_tag, variant): (de::IgnoredAny, _) = data.variant()?;
        variant.newtype_variant::<ConfigNode>()
    }
}

/// 展开合并键：映射中已有的键优先，多个来源时靠前的来源优先
fn apply_merge(entries: &mut IndexMap<String, ConfigNode>, sources: ConfigNode) -> Result<(), String> {
    let sources = match sources {
        ConfigNode::Map(map) => vec![map],
        ConfigNode::List(items) => items
            .into_iter()
            .map(|item| match item {
                ConfigNode::Map(map) => Ok(map),
                other => Err(format!("merge key expects mappings, found {:?}", other)),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => return Err(format!("merge key expects a mapping or a list of mappings, found {:?}", other)),
    };

    for source in sources {
        for (key, value) in source {
            entries.entry(key).or_insert(value);
        }
    }
    Ok(())
}

/// 将嵌套映射展平为键空间
///
/// - 字符串叶子原样保存在完整路径上
/// - 嵌套映射追加 `.<子键>`，根路径下直接使用子键
/// - 列表逐个元素追加 `[<下标>]`，空列表保存为空字符串
/// - 其他标量保存其字符串表示，`null` 保存为空字符串
/// - 子键以 `[` 开头时直接拼接，不插入 `.`
///
/// 字面量带点的键与嵌套路径可能落到同一个键（`a.b` 与 `a: {b: ..}`），
/// 此时返回 [`FlattenError`]，不静默覆盖
pub fn flatten(source: &IndexMap<String, ConfigNode>) -> Result<FlattenedKeySpace, FlattenError> {
    let mut result = FlattenedKeySpace::with_capacity(source.len());
    build_flattened(&mut result, source, "")?;
    Ok(result)
}

fn build_flattened(
    result: &mut FlattenedKeySpace,
    source: &IndexMap<String, ConfigNode>,
    path: &str,
) -> Result<(), FlattenError> {
    for (child, value) in source {
        let key = join_path(path, child);
        flatten_value(result, key, value)?;
    }
    Ok(())
}

fn flatten_value(result: &mut FlattenedKeySpace, key: String, value: &ConfigNode) -> Result<(), FlattenError> {
    match value {
        ConfigNode::Map(map) => build_flattened(result, map, &key),
        ConfigNode::List(items) if items.is_empty() => insert_leaf(result, key, String::new()),
        ConfigNode::List(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_value(result, join_path(&key, &format!("[{}]", index)), item)?;
            }
            Ok(())
        }
        // List 和 Map 已在上面处理，这里一定有标量表示
        scalar => insert_leaf(result, key, scalar.scalar_string().unwrap_or_default()),
    }
}

fn insert_leaf(result: &mut FlattenedKeySpace, key: String, value: String) -> Result<(), FlattenError> {
    if result.contains_key(&key) {
        return Err(FlattenError { key });
    }
    result.insert(key, value);
    Ok(())
}

fn join_path(path: &str, child: &str) -> String {
    if path.is_empty() {
        child.to_string()
    } else if child.starts_with('[') {
        format!("{}{}", path, child)
    } else {
        format!("{}.{}", path, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, ConfigNode)>) -> IndexMap<String, ConfigNode> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn string(s: &str) -> ConfigNode {
        ConfigNode::String(s.to_string())
    }

    #[test]
    fn test_flatten_list_indices() {
        let source = map(vec![("items", ConfigNode::List(vec![string("x"), string("y")]))]);
        let flat = flatten(&source).unwrap();

        let entries: Vec<_> = flat.iter().collect();
        assert_eq!(entries, vec![("items[0]", "x"), ("items[1]", "y")]);
        assert!(!flat.contains_key("items"));
    }

    #[test]
    fn test_flatten_is_idempotent_on_flat_maps() {
        let source = map(vec![
            ("server.port", string("8080")),
            ("server.hosts[0]", string("a")),
            ("name", string("demo")),
        ]);
        let flat = flatten(&source).unwrap();

        let entries: Vec<_> = flat.iter().collect();
        assert_eq!(
            entries,
            vec![("server.port", "8080"), ("server.hosts[0]", "a"), ("name", "demo")]
        );
    }

    #[test]
    fn test_flatten_nested_structures() {
        let source = map(vec![(
            "spring",
            ConfigNode::Map(map(vec![
                ("enabled", ConfigNode::Bool(true)),
                ("ratio", ConfigNode::Number("1.0".to_string())),
                ("missing", ConfigNode::Null),
                ("empty", ConfigNode::List(vec![])),
                ("none", ConfigNode::Map(IndexMap::new())),
                (
                    "servers",
                    ConfigNode::List(vec![
                        ConfigNode::Map(map(vec![("host", string("a")), ("port", ConfigNode::Number("1".to_string()))])),
                        ConfigNode::List(vec![string("x")]),
                    ]),
                ),
            ])),
        )]);
        let flat = flatten(&source).unwrap();

        assert_eq!(flat.get("spring.enabled"), Some("true"));
        assert_eq!(flat.get("spring.ratio"), Some("1.0"));
        assert_eq!(flat.get("spring.missing"), Some(""));
        assert_eq!(flat.get("spring.empty"), Some(""));
        assert!(!flat.contains_key("spring.none"));
        assert_eq!(flat.get("spring.servers[0].host"), Some("a"));
        assert_eq!(flat.get("spring.servers[0].port"), Some("1"));
        assert_eq!(flat.get("spring.servers[1][0]"), Some("x"));
    }

    #[test]
    fn test_flatten_rejects_colliding_keys() {
        let source = map(vec![
            ("a.b", string("1")),
            ("a", ConfigNode::Map(map(vec![("b", string("2"))]))),
        ]);

        let err = flatten(&source).unwrap_err();
        assert_eq!(err, FlattenError { key: "a.b".to_string() });
    }

    #[test]
    fn test_flatten_rejects_literal_index_next_to_list() {
        let source = map(vec![
            ("items", ConfigNode::List(vec![string("x")])),
            ("items[0]", string("y")),
        ]);

        assert_eq!(flatten(&source).unwrap_err().key, "items[0]");
    }

    #[test]
    fn test_float_to_string_keeps_fraction() {
        assert_eq!(float_to_string(1.0), "1.0");
        assert_eq!(float_to_string(0.25), "0.25");
        assert_eq!(float_to_string(f64::INFINITY), "Infinity");
    }
}
