//! 属性绑定
//!
//! 目标类型通过 [`NacosProperties`] 声明一张字段表（键、字段、转换函数），
//! 通常由 `#[derive(NacosProperties)]` 生成。绑定是部分的、非破坏性的：
//! 键空间中没有出现的字段保持原值，连续多次绑定是累积的。

use crate::error::BindError;
use crate::key_space::FlattenedKeySpace;
use std::collections::HashMap;

/// 目标类型上声明的配置元信息
///
/// 对应 `#[nacos_properties(...)]` 属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesMeta {
    pub data_id: Option<&'static str>,
    pub group: Option<&'static str>,
    pub prefix: &'static str,
    /// 声明的配置类型，未声明时按 dataId 扩展名推断
    pub config_type: Option<&'static str>,
    pub auto_refreshed: bool,
    pub ignore_unknown_fields: bool,
    pub ignore_invalid_fields: bool,
    pub ignore_nested_properties: bool,
}

impl Default for PropertiesMeta {
    fn default() -> Self {
        Self {
            data_id: None,
            group: None,
            prefix: "",
            config_type: None,
            auto_refreshed: false,
            ignore_unknown_fields: true,
            ignore_invalid_fields: true,
            ignore_nested_properties: false,
        }
    }
}

/// 待转换的原始值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue<'a> {
    /// 键直接对应的值
    Single(&'a str),
    /// `key[0]`、`key[1]`... 的连续下标值
    Indexed(Vec<&'a str>),
}

impl RawValue<'_> {
    fn display(&self) -> String {
        match self {
            RawValue::Single(value) => value.to_string(),
            RawValue::Indexed(values) => format!("[{}]", values.join(", ")),
        }
    }
}

/// 字符串到字段类型的转换
///
/// 没有实现此 trait 的字段类型在编译期就会被拒绝
pub trait FromConfigValue: Sized {
    /// 用于错误信息的类型名
    fn expected_type() -> &'static str;

    fn from_config_value(raw: &str) -> Result<Self, String>;

    /// 从下标值构造，只有集合类型需要实现
    fn from_indexed_values(values: &[&str]) -> Option<Result<Self, String>> {
        let _ = values;
        None
    }
}

impl FromConfigValue for String {
    fn expected_type() -> &'static str {
        "string"
    }

    fn from_config_value(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl FromConfigValue for bool {
    fn expected_type() -> &'static str {
        "bool"
    }

    fn from_config_value(raw: &str) -> Result<Self, String> {
        match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(format!("'{}' is not a boolean", other)),
        }
    }
}

impl FromConfigValue for char {
    fn expected_type() -> &'static str {
        "char"
    }

    fn from_config_value(raw: &str) -> Result<Self, String> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(format!("'{}' is not a single character", raw)),
        }
    }
}

macro_rules! impl_from_config_value_for_numbers {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromConfigValue for $ty {
                fn expected_type() -> &'static str {
                    $name
                }

                fn from_config_value(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

impl_from_config_value_for_numbers! {
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", i128 => "i128", isize => "isize",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64", u128 => "u128", usize => "usize",
    f32 => "f32", f64 => "f64",
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn expected_type() -> &'static str {
        T::expected_type()
    }

    /// 空字符串视为 `None`
    fn from_config_value(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            Ok(None)
        } else {
            T::from_config_value(raw).map(Some)
        }
    }

    fn from_indexed_values(values: &[&str]) -> Option<Result<Self, String>> {
        T::from_indexed_values(values).map(|result| result.map(Some))
    }
}

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn expected_type() -> &'static str {
        "list"
    }

    /// 单个值按逗号分隔，空字符串为空列表
    fn from_config_value(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(T::from_config_value)
            .collect()
    }

    fn from_indexed_values(values: &[&str]) -> Option<Result<Self, String>> {
        Some(values.iter().map(|value| T::from_config_value(value)).collect())
    }
}

/// 将原始值转换为字段类型，派生宏生成的赋值函数使用它
pub fn coerce<V: FromConfigValue>(raw: RawValue<'_>) -> Result<V, String> {
    match raw {
        RawValue::Single(value) => V::from_config_value(value),
        RawValue::Indexed(values) => V::from_indexed_values(&values)
            .unwrap_or_else(|| Err(format!("{} does not accept indexed values", V::expected_type()))),
    }
}

/// 赋值函数：转换原始值并写入字段
pub type ValueSetter<T> = fn(&mut T, RawValue<'_>) -> Result<(), String>;

/// 嵌套绑定函数：在给定前缀下绑定嵌套字段
pub type NestedBinder<T> =
    fn(&mut T, &PropertyBinder, &FlattenedKeySpace, &str, &mut BindReport) -> Result<(), BindError>;

/// 类型认领的一个键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedKey {
    pub key: String,
    /// 是否同时认领 `key[i]` 形式的下标键
    pub indexed: bool,
}

/// 列出嵌套类型在给定前缀下认领的键
pub type KeyLister = fn(&str) -> Vec<ClaimedKey>;

/// 字段绑定方式
pub enum FieldKind<T> {
    Value {
        expected: &'static str,
        /// 是否接受 `key[i]` 形式的下标值
        accepts_indexed: bool,
        setter: ValueSetter<T>,
    },
    Nested {
        /// false 时嵌套字段直接绑定在父级前缀下
        prefixed: bool,
        bind: NestedBinder<T>,
        keys: KeyLister,
    },
    Ignored,
}

/// 一条字段绑定规则
pub struct PropertyField<T> {
    /// 字段标识符
    pub name: &'static str,
    /// 显式重命名的键
    pub rename: Option<&'static str>,
    pub kind: FieldKind<T>,
}

impl<T> PropertyField<T> {
    pub fn value<V: FromConfigValue>(
        name: &'static str,
        rename: Option<&'static str>,
        setter: ValueSetter<T>,
    ) -> Self {
        Self {
            name,
            rename,
            kind: FieldKind::Value {
                expected: V::expected_type(),
                accepts_indexed: V::from_indexed_values(&[]).is_some(),
                setter,
            },
        }
    }

    pub fn nested(
        name: &'static str,
        rename: Option<&'static str>,
        prefixed: bool,
        bind: NestedBinder<T>,
        keys: KeyLister,
    ) -> Self {
        Self {
            name,
            rename,
            kind: FieldKind::Nested { prefixed, bind, keys },
        }
    }

    pub fn ignored(name: &'static str) -> Self {
        Self {
            name,
            rename: None,
            kind: FieldKind::Ignored,
        }
    }

    /// 绑定键：显式重命名优先，否则使用字段标识符
    pub fn key(&self) -> &'static str {
        self.rename.unwrap_or(self.name)
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self.kind, FieldKind::Ignored)
    }
}

/// 可绑定配置的目标类型
///
/// 通过 `#[derive(NacosProperties)]` 自动实现
///
/// # 示例
///
/// ```ignore
/// use chimera_nacos_macros::NacosProperties;
///
/// #[derive(NacosProperties, Default)]
/// #[nacos_properties(data_id = "datasource.yaml", prefix = "datasource", auto_refreshed)]
/// struct DataSourceConfig {
///     url: String,
///     #[nacos_property("max-active")]
///     max_active: u32,
///     #[nacos_ignore]
///     password: String,
/// }
/// ```
pub trait NacosProperties: Sized + Send + Sync + 'static {
    /// 目标类型名，用于日志与错误信息
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn properties_meta() -> PropertiesMeta {
        PropertiesMeta::default()
    }

    /// 字段绑定表
    fn fields() -> Vec<PropertyField<Self>>;

    /// 在给定前缀下本类型认领的全部键，标明是否接受下标
    ///
    /// 忽略的字段认领其键的任何形式
    fn claimed_keys(prefix: &str) -> Vec<ClaimedKey> {
        let mut keys = Vec::new();
        for field in Self::fields() {
            match field.kind {
                FieldKind::Value { accepts_indexed, .. } => keys.push(ClaimedKey {
                    key: join_key(prefix, field.key()),
                    indexed: accepts_indexed,
                }),
                FieldKind::Nested { prefixed, keys: list, .. } => {
                    let nested_prefix = if prefixed {
                        join_key(prefix, field.key())
                    } else {
                        prefix.to_string()
                    };
                    keys.extend(list(&nested_prefix));
                }
                FieldKind::Ignored => keys.push(ClaimedKey {
                    key: join_key(prefix, field.key()),
                    indexed: true,
                }),
            }
        }
        keys
    }

    /// 在给定前缀下本类型认领的全部键（不含下标后缀）
    fn property_keys(prefix: &str) -> Vec<String> {
        Self::claimed_keys(prefix).into_iter().map(|claimed| claimed.key).collect()
    }
}

/// 拼接前缀与键
pub fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        prefix.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// 绑定选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderOptions {
    /// 覆盖类型上声明的前缀
    pub prefix: Option<String>,
    pub ignore_unknown_fields: bool,
    pub ignore_invalid_fields: bool,
    pub ignore_nested_properties: bool,
}

impl Default for BinderOptions {
    fn default() -> Self {
        Self::from_meta(&PropertiesMeta::default())
    }
}

impl BinderOptions {
    pub fn from_meta(meta: &PropertiesMeta) -> Self {
        Self {
            prefix: None,
            ignore_unknown_fields: meta.ignore_unknown_fields,
            ignore_invalid_fields: meta.ignore_invalid_fields,
            ignore_nested_properties: meta.ignore_nested_properties,
        }
    }

    /// 未知键与非法值都返回错误
    pub fn strict() -> Self {
        Self {
            prefix: None,
            ignore_unknown_fields: false,
            ignore_invalid_fields: false,
            ignore_nested_properties: false,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }

    pub fn ignore_invalid_fields(mut self, ignore: bool) -> Self {
        self.ignore_invalid_fields = ignore;
        self
    }

    pub fn ignore_nested_properties(mut self, ignore: bool) -> Self {
        self.ignore_nested_properties = ignore;
        self
    }
}

/// 一次绑定的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// 成功写入的键
    pub bound: Vec<String>,
    /// 因转换失败被跳过的键（仅宽松模式）
    pub skipped: Vec<String>,
}

impl BindReport {
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty() && self.skipped.is_empty()
    }
}

/// 属性绑定器
#[derive(Debug, Clone, Default)]
pub struct PropertyBinder {
    options: BinderOptions,
}

impl PropertyBinder {
    pub fn new(options: BinderOptions) -> Self {
        Self { options }
    }

    /// 使用目标类型声明的选项
    pub fn for_type<T: NacosProperties>() -> Self {
        Self::new(BinderOptions::from_meta(&T::properties_meta()))
    }

    pub fn options(&self) -> &BinderOptions {
        &self.options
    }

    /// 将键空间绑定到目标对象
    ///
    /// 严格模式下先检查未知键，发现即返回错误且不写入任何字段；
    /// 转换失败在严格模式下立即返回，宽松模式下记录警告并跳过
    pub fn bind<T: NacosProperties>(
        &self,
        target: &mut T,
        key_space: &FlattenedKeySpace,
    ) -> Result<BindReport, BindError> {
        let prefix = self
            .options
            .prefix
            .clone()
            .unwrap_or_else(|| T::properties_meta().prefix.to_string());

        if !self.options.ignore_unknown_fields {
            self.check_unknown_keys::<T>(key_space, &prefix)?;
        }

        let mut report = BindReport::default();
        self.bind_nested(target, key_space, &prefix, &mut report)?;

        tracing::debug!(
            "Bound {} propert(ies) onto '{}' (prefix: '{}', skipped: {})",
            report.bound.len(),
            T::type_name(),
            prefix,
            report.skipped.len()
        );
        Ok(report)
    }

    /// 在给定前缀下绑定，嵌套字段递归调用
    pub fn bind_nested<T: NacosProperties>(
        &self,
        target: &mut T,
        key_space: &FlattenedKeySpace,
        prefix: &str,
        report: &mut BindReport,
    ) -> Result<(), BindError> {
        for field in T::fields() {
            let key = join_key(prefix, field.key());
            match field.kind {
                FieldKind::Ignored => {
                    if key_space.contains_key(&key) {
                        tracing::trace!("Field '{}' is ignored, skipping key '{}'", field.name, key);
                    }
                }
                FieldKind::Nested { prefixed, bind, .. } => {
                    if self.options.ignore_nested_properties {
                        continue;
                    }
                    let nested_prefix = if prefixed { key } else { prefix.to_string() };
                    bind(target, self, key_space, &nested_prefix, report)?;
                }
                FieldKind::Value { expected, accepts_indexed, setter } => {
                    let raw = match key_space.get(&key) {
                        Some(value) => RawValue::Single(value),
                        None if accepts_indexed => {
                            let values = key_space.indexed_values(&key);
                            if values.is_empty() {
                                continue;
                            }
                            RawValue::Indexed(values)
                        }
                        None => continue,
                    };

                    let shown = raw.display();
                    match setter(target, raw) {
                        Ok(()) => report.bound.push(key),
                        Err(reason) if self.options.ignore_invalid_fields => {
                            tracing::warn!(
                                "Ignoring invalid value '{}' of property '{}' for field '{}' ({}): {}",
                                shown,
                                key,
                                field.name,
                                expected,
                                reason
                            );
                            report.skipped.push(key);
                        }
                        Err(reason) => {
                            return Err(BindError::InvalidValue {
                                key,
                                field: field.name.to_string(),
                                value: shown,
                                expected,
                                reason,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_unknown_keys<T: NacosProperties>(
        &self,
        key_space: &FlattenedKeySpace,
        prefix: &str,
    ) -> Result<(), BindError> {
        // 键 -> 是否接受下标
        let known: HashMap<String, bool> = T::claimed_keys(prefix)
            .into_iter()
            .map(|claimed| (claimed.key, claimed.indexed))
            .collect();
        let dotted = format!("{}.", prefix);

        for key in key_space.keys() {
            if !prefix.is_empty() && !key.starts_with(&dotted) {
                continue;
            }
            let claimed = match key.split_once('[') {
                Some((base, _)) => known.get(base).copied().unwrap_or(false),
                None => known.contains_key(key),
            };
            if !claimed {
                return Err(BindError::UnknownField {
                    key: key.to_string(),
                    target: T::type_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// 使用目标类型声明的选项绑定键空间
pub fn bind<T: NacosProperties>(
    target: &mut T,
    key_space: &FlattenedKeySpace,
) -> Result<BindReport, BindError> {
    PropertyBinder::for_type::<T>().bind(target, key_space)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct PoolConfig {
        size: u32,
    }

    impl NacosProperties for PoolConfig {
        fn fields() -> Vec<PropertyField<Self>> {
            vec![PropertyField::value::<u32>("size", None, |t: &mut Self, raw: RawValue<'_>| {
                t.size = coerce(raw)?;
                Ok(())
            })]
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct ServerConfig {
        a: String,
        b: String,
        port: u16,
        ratio: f64,
        enabled: bool,
        secret: String,
        hosts: Vec<String>,
        timeout: Option<u64>,
        pool: PoolConfig,
    }

    impl NacosProperties for ServerConfig {
        fn type_name() -> &'static str {
            "ServerConfig"
        }

        fn properties_meta() -> PropertiesMeta {
            PropertiesMeta {
                prefix: "server",
                ..PropertiesMeta::default()
            }
        }

        fn fields() -> Vec<PropertyField<Self>> {
            vec![
                PropertyField::value::<String>("a", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.a = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::value::<String>("b", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.b = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::value::<u16>("port", Some("server-port"), |t: &mut Self, raw: RawValue<'_>| {
                    t.port = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::value::<f64>("ratio", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.ratio = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::value::<bool>("enabled", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.enabled = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::ignored("secret"),
                PropertyField::value::<Vec<String>>("hosts", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.hosts = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::value::<Option<u64>>("timeout", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.timeout = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::nested(
                    "pool",
                    None,
                    true,
                    |t: &mut Self, binder: &PropertyBinder, space: &FlattenedKeySpace, prefix: &str, report: &mut BindReport| {
                        binder.bind_nested(&mut t.pool, space, prefix, report)
                    },
                    PoolConfig::claimed_keys,
                ),
            ]
        }
    }

    fn space(entries: &[(&str, &str)]) -> FlattenedKeySpace {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_partial_bind_keeps_absent_fields() {
        let mut target = ServerConfig {
            b: "x".to_string(),
            ..ServerConfig::default()
        };

        bind(&mut target, &space(&[("server.a", "1")])).unwrap();
        assert_eq!(target.a, "1");
        assert_eq!(target.b, "x");

        // 第二次绑定是增量的
        bind(&mut target, &space(&[("server.b", "y")])).unwrap();
        assert_eq!(target.a, "1");
        assert_eq!(target.b, "y");
    }

    #[test]
    fn test_rename_and_ignore() {
        let mut target = ServerConfig {
            secret: "keep".to_string(),
            port: 1,
            ..ServerConfig::default()
        };
        let report = bind(
            &mut target,
            &space(&[("server.port", "9"), ("server.server-port", "8080"), ("server.secret", "leak")]),
        )
        .unwrap();

        assert_eq!(target.port, 8080);
        assert_eq!(target.secret, "keep");
        assert_eq!(report.bound, vec!["server.server-port".to_string()]);
    }

    #[test]
    fn test_coercion_and_collections() {
        let mut target = ServerConfig::default();
        bind(
            &mut target,
            &space(&[
                ("server.ratio", "0.75"),
                ("server.enabled", "TRUE"),
                ("server.hosts[0]", "a"),
                ("server.hosts[1]", "b"),
                ("server.timeout", "30"),
                ("server.pool.size", "8"),
            ]),
        )
        .unwrap();

        assert_eq!(target.ratio, 0.75);
        assert!(target.enabled);
        assert_eq!(target.hosts, vec!["a", "b"]);
        assert_eq!(target.timeout, Some(30));
        assert_eq!(target.pool.size, 8);

        bind(&mut target, &space(&[("server.hosts", "x, y,z"), ("server.timeout", "")])).unwrap();
        assert_eq!(target.hosts, vec!["x", "y", "z"]);
        assert_eq!(target.timeout, None);
    }

    #[test]
    fn test_lenient_mode_skips_invalid_values() {
        let mut target = ServerConfig {
            ratio: 1.5,
            ..ServerConfig::default()
        };
        let report = bind(&mut target, &space(&[("server.ratio", "abc"), ("server.a", "ok")])).unwrap();

        assert_eq!(target.ratio, 1.5);
        assert_eq!(target.a, "ok");
        assert_eq!(report.skipped, vec!["server.ratio".to_string()]);
    }

    #[test]
    fn test_strict_mode_rejects_invalid_values() {
        let binder = PropertyBinder::new(BinderOptions::strict().prefix("server"));
        let mut target = ServerConfig::default();
        let err = binder
            .bind(&mut target, &space(&[("server.server-port", "99999")]))
            .unwrap_err();

        match err {
            BindError::InvalidValue { key, field, expected, .. } => {
                assert_eq!(key, "server.server-port");
                assert_eq!(field, "port");
                assert_eq!(expected, "u16");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_fields() {
        let entries = space(&[("server.a", "1"), ("server.unknown", "x"), ("other.key", "y")]);

        // 默认忽略未知键
        let mut target = ServerConfig::default();
        bind(&mut target, &entries).unwrap();
        assert_eq!(target.a, "1");

        // 严格模式下不写入任何字段
        let binder = PropertyBinder::new(BinderOptions::default().prefix("server").ignore_unknown_fields(false));
        let mut target = ServerConfig::default();
        let err = binder.bind(&mut target, &entries).unwrap_err();
        assert_eq!(
            err,
            BindError::UnknownField {
                key: "server.unknown".to_string(),
                target: "ServerConfig".to_string(),
            }
        );
        assert_eq!(target.a, "");

        // 下标键、嵌套键、被忽略字段的键都不是未知键
        let known = space(&[("server.hosts[0]", "a"), ("server.pool.size", "1"), ("server.secret", "s")]);
        binder.bind(&mut target, &known).unwrap();
    }

    #[test]
    fn test_strict_mode_rejects_indexed_keys_for_scalar_fields() {
        let binder = PropertyBinder::new(BinderOptions::default().prefix("server").ignore_unknown_fields(false));
        let mut target = ServerConfig::default();

        let err = binder
            .bind(&mut target, &space(&[("server.a", "1"), ("server.server-port[0]", "80")]))
            .unwrap_err();
        assert_eq!(
            err,
            BindError::UnknownField {
                key: "server.server-port[0]".to_string(),
                target: "ServerConfig".to_string(),
            }
        );
        assert_eq!(target.a, "");

        let err = binder
            .bind(&mut target, &space(&[("server.pool.size[1]", "2")]))
            .unwrap_err();
        assert!(matches!(err, BindError::UnknownField { key, .. } if key == "server.pool.size[1]"));

        // 忽略的字段接受任何形式的键
        binder.bind(&mut target, &space(&[("server.secret[0]", "s")])).unwrap();
    }

    #[test]
    fn test_claimed_keys_mark_list_fields() {
        let claimed = ServerConfig::claimed_keys("server");
        let indexed = |key: &str| claimed.iter().find(|c| c.key == key).map(|c| c.indexed);
        assert_eq!(indexed("server.hosts"), Some(true));
        assert_eq!(indexed("server.server-port"), Some(false));
        assert_eq!(indexed("server.pool.size"), Some(false));
    }

    #[test]
    fn test_ignore_nested_properties() {
        let binder = PropertyBinder::new(BinderOptions::default().ignore_nested_properties(true));
        let mut target = ServerConfig::default();
        binder
            .bind(&mut target, &space(&[("server.pool.size", "3"), ("server.a", "1")]))
            .unwrap();
        assert_eq!(target.pool.size, 0);
        assert_eq!(target.a, "1");
    }

    #[test]
    fn test_property_keys() {
        let keys = ServerConfig::property_keys("server");
        assert!(keys.contains(&"server.server-port".to_string()));
        assert!(keys.contains(&"server.pool.size".to_string()));
        assert!(!keys.contains(&"server.port".to_string()));
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(bool::from_config_value("yes"), Ok(true));
        assert_eq!(bool::from_config_value("Off"), Ok(false));
        assert!(bool::from_config_value("maybe").is_err());
        assert!(i32::from_config_value("1.5").is_err());
        assert_eq!(char::from_config_value("x"), Ok('x'));
    }
}
