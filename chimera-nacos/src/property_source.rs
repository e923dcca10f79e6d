//! 属性源
//!
//! [`NacosPropertySource`] 把一份远程配置展平后的键空间包装为命名的属性源，
//! 刷新时整体替换键空间。[`PropertySources`] 按顺序组合多个属性源，
//! 排在前面的优先。

use crate::binder::FromConfigValue;
use crate::config_service::{ConfigKey, ConfigService};
use crate::config_type::ConfigType;
use crate::constants::{property_source_name, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_LISTENER_TIMEOUT_MS};
use crate::error::{NacosConfigError, Result};
use crate::key_space::FlattenedKeySpace;
use crate::listener::TimeoutListener;
use crate::parse_registry::ConfigParseRegistry;
use crate::placeholder;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// 属性源 trait
pub trait PropertySource: Send + Sync {
    /// 属性源名称，在 [`PropertySources`] 中唯一
    fn name(&self) -> &str;

    fn get_property(&self, key: &str) -> Option<String>;

    fn property_names(&self) -> Vec<String>;

    fn contains_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }
}

/// 来自 Nacos 的属性源
pub struct NacosPropertySource {
    name: String,
    key: ConfigKey,
    config_type: String,
    auto_refreshed: bool,
    key_space: RwLock<FlattenedKeySpace>,
}

impl std::fmt::Debug for NacosPropertySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosPropertySource")
            .field("name", &self.name)
            .field("config_type", &self.config_type)
            .field("auto_refreshed", &self.auto_refreshed)
            .field("properties_count", &self.key_space.read().len())
            .finish()
    }
}

impl NacosPropertySource {
    pub fn new(
        data_id: &str,
        group: &str,
        config_type: impl Into<String>,
        key_space: FlattenedKeySpace,
    ) -> Self {
        let key = ConfigKey::new(data_id, group);
        Self {
            name: property_source_name(&key.data_id, &key.group),
            key,
            config_type: config_type.into(),
            auto_refreshed: false,
            key_space: RwLock::new(key_space),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_auto_refreshed(mut self, auto_refreshed: bool) -> Self {
        self.auto_refreshed = auto_refreshed;
        self
    }

    pub fn data_id(&self) -> &str {
        &self.key.data_id
    }

    pub fn group(&self) -> &str {
        &self.key.group
    }

    pub fn config_key(&self) -> &ConfigKey {
        &self.key
    }

    pub fn config_type(&self) -> &str {
        &self.config_type
    }

    pub fn is_auto_refreshed(&self) -> bool {
        self.auto_refreshed
    }

    /// 整体替换键空间，返回旧的键空间
    pub fn replace(&self, key_space: FlattenedKeySpace) -> FlattenedKeySpace {
        tracing::debug!(
            "Refreshing property source '{}' with {} key(s)",
            self.name,
            key_space.len()
        );
        std::mem::replace(&mut *self.key_space.write(), key_space)
    }

    /// 当前键空间的副本
    pub fn snapshot(&self) -> FlattenedKeySpace {
        self.key_space.read().clone()
    }
}

impl PropertySource for NacosPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<String> {
        self.key_space.read().get(key).map(str::to_string)
    }

    fn property_names(&self) -> Vec<String> {
        self.key_space.read().keys().map(str::to_string).collect()
    }

    fn contains_property(&self, key: &str) -> bool {
        self.key_space.read().contains_key(key)
    }
}

/// 内存属性源（用于本地覆盖或测试）
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, String>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

/// 有序的属性源集合
#[derive(Default)]
pub struct PropertySources {
    sources: RwLock<Vec<Arc<dyn PropertySource>>>,
}

impl std::fmt::Debug for PropertySources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertySources")
            .field("names", &self.names())
            .finish()
    }
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加为最高优先级；同名属性源先被移除
    pub fn add_first(&self, source: Arc<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        sources.insert(0, source);
    }

    /// 添加为最低优先级；同名属性源先被移除
    pub fn add_last(&self, source: Arc<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        sources.push(source);
    }

    /// 插入到 `relative` 之前（优先级高于它）
    pub fn add_before(&self, relative: &str, source: Arc<dyn PropertySource>) -> Result<()> {
        self.insert_relative(relative, source, 0)
    }

    /// 插入到 `relative` 之后（优先级低于它）
    pub fn add_after(&self, relative: &str, source: Arc<dyn PropertySource>) -> Result<()> {
        self.insert_relative(relative, source, 1)
    }

    fn insert_relative(&self, relative: &str, source: Arc<dyn PropertySource>, offset: usize) -> Result<()> {
        if relative == source.name() {
            return Err(NacosConfigError::PropertySource(format!(
                "Property source '{}' cannot be added relative to itself",
                relative
            )));
        }

        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        let index = sources
            .iter()
            .position(|s| s.name() == relative)
            .ok_or_else(|| {
                NacosConfigError::PropertySource(format!("Property source '{}' does not exist", relative))
            })?;
        sources.insert(index + offset, source);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn PropertySource>> {
        let mut sources = self.sources.write();
        let index = sources.iter().position(|s| s.name() == name)?;
        Some(sources.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PropertySource>> {
        self.sources.read().iter().find(|s| s.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.read().iter().any(|s| s.name() == name)
    }

    /// 按优先级从高到低的名称列表
    pub fn names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }

    /// 获取属性值，解析其中的占位符
    pub fn get_property(&self, key: &str) -> Option<String> {
        let sources = self.snapshot();
        let raw = Self::find_raw(&sources, key)?;
        Some(placeholder::resolve_placeholders(&raw, |k| Self::find_raw(&sources, k)))
    }

    pub fn get_property_or(&self, key: &str, default: &str) -> String {
        self.get_property(key).unwrap_or_else(|| default.to_string())
    }

    /// 获取并转换属性值，转换失败时记录警告并返回 `None`
    pub fn get_property_as<T: FromConfigValue>(&self, key: &str) -> Option<T> {
        let value = self.get_property(key)?;
        match T::from_config_value(&value) {
            Ok(converted) => Some(converted),
            Err(reason) => {
                tracing::warn!(
                    "Property '{}' = '{}' is not a valid {}: {}",
                    key,
                    value,
                    T::expected_type(),
                    reason
                );
                None
            }
        }
    }

    /// 用当前属性解析文本中的占位符
    pub fn resolve_placeholders(&self, text: &str) -> String {
        let sources = self.snapshot();
        placeholder::resolve_placeholders(text, |k| Self::find_raw(&sources, k))
    }

    // 复制列表后在锁外查找，属性源的回调不会与写者互相等待
    fn snapshot(&self) -> Vec<Arc<dyn PropertySource>> {
        self.sources.read().clone()
    }

    fn find_raw(sources: &[Arc<dyn PropertySource>], key: &str) -> Option<String> {
        sources.iter().find_map(|source| {
            let value = source.get_property(key)?;
            tracing::trace!("Property '{}' found in source '{}'", key, source.name());
            Some(value)
        })
    }
}

/// 从配置服务构建 [`NacosPropertySource`]
pub struct NacosPropertySourceBuilder {
    service: Arc<dyn ConfigService>,
    registry: Arc<ConfigParseRegistry>,
    fetch_timeout_ms: u64,
    listener_timeout: Duration,
}

impl NacosPropertySourceBuilder {
    pub fn new(service: Arc<dyn ConfigService>, registry: Arc<ConfigParseRegistry>) -> Self {
        Self {
            service,
            registry,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            listener_timeout: Duration::from_millis(DEFAULT_LISTENER_TIMEOUT_MS),
        }
    }

    pub fn fetch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.fetch_timeout_ms = timeout_ms;
        self
    }

    pub fn listener_timeout(mut self, timeout: Duration) -> Self {
        self.listener_timeout = timeout;
        self
    }

    /// 拉取并解析配置，构建属性源
    ///
    /// 未声明类型时按 dataId 扩展名推断；配置不存在时得到空属性源
    pub async fn build(
        &self,
        data_id: &str,
        group: &str,
        config_type: Option<&str>,
        auto_refreshed: bool,
    ) -> Result<Arc<NacosPropertySource>> {
        let key = ConfigKey::new(data_id, group);
        let config_type = config_type
            .map(ConfigType::normalize)
            .unwrap_or_else(|| ConfigType::from_data_id(data_id).as_str().to_string());

        let key_space = match self
            .service
            .get_config(&key.data_id, &key.group, self.fetch_timeout_ms)
            .await?
        {
            Some(content) => self
                .registry
                .resolve(&key.data_id, &key.group, &content, &config_type)?,
            None => {
                tracing::debug!("Config {} does not exist, using an empty property source", key);
                FlattenedKeySpace::new()
            }
        };

        let source = Arc::new(
            NacosPropertySource::new(&key.data_id, &key.group, config_type, key_space)
                .with_auto_refreshed(auto_refreshed),
        );

        if auto_refreshed {
            self.attach_auto_refresh(&source).await?;
        }
        Ok(source)
    }

    /// 注册监听器：内容变更时重新解析并整体替换键空间
    ///
    /// 解析超过监听超时的更新被放弃，属性源保持原值
    pub async fn attach_auto_refresh(&self, source: &Arc<NacosPropertySource>) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let key = source.config_key().clone();
        let config_type = source.config_type().to_string();
        let target = Arc::clone(source);

        let listener = TimeoutListener::new(
            format!("{}#refresh", source.name()),
            self.listener_timeout,
            move |content: String| {
                registry
                    .resolve(&key.data_id, &key.group, &content, &config_type)
                    .map_err(anyhow::Error::from)
            },
        )
        .on_commit(move |key_space| {
            target.replace(key_space);
        });

        self.service
            .add_listener(source.data_id(), source.group(), Arc::new(listener))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_service::InMemoryConfigService;

    fn nacos_source(data_id: &str, entries: &[(&str, &str)]) -> Arc<NacosPropertySource> {
        let space: FlattenedKeySpace = entries.iter().map(|(k, v)| (*k, *v)).collect();
        Arc::new(NacosPropertySource::new(data_id, "", "properties", space))
    }

    #[test]
    fn test_nacos_property_source_naming() {
        let source = nacos_source("app.properties", &[("a", "1")]);
        assert_eq!(source.name(), "nacos:app.properties@DEFAULT_GROUP");
        assert_eq!(source.get_property("a").as_deref(), Some("1"));
        assert!(!source.contains_property("b"));

        let old = source.replace([("b", "2")].into_iter().collect());
        assert_eq!(old.get("a"), Some("1"));
        assert_eq!(source.property_names(), vec!["b"]);
    }

    #[test]
    fn test_ordering_and_precedence() {
        let sources = PropertySources::new();
        sources.add_last(nacos_source("base", &[("port", "8080"), ("host", "base")]));
        sources.add_first(Arc::new(MapPropertySource::new("overrides").with_property("port", "9090")));
        sources
            .add_after(
                "overrides",
                Arc::new(MapPropertySource::new("middle").with_property("host", "middle")),
            )
            .unwrap();
        sources
            .add_before("overrides", Arc::new(MapPropertySource::new("top")))
            .unwrap();

        assert_eq!(
            sources.names(),
            vec!["top", "overrides", "middle", "nacos:base@DEFAULT_GROUP"]
        );
        assert_eq!(sources.get_property("port").as_deref(), Some("9090"));
        assert_eq!(sources.get_property("host").as_deref(), Some("middle"));
        assert_eq!(sources.get_property_as::<u16>("port"), Some(9090));
        assert_eq!(sources.get_property_as::<bool>("host"), None);

        assert!(sources.remove("middle").is_some());
        assert_eq!(sources.get_property("host").as_deref(), Some("base"));
        assert!(sources.add_after("missing", Arc::new(MapPropertySource::new("x"))).is_err());
        assert_eq!(sources.len(), 3);
    }

    #[test]
    fn test_placeholders_resolve_across_sources() {
        let sources = PropertySources::new();
        sources.add_last(nacos_source("app", &[("url", "http://${host}:${port:8848}")]));
        sources.add_last(Arc::new(MapPropertySource::new("local").with_property("host", "10.0.0.1")));

        assert_eq!(sources.get_property("url").as_deref(), Some("http://10.0.0.1:8848"));
        assert_eq!(sources.resolve_placeholders("${host}/${unknown}"), "10.0.0.1/${unknown}");
        assert_eq!(sources.get_property_or("missing", "fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_builder_refreshes_key_space() {
        let service = Arc::new(InMemoryConfigService::new().with_config("app.yaml", "G", "a:\n  b: 1\n"));
        let builder = NacosPropertySourceBuilder::new(
            service.clone(),
            Arc::new(ConfigParseRegistry::with_defaults()),
        )
        .listener_timeout(Duration::from_millis(500));

        let source = builder.build("app.yaml", "G", None, true).await.unwrap();
        assert_eq!(source.config_type(), "yaml");
        assert_eq!(source.get_property("a.b").as_deref(), Some("1"));

        service.publish_config("app.yaml", "G", "c: 2\n", None).await.unwrap();
        assert_eq!(source.get_property("a.b"), None);
        assert_eq!(source.get_property("c").as_deref(), Some("2"));

        // 解析失败的更新不生效
        service.publish_config("app.yaml", "G", "c: [", None).await.unwrap();
        assert_eq!(source.get_property("c").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_builder_missing_config() {
        let service = Arc::new(InMemoryConfigService::new());
        let builder = NacosPropertySourceBuilder::new(service.clone(), Arc::new(ConfigParseRegistry::new()));
        let source = builder.build("absent", "", Some("PROPERTIES"), false).await.unwrap();
        assert!(source.property_names().is_empty());
        assert_eq!(source.config_type(), "properties");
        assert_eq!(service.listener_count("absent", ""), 0);
    }
}
