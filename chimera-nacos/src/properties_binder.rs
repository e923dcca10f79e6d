//! 把远程配置绑定到 [`NacosProperties`] 目标，并在配置变更时重新绑定

use crate::binder::{BindReport, NacosProperties, PropertyBinder};
use crate::config_service::{ConfigKey, ConfigService};
use crate::config_type::ConfigType;
use crate::error::{NacosConfigError, Result};
use crate::event::ConfigEventPublisher;
use crate::key_space::FlattenedKeySpace;
use crate::listener::TimeoutListener;
use crate::parse_registry::ConfigParseRegistry;
use crate::settings::NacosSettings;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::Arc;

/// 已绑定的配置对象
pub struct BoundProperties<T> {
    target: Arc<RwLock<T>>,
    key: ConfigKey,
    config_type: String,
    last_report: Arc<Mutex<BindReport>>,
    listener_name: Option<String>,
}

impl<T> BoundProperties<T> {
    pub fn target(&self) -> &Arc<RwLock<T>> {
        &self.target
    }

    /// 读取当前值
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.target.read()
    }

    pub fn config_key(&self) -> &ConfigKey {
        &self.key
    }

    pub fn config_type(&self) -> &str {
        &self.config_type
    }

    /// 最近一次成功绑定的结果
    pub fn last_report(&self) -> BindReport {
        self.last_report.lock().clone()
    }

    pub fn is_auto_refreshed(&self) -> bool {
        self.listener_name.is_some()
    }
}

impl<T: Clone> BoundProperties<T> {
    pub fn snapshot(&self) -> T {
        self.target.read().clone()
    }
}

/// 配置属性绑定器
///
/// 读取目标类型声明的 dataId、分组与类型，拉取并解析配置后绑定；
/// 声明了 `auto_refreshed` 的目标在配置变更时重新绑定。
/// 重新绑定是累积的：新内容中不再出现的键不会重置对应字段
pub struct NacosConfigurationPropertiesBinder {
    service: Arc<dyn ConfigService>,
    registry: Arc<ConfigParseRegistry>,
    settings: NacosSettings,
    publisher: Option<Arc<ConfigEventPublisher>>,
}

impl NacosConfigurationPropertiesBinder {
    pub fn new(service: Arc<dyn ConfigService>, settings: NacosSettings) -> Self {
        Self {
            service,
            registry: Arc::new(ConfigParseRegistry::with_defaults()),
            settings,
            publisher: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ConfigParseRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// 监听器超时时发布 `NacosConfigTimeoutEvent`
    pub fn with_event_publisher(mut self, publisher: Arc<ConfigEventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn settings(&self) -> &NacosSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ConfigParseRegistry> {
        &self.registry
    }

    /// 绑定目标对象
    ///
    /// 配置不存在时目标保持原值；严格模式下的绑定错误直接返回，
    /// 此时不会注册自动刷新监听器
    pub async fn bind<T: NacosProperties>(&self, target: Arc<RwLock<T>>) -> Result<BoundProperties<T>> {
        let meta = T::properties_meta();
        let data_id = meta.data_id.ok_or_else(|| {
            NacosConfigError::Settings(format!("'{}' does not declare a dataId", T::type_name()))
        })?;
        let key = ConfigKey::new(data_id, self.settings.group_or_default(meta.group));
        let config_type = match meta.config_type {
            Some(declared) => ConfigType::normalize(declared),
            None => self.infer_config_type(data_id),
        };
        let binder = PropertyBinder::new(self.settings.binder_options(&meta));

        let content = self
            .service
            .get_config(&key.data_id, &key.group, self.settings.fetch_timeout_ms)
            .await?;

        let report = match content {
            Some(content) => {
                let key_space = self
                    .registry
                    .resolve(&key.data_id, &key.group, &content, &config_type)?;
                binder.bind(&mut *target.write(), &key_space)?
            }
            None => {
                tracing::debug!("Config {} does not exist, '{}' keeps its defaults", key, T::type_name());
                BindReport::default()
            }
        };

        let last_report = Arc::new(Mutex::new(report));
        let listener_name = if meta.auto_refreshed {
            let name = format!("{}#{}", T::type_name(), key);
            self.register_refresh::<T>(&name, &key, &config_type, binder, &target, &last_report)
                .await?;
            Some(name)
        } else {
            None
        };

        tracing::info!(
            "Bound config {} ({}) onto '{}'{}",
            key,
            config_type,
            T::type_name(),
            if listener_name.is_some() { " with auto refresh" } else { "" }
        );

        Ok(BoundProperties {
            target,
            key,
            config_type,
            last_report,
            listener_name,
        })
    }

    /// 注销自动刷新
    pub async fn unbind<T>(&self, bound: &mut BoundProperties<T>) -> Result<()> {
        if let Some(name) = bound.listener_name.take() {
            self.service
                .remove_listener(&bound.key.data_id, &bound.key.group, &name)
                .await?;
        }
        Ok(())
    }

    fn infer_config_type(&self, data_id: &str) -> String {
        let has_extension = data_id
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.parse::<ConfigType>().is_ok());
        if has_extension {
            ConfigType::from_data_id(data_id).as_str().to_string()
        } else {
            ConfigType::normalize(&self.settings.default_config_type)
        }
    }

    async fn register_refresh<T: NacosProperties>(
        &self,
        name: &str,
        key: &ConfigKey,
        config_type: &str,
        binder: PropertyBinder,
        target: &Arc<RwLock<T>>,
        last_report: &Arc<Mutex<BindReport>>,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let parse_key = key.clone();
        let parse_type = config_type.to_string();
        let target = Arc::clone(target);
        let last_report = Arc::clone(last_report);

        // 解析在阻塞线程池上进行，截止前完成才在写锁下重新绑定
        let mut listener = TimeoutListener::new(
            name,
            self.settings.listener_timeout(),
            move |content: String| -> anyhow::Result<FlattenedKeySpace> {
                Ok(registry.resolve(&parse_key.data_id, &parse_key.group, &content, &parse_type)?)
            },
        )
        .on_commit(move |key_space: FlattenedKeySpace| {
            match binder.bind(&mut *target.write(), &key_space) {
                Ok(report) => *last_report.lock() = report,
                Err(e) => tracing::error!("Failed to rebind '{}': {}", T::type_name(), e),
            }
        });

        if let Some(publisher) = &self.publisher {
            listener = listener.with_timeout_events(Arc::clone(publisher), &key.data_id, &key.group);
        }

        self.service
            .add_listener(&key.data_id, &key.group, Arc::new(listener))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{coerce, PropertiesMeta, PropertyField, RawValue};
    use crate::config_service::InMemoryConfigService;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct AppConfig {
        name: String,
        port: u16,
    }

    impl NacosProperties for AppConfig {
        fn properties_meta() -> PropertiesMeta {
            PropertiesMeta {
                data_id: Some("app"),
                prefix: "app",
                auto_refreshed: true,
                ..PropertiesMeta::default()
            }
        }

        fn fields() -> Vec<PropertyField<Self>> {
            vec![
                PropertyField::value::<String>("name", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.name = coerce(raw)?;
                    Ok(())
                }),
                PropertyField::value::<u16>("port", None, |t: &mut Self, raw: RawValue<'_>| {
                    t.port = coerce(raw)?;
                    Ok(())
                }),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Undeclared;

    impl NacosProperties for Undeclared {
        fn fields() -> Vec<PropertyField<Self>> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_bind_and_refresh() {
        let service = Arc::new(
            InMemoryConfigService::new().with_config("app", "DEFAULT_GROUP", "app.name=demo\napp.port=80"),
        );
        let binder = NacosConfigurationPropertiesBinder::new(service.clone(), NacosSettings::default());

        let mut bound = binder.bind(Arc::new(RwLock::new(AppConfig::default()))).await.unwrap();
        assert_eq!(bound.snapshot(), AppConfig { name: "demo".into(), port: 80 });
        assert_eq!(bound.config_type(), "properties");
        assert!(bound.is_auto_refreshed());
        assert_eq!(service.listener_count("app", ""), 1);

        service
            .publish_config("app", "", "app.port=8080", None)
            .await
            .unwrap();
        // 累积绑定：name 保持原值
        assert_eq!(bound.snapshot(), AppConfig { name: "demo".into(), port: 8080 });
        assert_eq!(bound.last_report().bound, vec!["app.port"]);

        binder.unbind(&mut bound).await.unwrap();
        assert_eq!(service.listener_count("app", ""), 0);
        assert!(!bound.is_auto_refreshed());
    }

    #[tokio::test]
    async fn test_missing_config_keeps_defaults() {
        let binder = NacosConfigurationPropertiesBinder::new(
            Arc::new(InMemoryConfigService::new()),
            NacosSettings::default(),
        );
        let initial = AppConfig { name: "local".into(), port: 1 };
        let bound = binder.bind(Arc::new(RwLock::new(initial.clone()))).await.unwrap();
        assert_eq!(bound.snapshot(), initial);
        assert!(bound.last_report().is_empty());
    }

    #[tokio::test]
    async fn test_strict_settings_reject_bad_values() {
        let service = Arc::new(InMemoryConfigService::new().with_config("app", "", "app.port=eighty"));
        let settings = NacosSettings {
            ignore_invalid_fields: Some(false),
            ..NacosSettings::default()
        };
        let binder = NacosConfigurationPropertiesBinder::new(service.clone(), settings);

        let err = binder
            .bind(Arc::new(RwLock::new(AppConfig::default())))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NacosConfigError::Bind(_)));
        assert_eq!(service.listener_count("app", ""), 0);
    }

    #[tokio::test]
    async fn test_target_without_data_id() {
        let binder = NacosConfigurationPropertiesBinder::new(
            Arc::new(InMemoryConfigService::new()),
            NacosSettings::default(),
        );
        let err = binder.bind(Arc::new(RwLock::new(Undeclared))).await.err().unwrap();
        assert!(matches!(err, NacosConfigError::Settings(_)));
    }

    #[test]
    fn test_infer_config_type() {
        let binder = NacosConfigurationPropertiesBinder::new(
            Arc::new(InMemoryConfigService::new()),
            NacosSettings {
                default_config_type: "YAML".to_string(),
                ..NacosSettings::default()
            },
        );
        assert_eq!(binder.infer_config_type("app.json"), "json");
        assert_eq!(binder.infer_config_type("app"), "yaml");
        assert_eq!(binder.infer_config_type("app.v2"), "yaml");
    }
}
