//! 外部配置服务接口
//!
//! 真实的 Nacos 客户端在 crate 之外实现 [`ConfigService`]；
//! [`InMemoryConfigService`] 提供进程内实现，供测试与演示使用。

use crate::constants::DEFAULT_GROUP;
use crate::error::Result;
use crate::event::{
    ConfigEventPublisher, NacosConfigListenerRegisteredEvent, NacosConfigPublishedEvent,
    NacosConfigReceivedEvent, NacosConfigRemovedEvent,
};
use crate::listener::ConfigListener;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 配置键：(dataId, group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub data_id: String,
    pub group: String,
}

impl ConfigKey {
    /// 分组为空白时使用 `DEFAULT_GROUP`
    pub fn new(data_id: impl Into<String>, group: impl Into<String>) -> Self {
        let group = group.into();
        let group = if group.trim().is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            group
        };
        Self {
            data_id: data_id.into(),
            group,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.data_id, self.group)
    }
}

/// 配置服务 trait
///
/// 内容以原始文本传递，解析由调用方通过注册表完成
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// 拉取配置内容，不存在时返回 `None`
    async fn get_config(&self, data_id: &str, group: &str, timeout_ms: u64) -> Result<Option<String>>;

    /// 发布配置，返回服务端是否接受
    async fn publish_config(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        config_type: Option<&str>,
    ) -> Result<bool>;

    async fn remove_config(&self, data_id: &str, group: &str) -> Result<bool>;

    /// 订阅配置变更
    async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigListener>,
    ) -> Result<()>;

    /// 按监听器名称注销
    async fn remove_listener(&self, data_id: &str, group: &str, listener_name: &str) -> Result<()>;
}

/// 进程内配置服务
///
/// 发布与删除时按注册顺序依次通知监听器，删除以空内容通知
#[derive(Default)]
pub struct InMemoryConfigService {
    contents: RwLock<HashMap<ConfigKey, String>>,
    config_types: RwLock<HashMap<ConfigKey, String>>,
    listeners: RwLock<HashMap<ConfigKey, Vec<Arc<dyn ConfigListener>>>>,
}

impl fmt::Debug for InMemoryConfigService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.contents.read().keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("InMemoryConfigService")
            .field("configs", &keys)
            .field("listeners_count", &self.listeners.read().values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl InMemoryConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置配置内容，不通知监听器
    pub fn with_config(self, data_id: &str, group: &str, content: impl Into<String>) -> Self {
        self.contents
            .write()
            .insert(ConfigKey::new(data_id, group), content.into());
        self
    }

    /// 最近一次发布时声明的类型
    pub fn config_type(&self, data_id: &str, group: &str) -> Option<String> {
        self.config_types
            .read()
            .get(&ConfigKey::new(data_id, group))
            .cloned()
    }

    pub fn listener_count(&self, data_id: &str, group: &str) -> usize {
        self.listeners
            .read()
            .get(&ConfigKey::new(data_id, group))
            .map_or(0, Vec::len)
    }

    async fn notify(&self, key: &ConfigKey, content: &str) {
        // 复制列表后释放锁，回调期间允许注册与注销
        let listeners = self.listeners.read().get(key).cloned().unwrap_or_default();
        for listener in listeners {
            tracing::debug!("Notifying listener '{}' of {}", listener.listener_name(), key);
            listener.receive_config_info(content.to_string()).await;
        }
    }
}

#[async_trait]
impl ConfigService for InMemoryConfigService {
    async fn get_config(&self, data_id: &str, group: &str, _timeout_ms: u64) -> Result<Option<String>> {
        Ok(self
            .contents
            .read()
            .get(&ConfigKey::new(data_id, group))
            .cloned())
    }

    async fn publish_config(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        config_type: Option<&str>,
    ) -> Result<bool> {
        let key = ConfigKey::new(data_id, group);
        self.contents.write().insert(key.clone(), content.to_string());
        if let Some(config_type) = config_type {
            self.config_types
                .write()
                .insert(key.clone(), config_type.to_string());
        }
        self.notify(&key, content).await;
        Ok(true)
    }

    async fn remove_config(&self, data_id: &str, group: &str) -> Result<bool> {
        let key = ConfigKey::new(data_id, group);
        let removed = self.contents.write().remove(&key).is_some();
        self.config_types.write().remove(&key);
        if removed {
            self.notify(&key, "").await;
        }
        Ok(removed)
    }

    async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigListener>,
    ) -> Result<()> {
        let key = ConfigKey::new(data_id, group);
        tracing::debug!("Registered listener '{}' for {}", listener.listener_name(), key);
        self.listeners.write().entry(key).or_default().push(listener);
        Ok(())
    }

    async fn remove_listener(&self, data_id: &str, group: &str, listener_name: &str) -> Result<()> {
        let key = ConfigKey::new(data_id, group);
        if let Some(listeners) = self.listeners.write().get_mut(&key) {
            listeners.retain(|l| l.listener_name() != listener_name);
        }
        Ok(())
    }
}

/// 发布配置事件的服务装饰器
pub struct EventPublishingConfigService<S: ConfigService> {
    inner: S,
    publisher: Arc<ConfigEventPublisher>,
}

impl<S: ConfigService> EventPublishingConfigService<S> {
    pub fn new(inner: S, publisher: Arc<ConfigEventPublisher>) -> Self {
        Self { inner, publisher }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn publisher(&self) -> &Arc<ConfigEventPublisher> {
        &self.publisher
    }
}

#[async_trait]
impl<S: ConfigService> ConfigService for EventPublishingConfigService<S> {
    async fn get_config(&self, data_id: &str, group: &str, timeout_ms: u64) -> Result<Option<String>> {
        let content = self.inner.get_config(data_id, group, timeout_ms).await?;
        self.publisher.publish_event(Arc::new(NacosConfigReceivedEvent::new(
            data_id,
            group,
            content.clone(),
            None,
        )));
        Ok(content)
    }

    async fn publish_config(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        config_type: Option<&str>,
    ) -> Result<bool> {
        let published = self
            .inner
            .publish_config(data_id, group, content, config_type)
            .await?;
        self.publisher.publish_event(Arc::new(NacosConfigPublishedEvent::new(
            data_id,
            group,
            content.to_string(),
            published,
        )));
        Ok(published)
    }

    async fn remove_config(&self, data_id: &str, group: &str) -> Result<bool> {
        let removed = self.inner.remove_config(data_id, group).await?;
        self.publisher
            .publish_event(Arc::new(NacosConfigRemovedEvent::new(data_id, group, removed)));
        Ok(removed)
    }

    async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigListener>,
    ) -> Result<()> {
        let name = listener.listener_name().to_string();
        let wrapped = Arc::new(EventPublishingListener {
            inner: listener,
            publisher: Arc::clone(&self.publisher),
            data_id: data_id.to_string(),
            group: group.to_string(),
        });
        self.inner.add_listener(data_id, group, wrapped).await?;
        self.publisher.publish_event(Arc::new(NacosConfigListenerRegisteredEvent::new(
            data_id, group, &name, true,
        )));
        Ok(())
    }

    async fn remove_listener(&self, data_id: &str, group: &str, listener_name: &str) -> Result<()> {
        self.inner.remove_listener(data_id, group, listener_name).await?;
        self.publisher.publish_event(Arc::new(NacosConfigListenerRegisteredEvent::new(
            data_id,
            group,
            listener_name,
            false,
        )));
        Ok(())
    }
}

/// 收到推送时先发布事件再交给原监听器
struct EventPublishingListener {
    inner: Arc<dyn ConfigListener>,
    publisher: Arc<ConfigEventPublisher>,
    data_id: String,
    group: String,
}

#[async_trait]
impl ConfigListener for EventPublishingListener {
    async fn receive_config_info(&self, content: String) {
        self.publisher.publish_event(Arc::new(NacosConfigReceivedEvent::new(
            &self.data_id,
            &self.group,
            Some(content.clone()),
            None,
        )));
        self.inner.receive_config_info(content).await;
    }

    fn listener_name(&self) -> &str {
        self.inner.listener_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventListener};
    use parking_lot::Mutex;

    struct Collecting {
        name: String,
        received: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ConfigListener for Collecting {
        async fn receive_config_info(&self, content: String) {
            self.received.lock().push(content);
        }

        fn listener_name(&self) -> &str {
            &self.name
        }
    }

    struct EventNames(Arc<Mutex<Vec<String>>>);

    impl EventListener for EventNames {
        fn on_event(&self, event: Arc<dyn Event>) {
            self.0.lock().push(event.event_name().to_string());
        }
    }

    fn collecting(name: &str) -> (Arc<Collecting>, Arc<Mutex<Vec<String>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let listener = Arc::new(Collecting {
            name: name.to_string(),
            received: Arc::clone(&received),
        });
        (listener, received)
    }

    #[test]
    fn test_config_key_default_group() {
        assert_eq!(ConfigKey::new("app", "  ").group, DEFAULT_GROUP);
        assert_eq!(ConfigKey::new("app", "G").to_string(), "app@G");
    }

    #[tokio::test]
    async fn test_publish_notifies_listeners_in_order() {
        let service = InMemoryConfigService::new();
        let (first, first_seen) = collecting("first");
        let (second, second_seen) = collecting("second");
        service.add_listener("app", "", first).await.unwrap();
        service.add_listener("app", DEFAULT_GROUP, second).await.unwrap();
        assert_eq!(service.listener_count("app", DEFAULT_GROUP), 2);

        service.publish_config("app", "", "a=1", Some("properties")).await.unwrap();
        assert_eq!(*first_seen.lock(), vec!["a=1"]);
        assert_eq!(*second_seen.lock(), vec!["a=1"]);
        assert_eq!(service.config_type("app", "").as_deref(), Some("properties"));
        assert_eq!(service.get_config("app", "", 1000).await.unwrap().as_deref(), Some("a=1"));

        service.remove_listener("app", "", "first").await.unwrap();
        assert!(service.remove_config("app", "").await.unwrap());
        assert_eq!(first_seen.lock().len(), 1);
        assert_eq!(*second_seen.lock(), vec!["a=1", ""]);
        assert_eq!(service.get_config("app", "", 1000).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_event_publishing_decorator() {
        let publisher = Arc::new(ConfigEventPublisher::default());
        let names = Arc::new(Mutex::new(Vec::new()));
        publisher.add_listener(Arc::new(EventNames(Arc::clone(&names))));

        let service = EventPublishingConfigService::new(
            InMemoryConfigService::new().with_config("app", "G", "a=0"),
            Arc::clone(&publisher),
        );
        let (listener, seen) = collecting("collector");

        assert_eq!(service.get_config("app", "G", 1000).await.unwrap().as_deref(), Some("a=0"));
        service.add_listener("app", "G", listener).await.unwrap();
        service.publish_config("app", "G", "a=1", None).await.unwrap();
        service.remove_listener("app", "G", "collector").await.unwrap();
        service.remove_config("app", "G").await.unwrap();

        assert_eq!(*seen.lock(), vec!["a=1"]);
        assert_eq!(service.inner().listener_count("app", "G"), 0);
        assert_eq!(
            *names.lock(),
            vec![
                "NacosConfigReceivedEvent",
                "NacosConfigListenerRegisteredEvent",
                "NacosConfigReceivedEvent",
                "NacosConfigPublishedEvent",
                "NacosConfigListenerRegisteredEvent",
                "NacosConfigRemovedEvent",
            ]
        );
    }
}
