use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// 配置事件 trait - 所有 Nacos 配置事件都实现此 trait
pub trait Event: Any + Send + Sync {
    /// 获取事件名称
    fn event_name(&self) -> &str;

    fn timestamp(&self) -> SystemTime;

    /// 事件关联的 dataId
    fn data_id(&self) -> &str;

    /// 事件关联的分组
    fn group(&self) -> &str;

    /// 转换为 Any 引用，用于类型转换
    fn as_any(&self) -> &dyn Any;
}

macro_rules! config_event {
    ($ty:ident) => {
        impl Event for $ty {
            fn event_name(&self) -> &str {
                stringify!($ty)
            }

            fn timestamp(&self) -> SystemTime {
                self.timestamp
            }

            fn data_id(&self) -> &str {
                &self.data_id
            }

            fn group(&self) -> &str {
                &self.group
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

/// 收到配置内容事件
///
/// 首次拉取与每次推送通知都会触发
#[derive(Debug, Clone)]
pub struct NacosConfigReceivedEvent {
    pub data_id: String,
    pub group: String,
    pub content: Option<String>,
    pub config_type: Option<String>,
    pub timestamp: SystemTime,
}

impl NacosConfigReceivedEvent {
    pub fn new(data_id: &str, group: &str, content: Option<String>, config_type: Option<String>) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            content,
            config_type,
            timestamp: SystemTime::now(),
        }
    }
}

config_event!(NacosConfigReceivedEvent);

/// 发布配置事件
#[derive(Debug, Clone)]
pub struct NacosConfigPublishedEvent {
    pub data_id: String,
    pub group: String,
    pub content: String,
    /// 服务端是否接受了发布
    pub published: bool,
    pub timestamp: SystemTime,
}

impl NacosConfigPublishedEvent {
    pub fn new(data_id: &str, group: &str, content: String, published: bool) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            content,
            published,
            timestamp: SystemTime::now(),
        }
    }
}

config_event!(NacosConfigPublishedEvent);

/// 删除配置事件
#[derive(Debug, Clone)]
pub struct NacosConfigRemovedEvent {
    pub data_id: String,
    pub group: String,
    pub removed: bool,
    pub timestamp: SystemTime,
}

impl NacosConfigRemovedEvent {
    pub fn new(data_id: &str, group: &str, removed: bool) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            removed,
            timestamp: SystemTime::now(),
        }
    }
}

config_event!(NacosConfigRemovedEvent);

/// 监听器注册/注销事件
#[derive(Debug, Clone)]
pub struct NacosConfigListenerRegisteredEvent {
    pub data_id: String,
    pub group: String,
    pub listener_name: String,
    /// true 为注册，false 为注销
    pub registered: bool,
    pub timestamp: SystemTime,
}

impl NacosConfigListenerRegisteredEvent {
    pub fn new(data_id: &str, group: &str, listener_name: &str, registered: bool) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            listener_name: listener_name.to_string(),
            registered,
            timestamp: SystemTime::now(),
        }
    }
}

config_event!(NacosConfigListenerRegisteredEvent);

/// 监听器执行超时事件
#[derive(Debug, Clone)]
pub struct NacosConfigTimeoutEvent {
    pub data_id: String,
    pub group: String,
    pub timeout: Duration,
    pub message: String,
    pub timestamp: SystemTime,
}

impl NacosConfigTimeoutEvent {
    pub fn new(data_id: &str, group: &str, timeout: Duration, message: String) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            timeout,
            message,
            timestamp: SystemTime::now(),
        }
    }
}

config_event!(NacosConfigTimeoutEvent);

/// 事件监听器 trait
///
/// 默认同步执行，支持异步扩展
pub trait EventListener: Send + Sync {
    /// 处理事件（同步）
    fn on_event(&self, event: Arc<dyn Event>);

    /// 获取监听器名称（用于日志）
    fn listener_name(&self) -> &str {
        "AnonymousListener"
    }

    /// 是否支持该事件类型（默认支持所有事件）
    fn supports_event(&self, event_name: &str) -> bool {
        let _ = event_name;
        true
    }
}

/// 类型化事件监听器 trait
pub trait TypedEventListener<E: Event>: Send + Sync {
    fn on_event(&self, event: &E);

    fn listener_name(&self) -> &str {
        "AnonymousTypedListener"
    }
}

/// 将 TypedEventListener<E> 适配为 EventListener
pub struct TypedEventListenerAdapter<E: Event + 'static, L: TypedEventListener<E>> {
    listener: Arc<L>,
    _phantom: std::marker::PhantomData<fn(E)>,
}

impl<E: Event + 'static, L: TypedEventListener<E>> TypedEventListenerAdapter<E, L> {
    pub fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E: Event + 'static, L: TypedEventListener<E> + 'static> EventListener
    for TypedEventListenerAdapter<E, L>
{
    fn on_event(&self, event: Arc<dyn Event>) {
        if let Some(typed_event) = event.as_any().downcast_ref::<E>() {
            self.listener.on_event(typed_event);
        }
    }

    fn listener_name(&self) -> &str {
        self.listener.listener_name()
    }

    fn supports_event(&self, event_name: &str) -> bool {
        let event_type_name = std::any::type_name::<E>();
        let short_name = event_type_name
            .rsplit("::")
            .next()
            .unwrap_or(event_type_name);
        event_name == short_name
    }
}

/// 错误处理器类型
///
/// 用于处理监听器执行过程中的 panic
pub type ErrorHandler = Arc<dyn Fn(&dyn EventListener, Arc<dyn Event>, &anyhow::Error) + Send + Sync>;

/// 事件多播器 trait
///
/// 负责将配置事件传播到所有注册的监听器
pub trait ConfigEventMulticaster: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn EventListener>);

    fn remove_listener(&self, listener_name: &str);

    fn remove_all_listeners(&self);

    fn multicast_event(&self, event: Arc<dyn Event>);

    fn listener_count(&self) -> usize;
}

/// 简单事件多播器实现
///
/// 同步模式下按注册顺序依次调用；异步模式下每个监听器 spawn 到当前 tokio runtime，
/// 没有 runtime 时降级为同步执行
pub struct SimpleConfigEventMulticaster {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
    error_handler: RwLock<Option<ErrorHandler>>,
    async_mode: bool,
}

impl SimpleConfigEventMulticaster {
    /// 创建同步模式的多播器
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            error_handler: RwLock::new(None),
            async_mode: false,
        }
    }

    /// 创建异步模式的多播器
    pub fn new_async() -> Self {
        Self {
            async_mode: true,
            ..Self::new()
        }
    }

    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&dyn EventListener, Arc<dyn Event>, &anyhow::Error) + Send + Sync + 'static,
    {
        *self.error_handler.write() = Some(Arc::new(handler));
    }

    pub fn remove_error_handler(&self) {
        *self.error_handler.write() = None;
    }

    fn invoke_listener(
        listener: &Arc<dyn EventListener>,
        event: Arc<dyn Event>,
        error_handler: Option<&ErrorHandler>,
    ) {
        // 单个监听器 panic 不影响其他监听器，也不传播给发布方
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            listener.on_event(Arc::clone(&event));
        })) {
            let err = anyhow::anyhow!("Listener panicked: {:?}", e);
            match error_handler {
                Some(handler) => handler(listener.as_ref(), event, &err),
                None => tracing::error!(
                    "Listener '{}' panicked while handling event '{}' for {}@{}: {:?}",
                    listener.listener_name(),
                    event.event_name(),
                    event.data_id(),
                    event.group(),
                    err
                ),
            }
        }
    }
}

impl Default for SimpleConfigEventMulticaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEventMulticaster for SimpleConfigEventMulticaster {
    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        tracing::debug!("Added config event listener: {}", listener.listener_name());
        self.listeners.write().push(listener);
    }

    fn remove_listener(&self, listener_name: &str) {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.listener_name() != listener_name);
        if listeners.len() != before {
            tracing::debug!("Removed config event listener: {}", listener_name);
        }
    }

    fn remove_all_listeners(&self) {
        self.listeners.write().clear();
        tracing::debug!("Removed all config event listeners");
    }

    fn multicast_event(&self, event: Arc<dyn Event>) {
        // 复制监听器列表，避免回调期间持锁
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.supports_event(event.event_name()))
            .map(Arc::clone)
            .collect();

        tracing::debug!(
            "Multicasting {} for {}@{} to {} listener(s)",
            event.event_name(),
            event.data_id(),
            event.group(),
            listeners.len()
        );

        let error_handler = self.error_handler.read().clone();

        for listener in listeners {
            if self.async_mode {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let event = Arc::clone(&event);
                    let error_handler = error_handler.clone();
                    handle.spawn(async move {
                        Self::invoke_listener(&listener, event, error_handler.as_ref());
                    });
                    continue;
                }
                tracing::warn!("No tokio runtime available, falling back to sync execution");
            }
            Self::invoke_listener(&listener, Arc::clone(&event), error_handler.as_ref());
        }
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

/// 配置事件发布器
pub struct ConfigEventPublisher {
    multicaster: Arc<dyn ConfigEventMulticaster>,
}

impl ConfigEventPublisher {
    pub fn new(multicaster: Arc<dyn ConfigEventMulticaster>) -> Self {
        Self { multicaster }
    }

    pub fn publish_event(&self, event: Arc<dyn Event>) {
        self.multicaster.multicast_event(event);
    }

    pub fn multicaster(&self) -> &Arc<dyn ConfigEventMulticaster> {
        &self.multicaster
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.multicaster.add_listener(listener);
    }

    /// 注册类型化监听器
    pub fn add_typed_listener<E, L>(&self, listener: Arc<L>)
    where
        E: Event + 'static,
        L: TypedEventListener<E> + 'static,
    {
        self.multicaster
            .add_listener(Arc::new(TypedEventListenerAdapter::<E, L>::new(listener)));
    }

    pub fn remove_listener(&self, listener_name: &str) {
        self.multicaster.remove_listener(listener_name);
    }

    pub fn listener_count(&self) -> usize {
        self.multicaster.listener_count()
    }
}

impl Default for ConfigEventPublisher {
    fn default() -> Self {
        Self::new(Arc::new(SimpleConfigEventMulticaster::new()))
    }
}
