//! 配置变更监听器
//!
//! [`TimeoutListener`] 给内容回调加上软超时：回调在阻塞线程池上执行，
//! 结果经一次性通道交回分发方。截止时间先到时分发方丢弃接收端，
//! 回调继续运行到结束，但它的结果不会再被任何人观察到。

use crate::event::{ConfigEventPublisher, NacosConfigTimeoutEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// 配置内容监听器
///
/// 与外部配置服务约定的订阅回调形态：每次收到新内容调用一次
#[async_trait]
pub trait ConfigListener: Send + Sync {
    /// 处理新到达的配置内容
    async fn receive_config_info(&self, content: String);

    /// 获取监听器名称（用于日志与注销）
    fn listener_name(&self) -> &str {
        "AnonymousConfigListener"
    }
}

/// 监听器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Running,
    CompletedInTime,
    CompletedLate,
    /// 回调在截止前返回错误或 panic
    Failed,
}

/// 一次分发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 截止前完成，结果已提交
    CompletedInTime,
    /// 截止时间先到，结果被放弃
    CompletedLate,
    Failed,
}

impl From<DispatchOutcome> for ListenerState {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::CompletedInTime => ListenerState::CompletedInTime,
            DispatchOutcome::CompletedLate => ListenerState::CompletedLate,
            DispatchOutcome::Failed => ListenerState::Failed,
        }
    }
}

/// 内容处理函数，在阻塞线程池上执行
pub type ContentHandler<T> = Arc<dyn Fn(String) -> anyhow::Result<T> + Send + Sync>;

/// 结果提交函数，只在截止前完成时由分发方调用
pub type ResultCommitter<T> = Arc<dyn Fn(T) + Send + Sync>;

/// 超时事件的发布目标
struct TimeoutEventTarget {
    publisher: Arc<ConfigEventPublisher>,
    data_id: String,
    group: String,
}

/// 带软超时的监听器
///
/// 状态机：`Idle -> Running -> {CompletedInTime, CompletedLate}`。
/// 超时不是错误，只记录日志（以及发布 [`NacosConfigTimeoutEvent`]），不重试。
pub struct TimeoutListener<T: Send + 'static> {
    name: String,
    timeout: Duration,
    handler: ContentHandler<T>,
    committer: Option<ResultCommitter<T>>,
    state: Mutex<ListenerState>,
    timeout_events: Option<TimeoutEventTarget>,
}

impl<T: Send + 'static> TimeoutListener<T> {
    pub fn new<F>(name: impl Into<String>, timeout: Duration, handler: F) -> Self
    where
        F: Fn(String) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            timeout,
            handler: Arc::new(handler),
            committer: None,
            state: Mutex::new(ListenerState::Idle),
            timeout_events: None,
        }
    }

    /// 设置截止前完成时的提交函数
    pub fn on_commit<C>(mut self, committer: C) -> Self
    where
        C: Fn(T) + Send + Sync + 'static,
    {
        self.committer = Some(Arc::new(committer));
        self
    }

    /// 超时时发布 [`NacosConfigTimeoutEvent`]
    pub fn with_timeout_events(
        mut self,
        publisher: Arc<ConfigEventPublisher>,
        data_id: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        self.timeout_events = Some(TimeoutEventTarget {
            publisher,
            data_id: data_id.into(),
            group: group.into(),
        });
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 最近一次分发所处的状态
    pub fn state(&self) -> ListenerState {
        *self.state.lock()
    }

    /// 分发一次内容
    ///
    /// 至多观察到一个结果：截止前收到则提交，否则丢弃接收端
    pub async fn dispatch(&self, content: String) -> DispatchOutcome {
        *self.state.lock() = ListenerState::Running;

        let (tx, rx) = oneshot::channel();
        let handler = Arc::clone(&self.handler);
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || {
            let result = handler(content);
            // 发送失败说明截止时间已过、接收端被丢弃
            if tx.send(result).is_err() {
                tracing::debug!("Listener '{}' finished after its deadline, result discarded", name);
            }
        });

        let outcome = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(value))) => {
                if let Some(committer) = &self.committer {
                    committer(value);
                }
                DispatchOutcome::CompletedInTime
            }
            Ok(Ok(Err(e))) => {
                tracing::error!("Listener '{}' failed to handle config content: {:#}", self.name, e);
                DispatchOutcome::Failed
            }
            Ok(Err(_)) => {
                // 发送端未发送即被丢弃，回调 panic
                tracing::error!("Listener '{}' panicked while handling config content", self.name);
                DispatchOutcome::Failed
            }
            Err(_) => {
                self.on_deadline_expired();
                DispatchOutcome::CompletedLate
            }
        };

        *self.state.lock() = outcome.into();
        outcome
    }

    fn on_deadline_expired(&self) {
        tracing::warn!(
            "Listener '{}' did not complete within {:?}, this update is skipped",
            self.name,
            self.timeout
        );

        if let Some(target) = &self.timeout_events {
            target.publisher.publish_event(Arc::new(NacosConfigTimeoutEvent::new(
                &target.data_id,
                &target.group,
                self.timeout,
                format!("Listener '{}' timed out", self.name),
            )));
        }
    }

    /// 转换为同步回调，每次调用把分发提交到给定的 runtime
    pub fn into_callback(self: Arc<Self>, handle: tokio::runtime::Handle) -> impl Fn(String) + Send + Sync {
        move |content: String| {
            let listener = Arc::clone(&self);
            handle.spawn(async move {
                listener.dispatch(content).await;
            });
        }
    }
}

#[async_trait]
impl<T: Send + 'static> ConfigListener for TimeoutListener<T> {
    async fn receive_config_info(&self, content: String) {
        self.dispatch(content).await;
    }

    fn listener_name(&self) -> &str {
        &self.name
    }
}

/// 用超时包装内容回调
///
/// 回调的副作用在回调内部发生，超时后仍会执行完；
/// 需要“超时即不生效”语义时使用 [`TimeoutListener::on_commit`] 分离提交步骤
pub fn wrap_with_timeout<F>(callback: F, timeout_millis: u64) -> TimeoutListener<()>
where
    F: Fn(String) -> anyhow::Result<()> + Send + Sync + 'static,
{
    TimeoutListener::new("TimeoutConfigListener", Duration::from_millis(timeout_millis), callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventListener, Event};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sleeping_listener(
        sleep_ms: u64,
        timeout_ms: u64,
        observed: Arc<Mutex<String>>,
    ) -> TimeoutListener<String> {
        TimeoutListener::new("sleepy", Duration::from_millis(timeout_ms), move |content: String| {
            std::thread::sleep(Duration::from_millis(sleep_ms));
            Ok(content)
        })
        .on_commit(move |value| *observed.lock() = value)
    }

    #[tokio::test]
    async fn test_late_result_is_discarded() {
        let observed = Arc::new(Mutex::new("before".to_string()));
        let listener = sleeping_listener(200, 100, Arc::clone(&observed));

        let outcome = listener.dispatch("after".to_string()).await;
        assert_eq!(outcome, DispatchOutcome::CompletedLate);
        assert_eq!(listener.state(), ListenerState::CompletedLate);
        assert_eq!(*observed.lock(), "before");

        // 回调结束之后也不会被观察到
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*observed.lock(), "before");
    }

    #[tokio::test]
    async fn test_in_time_result_is_committed() {
        let observed = Arc::new(Mutex::new("before".to_string()));
        let listener = sleeping_listener(20, 50, Arc::clone(&observed));
        assert_eq!(listener.state(), ListenerState::Idle);

        let outcome = listener.dispatch("after".to_string()).await;
        assert_eq!(outcome, DispatchOutcome::CompletedInTime);
        assert_eq!(listener.state(), ListenerState::CompletedInTime);
        assert_eq!(*observed.lock(), "after");
    }

    #[tokio::test]
    async fn test_failed_callbacks() {
        let listener: TimeoutListener<()> =
            TimeoutListener::new("failing", Duration::from_millis(100), |_content: String| {
                anyhow::bail!("boom")
            });
        assert_eq!(listener.dispatch(String::new()).await, DispatchOutcome::Failed);

        let listener: TimeoutListener<()> =
            TimeoutListener::new("panicking", Duration::from_millis(100), |_content: String| {
                panic!("listener panic")
            });
        assert_eq!(listener.dispatch(String::new()).await, DispatchOutcome::Failed);
        assert_eq!(listener.state(), ListenerState::Failed);
    }

    #[tokio::test]
    async fn test_wrap_with_timeout_as_config_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener: Arc<dyn ConfigListener> = Arc::new(wrap_with_timeout(
            move |content: String| {
                assert_eq!(content, "a=1");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            100,
        ));

        listener.receive_config_info("a=1".to_string()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(listener.listener_name(), "TimeoutConfigListener");
    }

    struct TimeoutCounter(Arc<AtomicUsize>);

    impl EventListener for TimeoutCounter {
        fn on_event(&self, event: Arc<dyn Event>) {
            if let Some(timeout) = event.as_any().downcast_ref::<NacosConfigTimeoutEvent>() {
                assert_eq!(timeout.data_id, "app.yaml");
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_timeout_event_published() {
        let publisher = Arc::new(ConfigEventPublisher::default());
        let count = Arc::new(AtomicUsize::new(0));
        publisher.add_listener(Arc::new(TimeoutCounter(Arc::clone(&count))));

        let listener: TimeoutListener<()> =
            TimeoutListener::new("slow", Duration::from_millis(10), |_content: String| {
                std::thread::sleep(Duration::from_millis(50));
                Ok(())
            })
            .with_timeout_events(publisher, "app.yaml", "DEFAULT_GROUP");

        listener.dispatch(String::new()).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_into_callback_dispatches_on_runtime() {
        let observed = Arc::new(Mutex::new(String::new()));
        let listener = Arc::new(sleeping_listener(0, 100, Arc::clone(&observed)));
        let callback = Arc::clone(&listener).into_callback(tokio::runtime::Handle::current());

        callback("pushed".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*observed.lock(), "pushed");
    }
}
