use chimera_nacos::prelude::*;
use chimera_nacos::{
    ConfigNode, ConfigParserRegistration, EventPublishingConfigService, NacosConfigError,
    NacosConfigReceivedEvent, NacosConfigTimeoutEvent, NacosPropertySourceBuilder,
};
use chimera_nacos_macros::NacosProperties;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

// ==================== 配置定义 ====================

#[derive(NacosProperties, Debug, Default, Clone)]
struct PoolConfig {
    #[nacos_property("max-active")]
    max_active: u32,
    #[nacos_property("min-idle")]
    min_idle: u32,
}

/// 数据源配置 - YAML，变更时自动重新绑定
#[derive(NacosProperties, Debug, Default, Clone)]
#[nacos_properties(data_id = "datasource.yaml", prefix = "datasource", auto_refreshed)]
struct DataSourceConfig {
    url: String,
    username: String,
    #[nacos_ignore]
    password: String,
    #[nacos_nested]
    pool: PoolConfig,
}

/// 集群配置 - XML，重复元素聚合为列表
#[derive(NacosProperties, Debug, Default, Clone)]
#[nacos_properties(data_id = "cluster.xml", prefix = "cluster")]
struct ClusterConfig {
    name: String,
    #[nacos_property("node")]
    nodes: Vec<String>,
}

/// 功能开关 - TOML，由下面的自定义解析器处理
#[derive(NacosProperties, Debug, Default, Clone)]
#[nacos_properties(data_id = "features.toml", config_type = "properties", auto_refreshed)]
struct FeatureConfig {
    #[nacos_property("search.enabled")]
    search_enabled: bool,
    #[nacos_property("search.shards")]
    search_shards: u8,
}

// ==================== 自定义解析器 ====================

/// 只作用于 features.toml 的 TOML 解析器
struct TomlConfigParser;

impl TomlConfigParser {
    fn to_node(value: toml::Value) -> ConfigNode {
        match value {
            toml::Value::String(s) => ConfigNode::String(s),
            toml::Value::Integer(i) => ConfigNode::Number(i.to_string()),
            toml::Value::Float(f) => ConfigNode::Number(f.to_string()),
            toml::Value::Boolean(b) => ConfigNode::Bool(b),
            toml::Value::Datetime(dt) => ConfigNode::String(dt.to_string()),
            toml::Value::Array(items) => ConfigNode::List(items.into_iter().map(Self::to_node).collect()),
            toml::Value::Table(table) => ConfigNode::Map(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::to_node(v)))
                    .collect(),
            ),
        }
    }
}

impl ConfigParser for TomlConfigParser {
    fn parse(&self, content: &str) -> chimera_nacos::Result<FlattenedKeySpace> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| NacosConfigError::parse("toml", content, e))?;
        let root: IndexMap<String, ConfigNode> = table
            .into_iter()
            .map(|(k, v)| (k, Self::to_node(v)))
            .collect();
        chimera_nacos::flatten(&root).map_err(|e| NacosConfigError::parse("toml", content, e))
    }

    fn process_type(&self) -> &str {
        "toml"
    }

    fn data_id(&self) -> Option<&str> {
        Some("features.toml")
    }

    fn group(&self) -> Option<&str> {
        Some("DEFAULT_GROUP")
    }
}

inventory::submit! {
    ConfigParserRegistration {
        factory: || Arc::new(TomlConfigParser),
        name: "tomlConfigParser",
    }
}

// ==================== 事件监听 ====================

struct ReceivedLogger;

impl TypedEventListener<NacosConfigReceivedEvent> for ReceivedLogger {
    fn on_event(&self, event: &NacosConfigReceivedEvent) {
        tracing::info!(
            "📥 Received {}@{} ({} bytes)",
            event.data_id,
            event.group,
            event.content.as_ref().map_or(0, String::len)
        );
    }

    fn listener_name(&self) -> &str {
        "receivedLogger"
    }
}

struct TimeoutLogger;

impl TypedEventListener<NacosConfigTimeoutEvent> for TimeoutLogger {
    fn on_event(&self, event: &NacosConfigTimeoutEvent) {
        tracing::warn!("⏱️ {} ({}@{}, {:?})", event.message, event.data_id, event.group, event.timeout);
    }

    fn listener_name(&self) -> &str {
        "timeoutLogger"
    }
}

// ==================== 主函数 ====================

const SETTINGS: &str = r#"
server_addr = "127.0.0.1:8848"
namespace = "demo"
listener_timeout_ms = 500

[logging]
level = "info"
format = "compact"
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = NacosSettings::from_toml_str(SETTINGS)?.apply_env(std::env::vars())?;
    let logging = settings.logging.clone().merge_env(|name| std::env::var(name).ok());
    logging.init()?;

    tracing::info!("🚀 Starting config demo against {} (namespace '{}')", settings.server_addr, settings.namespace);

    let publisher = Arc::new(ConfigEventPublisher::default());
    publisher.add_typed_listener::<NacosConfigReceivedEvent, _>(Arc::new(ReceivedLogger));
    publisher.add_typed_listener::<NacosConfigTimeoutEvent, _>(Arc::new(TimeoutLogger));

    let service = Arc::new(EventPublishingConfigService::new(
        InMemoryConfigService::new()
            .with_config(
                "datasource.yaml",
                "",
                "datasource:\n  url: jdbc:mysql://localhost:3306/demo\n  username: demo\n  password: secret\n  pool:\n    max-active: 16\n    min-idle: 2\n",
            )
            .with_config(
                "cluster.xml",
                "",
                "<config><cluster><name>east</name><node>10.0.0.1</node><node>10.0.0.2</node></cluster></config>",
            )
            .with_config("features.toml", "", "[search]\nenabled = true\nshards = 3\n")
            .with_config("app.properties", "", "app.name=config-demo\napp.banner=Welcome to ${app.name}!\n"),
        Arc::clone(&publisher),
    ));

    // 内置解析器 + inventory 中的 TOML 解析器
    let registry = Arc::new(ConfigParseRegistry::with_defaults());
    let binder = NacosConfigurationPropertiesBinder::new(service.clone(), settings.clone())
        .with_registry(Arc::clone(&registry))
        .with_event_publisher(Arc::clone(&publisher));

    let datasource = binder.bind(Arc::new(RwLock::new(DataSourceConfig::default()))).await?;
    let cluster = binder.bind(Arc::new(RwLock::new(ClusterConfig::default()))).await?;
    let features = binder.bind(Arc::new(RwLock::new(FeatureConfig::default()))).await?;

    tracing::info!("✅ DataSource: {:?}", *datasource.read());
    tracing::info!("✅ Cluster: {:?}", *cluster.read());
    tracing::info!("✅ Features: {:?}", *features.read());

    let sources = PropertySources::new();
    let app_source = NacosPropertySourceBuilder::new(service.clone(), Arc::clone(&registry))
        .listener_timeout(settings.listener_timeout())
        .build("app.properties", "", None, true)
        .await?;
    sources.add_last(app_source);
    tracing::info!("✅ Banner: {}", sources.get_property_or("app.banner", "<none>"));

    // 推送变更
    service
        .publish_config(
            "datasource.yaml",
            "",
            "datasource:\n  pool:\n    max-active: 64\n",
            Some("yaml"),
        )
        .await?;
    service
        .publish_config("features.toml", "", "[search]\nenabled = false\nshards = 300\n", None)
        .await?;
    service
        .publish_config("app.properties", "", "app.name=renamed-demo\napp.banner=Hello from ${app.name}\n", None)
        .await?;

    tracing::info!("🔄 DataSource after refresh: {:?}", *datasource.read());
    tracing::info!("🔄 Features after refresh (invalid shards skipped): {:?}", *features.read());
    tracing::info!("🔄 Banner after refresh: {}", sources.get_property_or("app.banner", "<none>"));

    // 超时的监听器：结果被放弃
    let slow = wrap_with_timeout(
        |content: String| {
            std::thread::sleep(Duration::from_millis(200));
            tracing::info!("Slow handler finished with {} bytes", content.len());
            Ok(())
        },
        50,
    );
    let outcome = slow.dispatch("late".to_string()).await;
    tracing::info!("⏱️ Slow listener outcome: {:?}", outcome);

    tokio::time::sleep(Duration::from_millis(250)).await;
    tracing::info!("👋 Config demo finished");
    Ok(())
}
