// chimera-nacos: Nacos 配置的解析、展平与绑定
//
// 提供：
// - properties / yaml / json / xml 内容解析为统一的展平键空间
// - 按类型（及按 dataId、group）选择解析器的注册表
// - 键空间到强类型配置对象的部分绑定（通过 #[derive(NacosProperties)]）
// - 带软超时的配置变更监听器与自动刷新

pub mod binder;
pub mod config_service;
pub mod config_type;
pub mod constants;
pub mod error;
pub mod event;
pub mod flatten;
pub mod key_space;
pub mod listener;
pub mod logging;
pub mod parse_registry;
pub mod parser;
pub mod placeholder;
pub mod properties_binder;
pub mod properties_parser;
pub mod property_source;
pub mod settings;
pub mod xml_parser;
pub mod yaml_parser;

// 重新导出常用类型
pub use binder::{
    bind, coerce, BindReport, ClaimedKey, BinderOptions, FromConfigValue, NacosProperties, PropertiesMeta,
    PropertyBinder, PropertyField, RawValue,
};
pub use config_service::{ConfigKey, ConfigService, EventPublishingConfigService, InMemoryConfigService};
pub use config_type::ConfigType;
pub use error::{BindError, NacosConfigError, Result};
pub use event::{
    ConfigEventMulticaster, ConfigEventPublisher, ErrorHandler, Event, EventListener,
    NacosConfigListenerRegisteredEvent, NacosConfigPublishedEvent, NacosConfigReceivedEvent,
    NacosConfigRemovedEvent, NacosConfigTimeoutEvent, SimpleConfigEventMulticaster,
    TypedEventListener, TypedEventListenerAdapter,
};
pub use flatten::{flatten, ConfigNode, FlattenError};
pub use key_space::FlattenedKeySpace;
pub use listener::{wrap_with_timeout, ConfigListener, DispatchOutcome, ListenerState, TimeoutListener};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use parse_registry::{parse_config, ConfigParseRegistry};
pub use parser::{ConfigParser, ConfigParserRegistration};
pub use properties_binder::{BoundProperties, NacosConfigurationPropertiesBinder};
pub use properties_parser::PropertiesConfigParser;
pub use property_source::{
    MapPropertySource, NacosPropertySource, NacosPropertySourceBuilder, PropertySource,
    PropertySources,
};
pub use settings::NacosSettings;
pub use xml_parser::XmlConfigParser;
pub use yaml_parser::{JsonConfigParser, YamlConfigParser};

// 导出 async_trait 和 inventory，供自定义解析器与监听器使用
pub use async_trait;
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::binder::{bind, BindReport, NacosProperties, PropertyBinder};
    pub use crate::config_service::{ConfigService, InMemoryConfigService};
    pub use crate::config_type::ConfigType;
    pub use crate::error::{BindError, NacosConfigError, Result};
    pub use crate::event::{ConfigEventPublisher, Event, EventListener, TypedEventListener};
    pub use crate::key_space::FlattenedKeySpace;
    pub use crate::listener::{wrap_with_timeout, ConfigListener, TimeoutListener};
    pub use crate::logging::LoggingConfig;
    pub use crate::parse_registry::{parse_config, ConfigParseRegistry};
    pub use crate::parser::ConfigParser;
    pub use crate::properties_binder::NacosConfigurationPropertiesBinder;
    pub use crate::property_source::{PropertySource, PropertySources};
    pub use crate::settings::NacosSettings;
}
