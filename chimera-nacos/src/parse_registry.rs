use crate::config_type::ConfigType;
use crate::error::{NacosConfigError, Result};
use crate::key_space::FlattenedKeySpace;
use crate::parser::{ConfigParser, ConfigParserRegistration};
use crate::properties_parser::PropertiesConfigParser;
use crate::xml_parser::XmlConfigParser;
use crate::yaml_parser::{JsonConfigParser, YamlConfigParser};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// 配置解析器注册表
///
/// 按声明的类型（大小写不敏感）选择解析器；
/// 为某个 (dataId, group) 注册的自定义解析器优先于按类型选择的默认解析器
pub struct ConfigParseRegistry {
    /// 类型 -> 解析器
    parsers: RwLock<HashMap<String, Arc<dyn ConfigParser>>>,
    /// (dataId, group) -> 自定义解析器
    custom_parsers: RwLock<HashMap<(String, String), Arc<dyn ConfigParser>>>,
}

impl std::fmt::Debug for ConfigParseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.parsers.read().keys().cloned().collect();
        types.sort();
        f.debug_struct("ConfigParseRegistry")
            .field("types", &types)
            .field("custom_parsers_count", &self.custom_parsers.read().len())
            .finish()
    }
}

impl ConfigParseRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            parsers: RwLock::new(HashMap::new()),
            custom_parsers: RwLock::new(HashMap::new()),
        }
    }

    /// 创建包含内置解析器及所有 inventory 注册解析器的注册表
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_parser(Arc::new(PropertiesConfigParser::new()));
        registry.register_parser(Arc::new(YamlConfigParser::new()));
        registry.register_parser(Arc::new(JsonConfigParser::new()));
        registry.register_parser(Arc::new(XmlConfigParser::new()));
        registry.scan_parsers();
        registry
    }

    /// 进程级默认注册表，首次使用时构建
    pub fn global() -> &'static ConfigParseRegistry {
        static GLOBAL: OnceLock<ConfigParseRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ConfigParseRegistry::with_defaults)
    }

    /// 扫描通过 inventory 提交的解析器
    ///
    /// 声明了 dataId 与 group 的解析器注册为该键的自定义解析器，
    /// 其余按 process_type 注册（会覆盖同类型的内置解析器）
    pub fn scan_parsers(&self) {
        let registrations: Vec<_> = inventory::iter::<ConfigParserRegistration>().collect();
        if registrations.is_empty() {
            tracing::debug!("No custom config parsers submitted");
            return;
        }

        tracing::debug!("Found {} custom config parser(s)", registrations.len());

        for registration in registrations {
            let parser = (registration.factory)();
            let key = match (parser.data_id(), parser.group()) {
                (Some(data_id), Some(group)) => Some((data_id.to_string(), group.to_string())),
                _ => None,
            };
            match key {
                Some((data_id, group)) => {
                    tracing::debug!(
                        "Registering custom config parser '{}' for {}@{}",
                        registration.name,
                        data_id,
                        group
                    );
                    self.register_custom_parser(data_id, group, parser);
                }
                None => {
                    tracing::debug!(
                        "Registering config parser '{}' for type '{}'",
                        registration.name,
                        parser.process_type()
                    );
                    self.register_parser(parser);
                }
            }
        }
    }

    /// 注册（或替换）按类型选择的解析器
    pub fn register_parser(&self, parser: Arc<dyn ConfigParser>) {
        let config_type = ConfigType::normalize(parser.process_type());
        if self.parsers.write().insert(config_type.clone(), parser).is_some() {
            tracing::debug!("Replaced config parser for type '{}'", config_type);
        }
    }

    /// 为 (dataId, group) 注册自定义解析器
    pub fn register_custom_parser(
        &self,
        data_id: impl Into<String>,
        group: impl Into<String>,
        parser: Arc<dyn ConfigParser>,
    ) {
        self.custom_parsers
            .write()
            .insert((data_id.into(), group.into()), parser);
    }

    /// 是否有处理该类型的解析器
    pub fn supports(&self, declared_type: &str) -> bool {
        self.parsers
            .read()
            .contains_key(&ConfigType::normalize(declared_type))
    }

    /// 按类型解析
    pub fn parse(&self, content: &str, declared_type: &str) -> Result<FlattenedKeySpace> {
        let parser = self.parser_for_type(declared_type)?;
        parser.parse(content)
    }

    /// 解析某个 (dataId, group) 的配置内容
    ///
    /// 自定义解析器优先；否则按声明的类型选择；都没有时返回 `UnsupportedFormat`
    pub fn resolve(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        declared_type: &str,
    ) -> Result<FlattenedKeySpace> {
        let custom = self
            .custom_parsers
            .read()
            .get(&(data_id.to_string(), group.to_string()))
            .cloned();

        let parser = match custom {
            Some(parser) => {
                tracing::debug!(
                    "Using custom '{}' parser for {}@{}",
                    parser.process_type(),
                    data_id,
                    group
                );
                parser
            }
            None => self.parser_for_type(declared_type)?,
        };

        let key_space = parser.parse(content)?;
        tracing::debug!(
            "Parsed {}@{} as '{}' into {} key(s)",
            data_id,
            group,
            parser.process_type(),
            key_space.len()
        );
        Ok(key_space)
    }

    fn parser_for_type(&self, declared_type: &str) -> Result<Arc<dyn ConfigParser>> {
        let config_type = ConfigType::normalize(declared_type);
        self.parsers
            .read()
            .get(&config_type)
            .cloned()
            .ok_or(NacosConfigError::UnsupportedFormat(config_type))
    }
}

impl Default for ConfigParseRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// 使用进程级默认注册表解析配置内容
///
/// # Example
/// ```
/// let space = chimera_nacos::parse_config("a:\n  b: 1\n", "YAML").unwrap();
/// assert_eq!(space.get("a.b"), Some("1"));
/// ```
pub fn parse_config(content: &str, format: &str) -> Result<FlattenedKeySpace> {
    ConfigParseRegistry::global().parse(content, format)
}
