use crate::binder::{BinderOptions, PropertiesMeta};
use crate::constants::{
    DEFAULT_CONFIG_TYPE, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_GROUP, DEFAULT_LISTENER_TIMEOUT_MS,
    SETTINGS_ENV_PREFIX,
};
use crate::error::{NacosConfigError, Result};
use crate::logging::LoggingConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Nacos 配置集成的设置
///
/// 从 TOML 加载，再由 `NACOS_*` 环境变量覆盖：
///
/// ```toml
/// server_addr = "127.0.0.1:8848"
/// namespace = "dev"
/// listener_timeout_ms = 500
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NacosSettings {
    pub server_addr: String,
    pub namespace: String,
    /// 目标类型未声明分组时使用
    pub default_group: String,
    /// 配置变更监听器的执行超时（毫秒）
    pub listener_timeout_ms: u64,
    /// 首次拉取配置的超时（毫秒）
    pub fetch_timeout_ms: u64,
    /// 未声明类型且无法从 dataId 推断时使用
    pub default_config_type: String,
    /// 设置后覆盖目标类型上声明的 `ignore_unknown_fields`
    pub ignore_unknown_fields: Option<bool>,
    /// 设置后覆盖目标类型上声明的 `ignore_invalid_fields`
    pub ignore_invalid_fields: Option<bool>,
    pub logging: LoggingConfig,
}

impl Default for NacosSettings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8848".to_string(),
            namespace: String::new(),
            default_group: DEFAULT_GROUP.to_string(),
            listener_timeout_ms: DEFAULT_LISTENER_TIMEOUT_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            default_config_type: DEFAULT_CONFIG_TYPE.to_string(),
            ignore_unknown_fields: None,
            ignore_invalid_fields: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl NacosSettings {
    /// 从 TOML 字符串解析
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| NacosConfigError::Settings(format!("Failed to parse TOML: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            NacosConfigError::Settings(format!("Failed to read settings file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 加载设置：有文件时读取文件，然后应用进程环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(std::env::vars())
    }

    /// 应用 `NACOS_*` 环境变量
    ///
    /// 去掉前缀后转为小写作为字段名，例如 `NACOS_SERVER_ADDR -> server_addr`；
    /// 无关的变量被忽略
    pub fn apply_env<I>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(field) = name.strip_prefix(SETTINGS_ENV_PREFIX) else {
                continue;
            };
            let field = field.to_lowercase();
            match field.as_str() {
                "server_addr" => self.server_addr = value,
                "namespace" => self.namespace = value,
                "default_group" => self.default_group = value,
                "default_config_type" => self.default_config_type = value,
                "listener_timeout_ms" => self.listener_timeout_ms = parse_env(&name, &value)?,
                "fetch_timeout_ms" => self.fetch_timeout_ms = parse_env(&name, &value)?,
                "ignore_unknown_fields" => self.ignore_unknown_fields = Some(parse_env(&name, &value)?),
                "ignore_invalid_fields" => self.ignore_invalid_fields = Some(parse_env(&name, &value)?),
                _ => {
                    tracing::trace!("Ignoring unrecognized settings variable '{}'", name);
                    continue;
                }
            }
            tracing::debug!("Settings field '{}' overridden by environment", field);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_addr.trim().is_empty() {
            return Err(NacosConfigError::Settings("server_addr must not be empty".to_string()));
        }
        if self.listener_timeout_ms == 0 {
            return Err(NacosConfigError::Settings(
                "listener_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listener_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_timeout_ms)
    }

    /// 目标类型的绑定选项，已应用设置中的全局覆盖
    pub fn binder_options(&self, meta: &PropertiesMeta) -> BinderOptions {
        let mut options = BinderOptions::from_meta(meta);
        if let Some(ignore) = self.ignore_unknown_fields {
            options.ignore_unknown_fields = ignore;
        }
        if let Some(ignore) = self.ignore_invalid_fields {
            options.ignore_invalid_fields = ignore;
        }
        options
    }

    /// 解析目标的分组，空白时使用 `default_group`
    pub fn group_or_default<'a>(&'a self, group: Option<&'a str>) -> &'a str {
        match group {
            Some(group) if !group.trim().is_empty() => group,
            _ => &self.default_group,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        NacosConfigError::Settings(format!("Invalid value '{}' for {}: {}", value, name, e))
    })
}
