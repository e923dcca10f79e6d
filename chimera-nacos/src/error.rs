use thiserror::Error;

/// Nacos 配置集成的统一错误类型
///
/// 解析与绑定错误在调用处同步返回；监听器超时不属于错误，
/// 由 [`crate::listener::TimeoutListener`] 在边界处吸收
#[derive(Debug, Error)]
pub enum NacosConfigError {
    /// 配置内容与声明的格式不符
    #[error("Failed to parse {config_type} config: {source}")]
    ConfigParse {
        config_type: String,
        /// 原始配置内容
        content: String,
        #[source]
        source: anyhow::Error,
    },

    /// 没有为声明的类型注册解析器
    #[error("Parsing is not yet supported for config type '{0}'")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Bind(#[from] BindError),

    /// 外部配置服务返回的错误
    #[error("Config service error: {0}")]
    Service(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    /// 属性源不存在或重复
    #[error("Property source error: {0}")]
    PropertySource(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}

impl NacosConfigError {
    /// 构造解析错误，保留原始内容与底层原因
    pub fn parse(
        config_type: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::ConfigParse {
            config_type: config_type.into(),
            content: content.into(),
            source: source.into(),
        }
    }

    /// 是否为解析错误
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::ConfigParse { .. })
    }
}

/// 属性绑定错误
///
/// 仅在严格模式下返回；宽松模式下记录日志并跳过对应字段
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Failed to convert property '{key}' = '{value}' into field '{field}' ({expected}): {reason}")]
    InvalidValue {
        key: String,
        field: String,
        value: String,
        expected: &'static str,
        reason: String,
    },

    #[error("Unknown property '{key}' for '{target}'")]
    UnknownField { key: String, target: String },
}

pub type Result<T> = std::result::Result<T, NacosConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_keeps_content() {
        let err = NacosConfigError::parse("yaml", "a: [", anyhow::anyhow!("unexpected end"));
        assert!(err.is_parse_error());
        match err {
            NacosConfigError::ConfigParse { content, config_type, .. } => {
                assert_eq!(content, "a: [");
                assert_eq!(config_type, "yaml");
            }
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_bind_error_converts() {
        let err: NacosConfigError = BindError::UnknownField {
            key: "db.extra".to_string(),
            target: "DbConfig".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Unknown property 'db.extra' for 'DbConfig'");
    }
}
