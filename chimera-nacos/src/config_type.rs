use std::fmt;
use std::str::FromStr;

/// Nacos 配置内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConfigType {
    #[default]
    Properties,
    Yaml,
    Json,
    Xml,
    /// 纯文本，没有内置解析器
    Text,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Properties => "properties",
            ConfigType::Yaml => "yaml",
            ConfigType::Json => "json",
            ConfigType::Xml => "xml",
            ConfigType::Text => "text",
        }
    }

    /// 根据 dataId 的扩展名推断配置类型
    ///
    /// 没有扩展名或扩展名无法识别时返回 `Properties`
    ///
    /// # Example
    /// ```
    /// use chimera_nacos::ConfigType;
    ///
    /// assert_eq!(ConfigType::from_data_id("app.yml"), ConfigType::Yaml);
    /// assert_eq!(ConfigType::from_data_id("app"), ConfigType::Properties);
    /// ```
    pub fn from_data_id(data_id: &str) -> Self {
        data_id
            .rsplit_once('.')
            .and_then(|(_, ext)| ext.parse().ok())
            .unwrap_or_default()
    }

    /// 规范化声明的类型字符串，用作解析器注册表的键
    ///
    /// 大小写不敏感，`yml` 视为 `yaml`，未知类型原样小写返回
    pub fn normalize(declared: &str) -> String {
        match declared.parse::<ConfigType>() {
            Ok(config_type) => config_type.as_str().to_string(),
            Err(_) => declared.trim().to_lowercase(),
        }
    }
}

impl FromStr for ConfigType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "properties" => Ok(ConfigType::Properties),
            "yaml" | "yml" => Ok(ConfigType::Yaml),
            "json" => Ok(ConfigType::Json),
            "xml" => Ok(ConfigType::Xml),
            "text" | "txt" => Ok(ConfigType::Text),
            _ => Err(format!("Invalid config type: {}", s)),
        }
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
