use crate::config_type::ConfigType;
use crate::constants::YAML_DOCUMENT_KEY;
use crate::error::{NacosConfigError, Result};
use crate::flatten::{flatten, ConfigNode};
use crate::key_space::FlattenedKeySpace;
use crate::parser::ConfigParser;
use indexmap::IndexMap;
use serde::Deserialize;

/// YAML 格式解析器
///
/// 多文档流中的每个文档独立解析，只保留最后一个非空文档的展平结果，
/// 不做多文档合并。同一映射节点内出现重复键时整体解析失败。
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlConfigParser;

impl YamlConfigParser {
    pub fn new() -> Self {
        Self
    }

    /// 解析为文档模型后展平，供 JSON 解析器复用
    pub(crate) fn parse_as(&self, content: &str, config_type: &str) -> Result<FlattenedKeySpace> {
        let mut last: Option<FlattenedKeySpace> = None;

        for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
            let node = ConfigNode::deserialize(document)
                .map_err(|e| NacosConfigError::parse(config_type, content, e))?;

            let root = match node {
                ConfigNode::Null => {
                    tracing::trace!("Skipping empty {} document #{}", config_type, index);
                    continue;
                }
                ConfigNode::Map(map) => map,
                other => {
                    let mut wrapped = IndexMap::with_capacity(1);
                    wrapped.insert(YAML_DOCUMENT_KEY.to_string(), other);
                    wrapped
                }
            };

            if last.is_some() {
                tracing::debug!(
                    "{} content has multiple documents, document #{} replaces the previous one",
                    config_type,
                    index
                );
            }
            last = Some(flatten(&root).map_err(|e| NacosConfigError::parse(config_type, content, e))?);
        }

        Ok(last.unwrap_or_default())
    }
}

impl ConfigParser for YamlConfigParser {
    fn parse(&self, content: &str) -> Result<FlattenedKeySpace> {
        self.parse_as(content, ConfigType::Yaml.as_str())
    }

    fn process_type(&self) -> &str {
        ConfigType::Yaml.as_str()
    }
}

/// JSON 格式解析器
///
/// JSON 是 YAML 的子集，直接复用 YAML 文档模型与展平逻辑
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonConfigParser {
    yaml: YamlConfigParser,
}

impl JsonConfigParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigParser for JsonConfigParser {
    fn parse(&self, content: &str) -> Result<FlattenedKeySpace> {
        self.yaml.parse_as(content, ConfigType::Json.as_str())
    }

    fn process_type(&self) -> &str {
        ConfigType::Json.as_str()
    }
}
