use crate::error::Result;
use crate::key_space::FlattenedKeySpace;
use std::sync::Arc;

/// 配置内容解析器 trait
///
/// 将某种格式的原始文本转换为展平的键空间。
/// 实现必须无状态、可重入，允许在多个线程上并发调用
pub trait ConfigParser: Send + Sync {
    /// 解析配置内容
    fn parse(&self, content: &str) -> Result<FlattenedKeySpace>;

    /// 解析器处理的配置类型，例如 "yaml"
    fn process_type(&self) -> &str;

    /// 自定义解析器绑定的 dataId
    ///
    /// 与 [`ConfigParser::group`] 同时返回 `Some` 时，
    /// 通过 inventory 注册的解析器只作用于该 (dataId, group)
    fn data_id(&self) -> Option<&str> {
        None
    }

    /// 自定义解析器绑定的分组
    fn group(&self) -> Option<&str> {
        None
    }
}

/// 解析器工厂函数类型
pub type ConfigParserFactory = fn() -> Arc<dyn ConfigParser>;

/// 自定义解析器注册表项 - 用于 inventory 收集
///
/// # 示例
///
/// ```ignore
/// inventory::submit! {
///     chimera_nacos::parser::ConfigParserRegistration {
///         factory: || std::sync::Arc::new(TomlConfigParser),
///         name: "tomlConfigParser",
///     }
/// }
/// ```
pub struct ConfigParserRegistration {
    pub factory: ConfigParserFactory,
    pub name: &'static str,
}

inventory::collect!(ConfigParserRegistration);
