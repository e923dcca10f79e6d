/// Nacos 配置集成常量定义
///
/// 解析器、绑定器、监听器与配置加载共用的默认值集中在这里，
/// 避免在各模块中硬编码

/// 未指定分组时使用的默认分组
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// 未声明配置类型且无法从 dataId 推断时使用的类型
pub const DEFAULT_CONFIG_TYPE: &str = "properties";

/// 配置变更监听器的默认执行超时（毫秒）
pub const DEFAULT_LISTENER_TIMEOUT_MS: u64 = 1000;

/// 首次拉取配置的默认超时（毫秒）
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 3000;

/// YAML/JSON 顶层不是映射时包裹使用的合成键
pub const YAML_DOCUMENT_KEY: &str = "document";

/// Nacos 属性源名称前缀
pub const PROPERTY_SOURCE_NAME_PREFIX: &str = "nacos";

/// 环境变量覆盖配置时使用的前缀
/// 例如: NACOS_SERVER_ADDR -> server_addr
pub const SETTINGS_ENV_PREFIX: &str = "NACOS_";

/// 占位符前缀、后缀与默认值分隔符
pub const PLACEHOLDER_PREFIX: &str = "${";
pub const PLACEHOLDER_SUFFIX: &str = "}";
pub const PLACEHOLDER_VALUE_SEPARATOR: char = ':';

/// 生成 Nacos 属性源的默认名称
///
/// # Example
/// ```
/// use chimera_nacos::constants::property_source_name;
///
/// assert_eq!(property_source_name("app.yaml", "DEFAULT_GROUP"), "nacos:app.yaml@DEFAULT_GROUP");
/// ```
pub fn property_source_name(data_id: &str, group: &str) -> String {
    format!("{}:{}@{}", PROPERTY_SOURCE_NAME_PREFIX, data_id, group)
}
