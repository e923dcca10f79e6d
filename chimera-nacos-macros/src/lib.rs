mod attribute_helpers;
mod properties_impl;

use proc_macro::TokenStream;
use proc_macro_error::proc_macro_error;

/// NacosProperties 派生宏
///
/// 为结构体生成 `chimera_nacos::binder::NacosProperties` 实现：
/// 类型级的配置元信息与逐字段的绑定规则表
///
/// 用法：
/// ```ignore
/// #[derive(NacosProperties, Default)]
/// #[nacos_properties(
///     data_id = "datasource.yaml",   // 可选：绑定的 dataId
///     group = "APP_GROUP",           // 可选：默认使用设置中的 default_group
///     prefix = "datasource",         // 可选：键前缀
///     config_type = "yaml",          // 可选：默认按 dataId 扩展名推断
///     auto_refreshed,                // 可选：配置变更时重新绑定
///     ignore_unknown_fields = false, // 可选：出现未声明的键时报错
///     ignore_invalid_fields = false, // 可选：值转换失败时报错
/// )]
/// struct DataSourceConfig {
///     url: String,
///     #[nacos_property("max-active")]  // 自定义键名
///     max_active: u32,
///     #[nacos_ignore]                  // 不参与绑定
///     password: String,
///     #[nacos_nested]                  // 绑定在 datasource.pool.* 下
///     pool: PoolConfig,
///     #[nacos_nested(flatten)]         // 直接绑定在 datasource.* 下
///     common: CommonConfig,
/// }
/// ```
///
/// 字段类型必须实现 `FromConfigValue`（嵌套字段须实现 `NacosProperties`），
/// 否则在编译期报错
#[proc_macro_derive(
    NacosProperties,
    attributes(nacos_properties, nacos_property, nacos_ignore, nacos_nested)
)]
#[proc_macro_error]
pub fn derive_nacos_properties(input: TokenStream) -> TokenStream {
    properties_impl::derive_nacos_properties_impl(input)
}
