//! 属性解析辅助函数

use proc_macro_error::abort;
use syn::{Attribute, Field, LitBool, LitStr};

/// `#[nacos_properties(...)]` 中声明的配置信息
#[derive(Default)]
pub(crate) struct PropertiesAttr {
    pub data_id: Option<String>,
    pub group: Option<String>,
    pub prefix: String,
    pub config_type: Option<String>,
    pub auto_refreshed: bool,
    pub ignore_unknown_fields: Option<bool>,
    pub ignore_invalid_fields: Option<bool>,
    pub ignore_nested_properties: bool,
}

/// 支持的配置类型，与运行时内置解析器一致
const KNOWN_CONFIG_TYPES: &[&str] = &["properties", "yaml", "yml", "json", "xml", "text", "txt"];

/// 解析类型上的 `#[nacos_properties(...)]`
///
/// 支持格式：
/// - `data_id = "app.yaml"`、`group = "G"`、`prefix = "app"`、`config_type = "yaml"`
/// - `auto_refreshed`、`ignore_nested_properties`（可写为 `= true/false`）
/// - `ignore_unknown_fields = false`、`ignore_invalid_fields = false`
pub(crate) fn parse_properties_attr(attrs: &[Attribute]) -> PropertiesAttr {
    let mut info = PropertiesAttr::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("nacos_properties")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("data_id") {
                info.data_id = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("group") {
                info.group = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("prefix") {
                info.prefix = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("config_type") {
                let lit = meta.value()?.parse::<LitStr>()?;
                let value = lit.value();
                if !KNOWN_CONFIG_TYPES.contains(&value.to_lowercase().as_str()) {
                    return Err(syn::Error::new(
                        lit.span(),
                        format!("unknown config_type '{}', expected one of: properties, yaml, json, xml", value),
                    ));
                }
                info.config_type = Some(value);
            } else if meta.path.is_ident("auto_refreshed") {
                info.auto_refreshed = flag_value(&meta)?;
            } else if meta.path.is_ident("ignore_nested_properties") {
                info.ignore_nested_properties = flag_value(&meta)?;
            } else if meta.path.is_ident("ignore_unknown_fields") {
                info.ignore_unknown_fields = Some(flag_value(&meta)?);
            } else if meta.path.is_ident("ignore_invalid_fields") {
                info.ignore_invalid_fields = Some(flag_value(&meta)?);
            } else {
                return Err(meta.error("unsupported nacos_properties option"));
            }
            Ok(())
        });

        if let Err(err) = result {
            abort!(err.span(), "{}", err);
        }
    }

    if info.prefix.starts_with('.') || info.prefix.ends_with('.') {
        abort!(
            proc_macro2::Span::call_site(),
            "prefix '{}' must not start or end with '.'",
            info.prefix
        );
    }

    info
}

/// 裸标志视为 true，`= bool` 显式赋值
fn flag_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<bool> {
    if meta.input.peek(syn::Token![=]) {
        Ok(meta.value()?.parse::<LitBool>()?.value())
    } else {
        Ok(true)
    }
}

/// 字段的绑定方式
pub(crate) enum FieldAttr {
    /// 普通值字段，可选的重命名键
    Value { rename: Option<String> },
    /// 嵌套配置对象
    Nested { rename: Option<String>, flatten: bool },
    Ignored,
}

/// 解析字段上的 `#[nacos_property("key")]`、`#[nacos_ignore]`、`#[nacos_nested]`
pub(crate) fn parse_field_attr(field: &Field) -> FieldAttr {
    let mut rename = None;
    let mut ignored = false;
    let mut nested: Option<bool> = None;

    for attr in &field.attrs {
        if attr.path().is_ident("nacos_property") {
            match attr.parse_args::<LitStr>() {
                Ok(lit) if lit.value().trim().is_empty() => {
                    abort!(lit.span(), "nacos_property key must not be empty");
                }
                Ok(lit) => rename = Some(lit.value()),
                Err(err) => abort!(
                    err.span(),
                    "expected a string literal key";
                    help = "use #[nacos_property(\"max-active\")]"
                ),
            }
        } else if attr.path().is_ident("nacos_ignore") {
            ignored = true;
        } else if attr.path().is_ident("nacos_nested") {
            let mut flatten = false;
            if !matches!(attr.meta, syn::Meta::Path(_)) {
                let result = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("flatten") {
                        flatten = true;
                        Ok(())
                    } else {
                        Err(meta.error("unsupported nacos_nested option, expected `flatten`"))
                    }
                });
                if let Err(err) = result {
                    abort!(err.span(), "{}", err);
                }
            }
            nested = Some(flatten);
        }
    }

    if ignored {
        if rename.is_some() || nested.is_some() {
            abort!(
                field.ident.as_ref().map_or_else(proc_macro2::Span::call_site, |i| i.span()),
                "#[nacos_ignore] cannot be combined with other nacos attributes"
            );
        }
        return FieldAttr::Ignored;
    }

    match nested {
        Some(flatten) => {
            if flatten && rename.is_some() {
                abort!(
                    field.ident.as_ref().map_or_else(proc_macro2::Span::call_site, |i| i.span()),
                    "a flattened nested field has no key of its own, remove #[nacos_property]"
                );
            }
            FieldAttr::Nested { rename, flatten }
        }
        None => FieldAttr::Value { rename },
    }
}
