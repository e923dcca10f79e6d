use crate::attribute_helpers::{parse_field_attr, parse_properties_attr, FieldAttr};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use proc_macro_error::abort;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

fn option_str(value: &Option<String>) -> TokenStream2 {
    match value {
        Some(v) => quote! { ::std::option::Option::Some(#v) },
        None => quote! { ::std::option::Option::None },
    }
}

pub(crate) fn derive_nacos_properties_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        abort!(
            input.generics,
            "#[derive(NacosProperties)] does not support generic types"
        );
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            _ => abort!(
                name.span(),
                "#[derive(NacosProperties)] requires a struct with named fields"
            ),
        },
        _ => abort!(name.span(), "#[derive(NacosProperties)] can only be used on structs"),
    };

    let info = parse_properties_attr(&input.attrs);

    let data_id = option_str(&info.data_id);
    let group = option_str(&info.group);
    let config_type = option_str(&info.config_type);
    let prefix = &info.prefix;
    let auto_refreshed = info.auto_refreshed;
    let ignore_nested_properties = info.ignore_nested_properties;

    // 未声明的开关沿用运行时默认值
    let ignore_unknown_fields = match info.ignore_unknown_fields {
        Some(v) => quote! { #v },
        None => quote! { __defaults.ignore_unknown_fields },
    };
    let ignore_invalid_fields = match info.ignore_invalid_fields {
        Some(v) => quote! { #v },
        None => quote! { __defaults.ignore_invalid_fields },
    };

    let field_rules = fields.iter().map(|field| {
        // 具名字段一定有标识符
        let Some(ident) = field.ident.as_ref() else {
            abort!(name.span(), "unnamed field in named struct");
        };
        let field_name = ident.to_string();
        let ty = &field.ty;

        match parse_field_attr(field) {
            FieldAttr::Ignored => quote! {
                ::chimera_nacos::binder::PropertyField::ignored(#field_name)
            },
            FieldAttr::Value { rename } => {
                let rename = option_str(&rename);
                quote! {
                    ::chimera_nacos::binder::PropertyField::value::<#ty>(
                        #field_name,
                        #rename,
                        |target: &mut Self, raw: ::chimera_nacos::binder::RawValue<'_>| {
                            target.#ident = ::chimera_nacos::binder::coerce::<#ty>(raw)?;
                            ::std::result::Result::Ok(())
                        },
                    )
                }
            }
            FieldAttr::Nested { rename, flatten } => {
                let rename = option_str(&rename);
                let prefixed = !flatten;
                quote! {
                    ::chimera_nacos::binder::PropertyField::nested(
                        #field_name,
                        #rename,
                        #prefixed,
                        |target: &mut Self,
                         binder: &::chimera_nacos::binder::PropertyBinder,
                         space: &::chimera_nacos::key_space::FlattenedKeySpace,
                         prefix: &str,
                         report: &mut ::chimera_nacos::binder::BindReport| {
                            binder.bind_nested(&mut target.#ident, space, prefix, report)
                        },
                        <#ty as ::chimera_nacos::binder::NacosProperties>::claimed_keys,
                    )
                }
            }
        }
    });

    let type_name = name.to_string();

    let expanded = quote! {
        impl ::chimera_nacos::binder::NacosProperties for #name {
            fn type_name() -> &'static str {
                #type_name
            }

            fn properties_meta() -> ::chimera_nacos::binder::PropertiesMeta {
                let __defaults = ::chimera_nacos::binder::PropertiesMeta::default();
                ::chimera_nacos::binder::PropertiesMeta {
                    data_id: #data_id,
                    group: #group,
                    prefix: #prefix,
                    config_type: #config_type,
                    auto_refreshed: #auto_refreshed,
                    ignore_unknown_fields: #ignore_unknown_fields,
                    ignore_invalid_fields: #ignore_invalid_fields,
                    ignore_nested_properties: #ignore_nested_properties,
                }
            }

            fn fields() -> ::std::vec::Vec<::chimera_nacos::binder::PropertyField<Self>> {
                ::std::vec![#(#field_rules),*]
            }
        }
    };

    TokenStream::from(expanded)
}
