//! Derive macros for rsettings
//!
//! This crate provides `#[derive(SettingsSchema)]`, which turns a plain struct
//! into a settings table declaration plus a trait of typed accessors.
//!
//! # Usage
//!
//! ```text
//! use rsettings::DeriveSettingsSchema;
//!
//! #[derive(DeriveSettingsSchema, Default)]
//! #[settings(table = "site_settings")]
//! struct SiteSettings {
//!     #[setting(required, max_length = 64)]
//!     title: String,
//!
//!     #[setting(min = 1, max = 100)]
//!     per_page: u32,
//! }
//!
//! // store.title()?, store.set_per_page(20)?, ...
//! use SiteSettingsAccessors as _;
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{Attribute, Data, DeriveInput, Expr, Fields, Lit, Meta, parse_macro_input};

/// Derive macro for generating `SettingsSchema` implementations.
///
/// Every named field becomes an allowed key whose default is the field's
/// value in `Default::default()`. A `<Struct>Accessors` trait is generated and
/// implemented for every `SettingsStore<B>`, with one getter (`field()`) and
/// one setter (`set_field(value)`) per field. A field whose getter or setter
/// would be shadowed by a `SettingsStore` method (`get`, `scope`, `many`, ...)
/// is a compile error; rename the field and keep its key with `rename`.
///
/// # Attributes
///
/// ## Container attributes (`#[settings(...)]`)
/// - `table = "name"` - Table name (default: snake_case struct name)
///
/// ## Field attributes (`#[setting(...)]`)
/// - `rename = "key"` - Stored key (default: field name)
/// - `required` - Value must be present
/// - `min = 0`, `max = 100` - Numeric bounds
/// - `min_length = 1`, `max_length = 64` - String/list length bounds
/// - `pattern = "^[a-z]+$"` - Regex for string values
/// - `no_default` - Do not register the field's `Default` value
/// - `skip` - Not a setting
#[proc_macro_derive(SettingsSchema, attributes(settings, setting))]
pub fn derive_settings_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let vis = &input.vis;
    let container = parse_container_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "SettingsSchema can only be derived for structs with named fields.\n\nExample:\n  #[derive(SettingsSchema)]\n  struct MySettings {\n      field: Type,\n  }",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "SettingsSchema can only be derived for structs.\n\nTry: #[derive(SettingsSchema)] on a struct, not an enum or union.",
            ));
        }
    };

    let table = container
        .table
        .unwrap_or_else(|| to_snake_case(&name.to_string()));

    let mut keys = Vec::new();
    let mut defaults = Vec::new();
    let mut rules = Vec::new();
    let mut signatures = Vec::new();
    let mut methods = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;
        let attrs = parse_field_attrs(&field.attrs)?;

        if attrs.skip {
            continue;
        }

        let key = attrs
            .rename
            .clone()
            .unwrap_or_else(|| field_name.to_string().trim_start_matches("r#").to_string());
        keys.push(key.clone());

        if !attrs.no_default {
            defaults.push(quote! { .default(#key, defaults.#field_name) });
        }
        rules.extend(rule_tokens(&key, &attrs));

        let method = field_name.to_string().trim_start_matches("r#").to_string();
        check_accessor_name(field_name, &method, &key)?;
        check_accessor_name(field_name, &format!("set_{method}"), &key)?;

        let setter = format_ident!("set_{}", method);
        signatures.push(quote! {
            fn #field_name(&self) -> ::rsettings::Result<#field_type>;
            fn #setter(&self, value: #field_type) -> ::rsettings::Result<#field_type>;
        });
        methods.push(quote! {
            fn #field_name(&self) -> ::rsettings::Result<#field_type> {
                self.get_as(#key)
            }

            fn #setter(&self, value: #field_type) -> ::rsettings::Result<#field_type> {
                self.set_as(#key, value)
            }
        });
    }

    let allow_keys = if keys.is_empty() {
        quote! {}
    } else {
        quote! { .allow_keys([#(#keys),*]) }
    };

    let accessors = format_ident!("{}Accessors", name);
    let accessors_doc = format!("Typed accessors for the `{table}` settings table");

    Ok(quote! {
        impl ::rsettings::SettingsSchema for #name {
            fn table_name() -> &'static str {
                #table
            }

            #[allow(unused_variables)]
            fn configure(
                builder: ::rsettings::SettingsConfigBuilder,
            ) -> ::rsettings::SettingsConfigBuilder {
                let defaults = <#name as ::core::default::Default>::default();
                builder
                    #allow_keys
                    #(#defaults)*
                    #(#rules)*
            }
        }

        #[doc = #accessors_doc]
        #vis trait #accessors {
            #(#signatures)*
        }

        impl<B: ::rsettings::StorageBackend> #accessors for ::rsettings::SettingsStore<B> {
            #(#methods)*
        }
    })
}

/// `SettingsStore` methods that an accessor of the same name could never reach
const RESERVED_METHODS: &[&str] = &[
    "new",
    "with_shared",
    "from_schema",
    "for_owner",
    "global",
    "config",
    "scope",
    "backend",
    "is_key_allowed",
    "get",
    "get_as",
    "get_all",
    "record",
    "set",
    "set_as",
    "set_many",
    "destroy",
    "table",
    "ensure_allowed",
    "write",
    "resolve_all",
    "clone",
];

fn check_accessor_name(field_name: &syn::Ident, method: &str, key: &str) -> syn::Result<()> {
    if !RESERVED_METHODS.contains(&method) {
        return Ok(());
    }
    let field = field_name.to_string();
    let field = field.trim_start_matches("r#");
    Err(syn::Error::new_spanned(
        field_name,
        format!(
            "field `{field_name}` would generate accessor `{method}`, which `SettingsStore` already defines.\n\n\
             Rename the field and keep the stored key:\n  #[setting(rename = \"{key}\")]\n  {field}_setting: Type,"
        ),
    ))
}

fn rule_tokens(key: &str, attrs: &FieldAttrs) -> Vec<TokenStream2> {
    let mut rules = Vec::new();

    if attrs.required {
        rules.push(quote! { .rule(#key, ::rsettings::Rule::required()) });
    }
    if attrs.min.is_some() || attrs.max.is_some() {
        let min = option_tokens(attrs.min);
        let max = option_tokens(attrs.max);
        rules.push(quote! { .rule(#key, ::rsettings::Rule::range(#min, #max)) });
    }
    if attrs.min_length.is_some() || attrs.max_length.is_some() {
        let min = option_tokens(attrs.min_length);
        let max = option_tokens(attrs.max_length);
        rules.push(quote! { .rule(#key, ::rsettings::Rule::length(#min, #max)) });
    }
    if let Some(pattern) = &attrs.pattern {
        rules.push(quote! { .pattern(#key, #pattern) });
    }

    rules
}

fn option_tokens<T: quote::ToTokens>(value: Option<T>) -> TokenStream2 {
    match value {
        Some(v) => quote! { ::core::option::Option::Some(#v) },
        None => quote! { ::core::option::Option::None },
    }
}

/// Container-level attributes from #[settings(...)]
#[derive(Default)]
struct ContainerAttrs {
    table: Option<String>,
}

/// Field-level attributes from #[setting(...)]
#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
    no_default: bool,
    skip: bool,
}

fn nested_meta(attr: &Attribute) -> syn::Result<Punctuated<Meta, syn::Token![,]>> {
    attr.parse_args_with(Punctuated::<Meta, syn::Token![,]>::parse_terminated)
}

fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("settings")) {
        for meta in nested_meta(attr)? {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("table") => {
                    result.table = Some(lit_str(&nv.value, "#[settings(table = \"site_settings\")]")?);
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "unknown settings attribute.\n\nExample: #[settings(table = \"site_settings\")]",
                    ));
                }
            }
        }
    }

    Ok(result)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("setting")) {
        for meta in nested_meta(attr)? {
            match &meta {
                Meta::Path(path) if path.is_ident("required") => result.required = true,
                Meta::Path(path) if path.is_ident("no_default") => result.no_default = true,
                Meta::Path(path) if path.is_ident("skip") => result.skip = true,
                Meta::NameValue(nv) => {
                    let value = &nv.value;
                    if nv.path.is_ident("rename") {
                        result.rename = Some(lit_str(value, "#[setting(rename = \"key\")]")?);
                    } else if nv.path.is_ident("pattern") {
                        result.pattern = Some(lit_str(value, "#[setting(pattern = \"^[a-z]+$\")]")?);
                    } else if nv.path.is_ident("min") {
                        result.min = Some(lit_f64(value, "#[setting(min = 0)]")?);
                    } else if nv.path.is_ident("max") {
                        result.max = Some(lit_f64(value, "#[setting(max = 100)]")?);
                    } else if nv.path.is_ident("min_length") {
                        result.min_length = Some(lit_usize(value, "#[setting(min_length = 1)]")?);
                    } else if nv.path.is_ident("max_length") {
                        result.max_length = Some(lit_usize(value, "#[setting(max_length = 64)]")?);
                    } else {
                        return Err(syn::Error::new_spanned(&nv.path, "unknown setting attribute"));
                    }
                }
                other => {
                    return Err(syn::Error::new_spanned(other, "unknown setting attribute"));
                }
            }
        }
    }

    if let (Some(min), Some(max)) = (result.min, result.max) {
        if min > max {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                format!("#[setting(min = {min}, max = {max})]: min cannot be greater than max"),
            ));
        }
    }

    Ok(result)
}

fn lit_str(expr: &Expr, example: &str) -> syn::Result<String> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Ok(s.value()),
            _ => Err(expected(expr, "a string literal", example)),
        },
        _ => Err(expected(expr, "a string literal", example)),
    }
}

fn lit_f64(expr: &Expr, example: &str) -> syn::Result<f64> {
    let (negative, inner) = match expr {
        Expr::Unary(unary) if matches!(unary.op, syn::UnOp::Neg(_)) => (true, unary.expr.as_ref()),
        _ => (false, expr),
    };
    let value = match inner {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Float(f) => f.base10_parse::<f64>()?,
            Lit::Int(i) => i.base10_parse::<f64>()?,
            _ => return Err(expected(expr, "a number", example)),
        },
        _ => return Err(expected(expr, "a number", example)),
    };
    Ok(if negative { -value } else { value })
}

fn lit_usize(expr: &Expr, example: &str) -> syn::Result<usize> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(i) => i.base10_parse::<usize>(),
            _ => Err(expected(expr, "an integer", example)),
        },
        _ => Err(expected(expr, "an integer", example)),
    }
}

fn expected(expr: &Expr, what: &str, example: &str) -> syn::Error {
    syn::Error::new_spanned(expr, format!("expected {what}.\n\nExample: {example}"))
}

/// `SiteSettings` -> `site_settings`
fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{expand, to_snake_case};
    use syn::{DeriveInput, parse_quote};

    fn expand_error(input: DeriveInput) -> String {
        expand(&input).unwrap_err().to_string()
    }

    #[test]
    fn test_reserved_accessor_names_are_rejected() {
        let message = expand_error(parse_quote! {
            struct Bad {
                get: u32,
            }
        });
        assert!(message.contains("accessor `get`"), "{message}");
        assert!(message.contains("#[setting(rename = \"get\")]"), "{message}");

        // `many` would generate `set_many`
        let message = expand_error(parse_quote! {
            struct Bad {
                many: u32,
            }
        });
        assert!(message.contains("accessor `set_many`"), "{message}");
    }

    #[test]
    fn test_renamed_field_keeps_reserved_key() {
        let input: DeriveInput = parse_quote! {
            struct Good {
                #[setting(rename = "get")]
                get_setting: u32,
                #[setting(skip)]
                scope: u32,
            }
        };
        let tokens = expand(&input).unwrap().to_string();
        assert!(tokens.contains("\"get\""));
        assert!(tokens.contains("get_setting"));
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("SiteSettings"), "site_settings");
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("HTTPConfig"), "http_config");
        assert_eq!(to_snake_case("Oauth2Tokens"), "oauth2_tokens");
    }
}
