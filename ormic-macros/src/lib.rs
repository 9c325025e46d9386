//! `#[derive(Entity)]`: the load-time decorator-equivalent for ormic.
//!
//! Expands to a `HasSchema` impl plus one `inventory::submit!` per table,
//! column and relation the struct declares via `#[ormic(...)]` attributes.
//! None of this runs at query-compile time — it runs once, at program
//! startup, exactly like the decorators it stands in for.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, LitInt, LitStr, Path};

#[proc_macro_derive(Entity, attributes(ormic))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let type_name = ident.to_string();
    let table_name = parse_table_name(&input.attrs)?.unwrap_or_else(|| default_table_name(&type_name));

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Entity can only be derived for structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(ident, "Entity can only be derived for structs")),
    };

    let mut submissions = Vec::new();

    for field in fields {
        let attr = parse_field_attr(field)?;
        if attr.skip {
            continue;
        }
        let field_ident = field.ident.as_ref().expect("named field");
        let field_name = field_ident.to_string();

        if attr.relation {
            submissions.push(relation_submission(ident, &field_name, &attr)?);
        } else {
            // A field with no `#[ormic(...)]` attribute at all still
            // defaults to a plain column.
            submissions.push(column_submission(ident, &field_name, &attr));
        }
    }

    Ok(quote! {
        impl ormic::HasSchema for #ident {
            fn type_name() -> &'static str {
                #type_name
            }
        }

        ormic::inventory::submit! {
            ormic::schema::TableDescriptor {
                type_id: std::any::TypeId::of::<#ident>,
                type_name: #type_name,
                table_name: #table_name,
            }
        }

        #(#submissions)*
    })
}

fn default_table_name(type_name: &str) -> String {
    let mut snake = String::new();
    for (i, ch) in type_name.char_indices() {
        if ch.is_uppercase() && i != 0 {
            snake.push('_');
        }
        snake.extend(ch.to_lowercase());
    }
    format!("{snake}s")
}

fn column_submission(ident: &syn::Ident, field_name: &str, attr: &FieldAttr) -> TokenStream2 {
    let column_name = attr.rename.clone().unwrap_or_else(|| field_name.to_string());
    let nullable = attr.nullable;
    let unique = attr.unique;
    let primary = attr.primary;
    let sql_type = match &attr.sql_type {
        Some(t) => quote! { Some(#t) },
        None => quote! { None },
    };
    let length = match attr.length {
        Some(l) => quote! { Some(#l) },
        None => quote! { None },
    };
    quote! {
        ormic::inventory::submit! {
            ormic::schema::ColumnDescriptor {
                owner: std::any::TypeId::of::<#ident>,
                field_name: #field_name,
                column_name: #column_name,
                sql_type: #sql_type,
                nullable: #nullable,
                unique: #unique,
                primary: #primary,
                length: #length,
            }
        }
    }
}

fn relation_submission(ident: &syn::Ident, field_name: &str, attr: &FieldAttr) -> syn::Result<TokenStream2> {
    let target = attr
        .target
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(ident, format!("field `{field_name}` needs `target = <Entity>`")))?;
    let foreign_key = attr.foreign_key.clone().ok_or_else(|| {
        syn::Error::new_spanned(ident, format!("field `{field_name}` needs `foreign_key = \"...\"`"))
    })?;
    let principal_key = attr.principal_key.clone().unwrap_or_else(|| "id".to_string());
    let join_kind = attr.join_kind.clone().unwrap_or_else(|| quote! { ormic::schema::JoinKind::Left });
    let nullable = attr.nullable;
    let eager = attr.eager;

    Ok(quote! {
        ormic::inventory::submit! {
            ormic::schema::RelationDescriptor {
                owner: std::any::TypeId::of::<#ident>,
                field_name: #field_name,
                target: std::any::TypeId::of::<#target>,
                target_name: <#target as ormic::HasSchema>::type_name,
                join_kind: #join_kind,
                foreign_key: #foreign_key,
                principal_key: #principal_key,
                nullable: #nullable,
                eager: #eager,
            }
        }
    })
}

#[derive(Default)]
struct FieldAttr {
    column: bool,
    relation: bool,
    skip: bool,
    primary: bool,
    nullable: bool,
    unique: bool,
    eager: bool,
    rename: Option<String>,
    sql_type: Option<String>,
    length: Option<u32>,
    target: Option<Path>,
    foreign_key: Option<String>,
    principal_key: Option<String>,
    join_kind: Option<TokenStream2>,
}

fn parse_table_name(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut table_name = None;
    for attr in attrs {
        if !attr.path().is_ident("ormic") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                table_name = Some(lit.value());
                Ok(())
            } else {
                Ok(())
            }
        })?;
    }
    Ok(table_name)
}

fn parse_field_attr(field: &Field) -> syn::Result<FieldAttr> {
    let mut result = FieldAttr::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("ormic") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                result.column = true;
            } else if meta.path.is_ident("relation") {
                result.relation = true;
            } else if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("primary") {
                result.primary = true;
            } else if meta.path.is_ident("nullable") {
                result.nullable = true;
            } else if meta.path.is_ident("unique") {
                result.unique = true;
            } else if meta.path.is_ident("eager") {
                result.eager = true;
            } else if meta.path.is_ident("has_many") || meta.path.is_ident("has_one") {
                result.join_kind = Some(quote! { ormic::schema::JoinKind::Left });
            } else if meta.path.is_ident("left_join") {
                result.join_kind = Some(quote! { ormic::schema::JoinKind::Left });
            } else if meta.path.is_ident("inner_join") {
                result.join_kind = Some(quote! { ormic::schema::JoinKind::Inner });
            } else if meta.path.is_ident("right_join") {
                result.join_kind = Some(quote! { ormic::schema::JoinKind::Right });
            } else if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                result.rename = Some(lit.value());
            } else if meta.path.is_ident("sql_type") {
                let lit: LitStr = meta.value()?.parse()?;
                result.sql_type = Some(lit.value());
            } else if meta.path.is_ident("length") {
                let lit: LitInt = meta.value()?.parse()?;
                result.length = Some(lit.base10_parse()?);
            } else if meta.path.is_ident("target") {
                let path: Path = meta.value()?.parse()?;
                result.target = Some(path);
            } else if meta.path.is_ident("foreign_key") {
                let lit: LitStr = meta.value()?.parse()?;
                result.foreign_key = Some(lit.value());
            } else if meta.path.is_ident("principal_key") {
                let lit: LitStr = meta.value()?.parse()?;
                result.principal_key = Some(lit.value());
            } else {
                return Err(meta.error(format!(
                    "unknown ormic field attribute `{}`",
                    meta.path.to_token_stream()
                )));
            }
            Ok(())
        })?;
    }
    Ok(result)
}
