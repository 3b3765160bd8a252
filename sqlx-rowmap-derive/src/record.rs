//! Record derive macro implementation

use proc_macro2::{Literal, TokenStream};
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Field, Fields, LitStr, Result};

#[derive(Default)]
struct FieldAttrs {
    col: Option<LitStr>,
    cols: Option<LitStr>,
    embed: bool,
    skip: bool,
}

fn parse_field_attrs(field: &Field) -> Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("rowmap") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("col") {
                attrs.col = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("cols") {
                attrs.cols = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("embed") {
                attrs.embed = true;
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else {
                return Err(meta.error("expected `col`, `cols`, `embed` or `skip`"));
            }
            Ok(())
        })?;
    }

    let renamed = attrs.col.is_some() || attrs.cols.is_some();
    if attrs.skip && (attrs.embed || renamed) {
        return Err(syn::Error::new_spanned(
            field,
            "`skip` cannot be combined with other rowmap attributes",
        ));
    }
    if attrs.embed && renamed {
        return Err(syn::Error::new_spanned(
            field,
            "embedded fields take their columns from the inner record",
        ));
    }
    Ok(attrs)
}

/// Extract the inner type T from Option<T>, or return None if not an Option type.
fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    if seg.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ))
        }
    };

    let type_name = name.unraw().to_string();
    let mut defs = Vec::new();
    let mut arms = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let Some(ident) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let field_name = ident.unraw().to_string();
        let ty = &field.ty;
        let index = Literal::usize_unsuffixed(index);
        let attrs = parse_field_attrs(field)?;

        if attrs.skip {
            defs.push(quote! {
                ::sqlx_rowmap::schema::FieldDef::skipped(#field_name)
            });
        } else if attrs.embed {
            match option_inner(ty) {
                Some(inner) => {
                    defs.push(quote! {
                        ::sqlx_rowmap::schema::FieldDef::embedded(
                            #field_name,
                            <#inner as ::sqlx_rowmap::schema::Record>::fields,
                        )
                    });
                    arms.push(quote! {
                        [#index, rest @ ..] => ::sqlx_rowmap::schema::Record::assign(
                            self.#ident.get_or_insert_with(::core::default::Default::default),
                            rest,
                            value,
                        )
                    });
                }
                None => {
                    defs.push(quote! {
                        ::sqlx_rowmap::schema::FieldDef::embedded(
                            #field_name,
                            <#ty as ::sqlx_rowmap::schema::Record>::fields,
                        )
                    });
                    arms.push(quote! {
                        [#index, rest @ ..] => ::sqlx_rowmap::schema::Record::assign(
                            &mut self.#ident,
                            rest,
                            value,
                        )
                    });
                }
            }
        } else {
            let mut def = quote! {
                ::sqlx_rowmap::schema::FieldDef::column::<#ty>(#field_name)
            };
            if let Some(col) = &attrs.col {
                def = quote! { #def.col(#col) };
            }
            if let Some(cols) = &attrs.cols {
                def = quote! { #def.cols(#cols) };
            }
            defs.push(def);
            arms.push(quote! {
                [#index] => ::sqlx_rowmap::schema::assign_field(&mut self.#ident, value)
            });
        }
    }

    Ok(quote! {
        impl ::sqlx_rowmap::schema::Record for #name {
            fn fields() -> ::std::vec::Vec<::sqlx_rowmap::schema::FieldDef> {
                ::std::vec![#(#defs),*]
            }

            #[allow(unused_variables)]
            fn assign(
                &mut self,
                path: &[usize],
                value: ::sqlx_rowmap::Value,
            ) -> ::sqlx_rowmap::Result<()> {
                match path {
                    #(#arms,)*
                    _ => ::std::result::Result::Err(
                        ::sqlx_rowmap::schema::unknown_field(#type_name, path),
                    ),
                }
            }

            fn type_name() -> &'static str {
                #type_name
            }
        }

        impl ::sqlx_rowmap::Target for #name {
            fn resolve(&mut self) -> ::sqlx_rowmap::Result<::sqlx_rowmap::Dest<'_>> {
                ::sqlx_rowmap::Dest::record(self)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    /// Expansion with whitespace removed, so checks do not depend on token spacing.
    fn expand_str(input: DeriveInput) -> String {
        expand(input).unwrap().to_string().replace(char::is_whitespace, "")
    }

    #[test]
    fn test_option_inner() {
        let ty: syn::Type = parse_quote!(Option<Audit>);
        assert!(option_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(std::option::Option<Box<Audit>>);
        assert!(option_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(Audit);
        assert!(option_inner(&ty).is_none());
    }

    #[test]
    fn test_field_indexes_follow_declaration_order() {
        let out = expand_str(parse_quote! {
            struct Account {
                #[rowmap(col = "account_id")]
                id: i64,
                #[rowmap(skip)]
                cache: Vec<u8>,
                #[rowmap(cols = "user_name, name")]
                login: String,
            }
        });
        assert!(out.contains("column::<i64>(\"id\").col(\"account_id\")"), "{out}");
        assert!(out.contains("skipped(\"cache\")"), "{out}");
        assert!(out.contains("column::<String>(\"login\").cols(\"user_name,name\")"), "{out}");
        assert!(out.contains("[0]=>"), "{out}");
        assert!(out.contains("[2]=>"), "{out}");
        assert!(!out.contains("[1]=>"), "{out}");
    }

    #[test]
    fn test_optional_embed_is_allocated() {
        let out = expand_str(parse_quote! {
            struct Post {
                #[rowmap(embed)]
                audit: Option<Box<Audit>>,
            }
        });
        assert!(out.contains("<Box<Audit>as::sqlx_rowmap::schema::Record>::fields"), "{out}");
        assert!(out.contains("[0,rest@..]=>"), "{out}");
        assert!(out.contains("self.audit.get_or_insert_with"), "{out}");
    }

    #[test]
    fn test_raw_identifiers_are_unrawed() {
        let out = expand_str(parse_quote! {
            struct Entry {
                r#type: String,
            }
        });
        assert!(out.contains("column::<String>(\"type\")"), "{out}");
        assert!(out.contains("self.r#type"), "{out}");
        assert!(out.contains("unknown_field(\"Entry\",path)"), "{out}");
    }

    #[test]
    fn test_rejected_inputs() {
        assert!(expand(parse_quote!(struct Pair(i32, i32);)).is_err());
        assert!(expand(parse_quote!(enum Kind { A })).is_err());
        assert!(expand(parse_quote!(struct Wrapper<T> { inner: T })).is_err());
        assert!(expand(parse_quote! {
            struct Bad {
                #[rowmap(rename = "x")]
                a: i32,
            }
        })
        .is_err());
        assert!(expand(parse_quote! {
            struct Bad {
                #[rowmap(skip, col = "x")]
                a: i32,
            }
        })
        .is_err());
        assert!(expand(parse_quote! {
            struct Bad {
                #[rowmap(embed, cols = "x")]
                a: Inner,
            }
        })
        .is_err());
    }
}
