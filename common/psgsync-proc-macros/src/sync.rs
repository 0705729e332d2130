use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Field, Fields, LitStr, Member};

pub fn sync_state(input: TokenStream) -> TokenStream {
    let input: DeriveInput = syn::parse(input).expect("Unable to parse input");

    let type_ident = &input.ident;
    let Data::Struct(data) = &input.data else {
        panic!("SyncState only supports structs; {type_ident} is not a struct");
    };

    let field_syncs: Vec<_> = match &data.fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .filter_map(|field| {
                let field_ident =
                    field.ident.clone().expect("Nested inside Fields::Named match arm");
                let default_key = field_ident.to_string();
                sync_field(Member::Named(field_ident), default_key, field)
            })
            .collect(),
        Fields::Unnamed(fields) => fields
            .unnamed
            .iter()
            .enumerate()
            .filter_map(|(i, field)| sync_field(Member::from(i), i.to_string(), field))
            .collect(),
        Fields::Unit => vec![],
    };

    let (begin_section, end_section) = match parse_section_attr(&input.attrs) {
        Some(section) => (
            quote! {
                ::psgsync_common::sync::StateSerializer::begin_section(serializer, #section)?;
            },
            quote! {
                ::psgsync_common::sync::StateSerializer::end_section(serializer)?;
            },
        ),
        None => (quote! {}, quote! {}),
    };

    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::psgsync_common::sync::SyncState for #type_ident #type_generics #where_clause {
            fn sync_state<__S: ::psgsync_common::sync::StateSerializer>(
                &mut self,
                serializer: &mut __S,
            ) -> ::psgsync_common::sync::SyncResult<()> {
                #begin_section
                #(#field_syncs)*
                #end_section
                ::std::result::Result::Ok(())
            }
        }
    };

    expanded.into()
}

fn sync_field(member: Member, default_key: String, field: &Field) -> Option<TokenStream2> {
    let attr = parse_sync_field_attr(field);

    let key = attr.name.unwrap_or(default_key);
    match attr.kind {
        SyncFieldKind::Skip => None,
        SyncFieldKind::Value => Some(quote! {
            ::psgsync_common::sync::StateSerializer::sync(serializer, #key, &mut self.#member)?;
        }),
        SyncFieldKind::Array { compress } => Some(quote! {
            ::psgsync_common::sync::StateSerializer::sync_array(
                serializer,
                #key,
                &mut self.#member[..],
                #compress,
            )?;
        }),
        SyncFieldKind::Nested => Some(quote! {
            ::psgsync_common::sync::SyncState::sync_state(&mut self.#member, serializer)?;
        }),
    }
}

fn parse_section_attr(attrs: &[Attribute]) -> Option<String> {
    let mut section = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("sync")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("section") {
                let value: LitStr = meta.value()?.parse()?;
                section = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("struct-level sync attribute must be 'section = \"...\"'"))
            }
        })
        .expect("Unable to parse struct-level sync attribute");
    }

    section
}

enum SyncFieldKind {
    Value,
    Array { compress: bool },
    Nested,
    Skip,
}

struct SyncFieldAttr {
    name: Option<String>,
    kind: SyncFieldKind,
}

fn parse_sync_field_attr(field: &Field) -> SyncFieldAttr {
    let mut name = None;
    let mut array = false;
    let mut compress = false;
    let mut nested = false;
    let mut skip = false;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("sync")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("array") {
                array = true;
                Ok(())
            } else if meta.path.is_ident("compress") {
                compress = true;
                Ok(())
            } else if meta.path.is_ident("nested") {
                nested = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error(
                    "nested sync attribute must be one of 'name', 'array', 'compress', 'nested', 'skip'",
                ))
            }
        })
        .expect("Unable to parse sync field attribute");
    }

    assert!(!compress || array, "sync attribute 'compress' is only valid together with 'array'");
    assert!(
        [array, nested, skip].into_iter().filter(|&set| set).count() <= 1,
        "sync attributes 'array', 'nested', and 'skip' are mutually exclusive"
    );
    assert!(
        name.is_none() || !(nested || skip),
        "sync attribute 'name' has no effect on nested or skipped fields"
    );

    let kind = if skip {
        SyncFieldKind::Skip
    } else if nested {
        SyncFieldKind::Nested
    } else if array {
        SyncFieldKind::Array { compress }
    } else {
        SyncFieldKind::Value
    };

    SyncFieldAttr { name, kind }
}
