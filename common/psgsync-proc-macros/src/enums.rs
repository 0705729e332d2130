use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Ident};

fn fieldless_variants<'a>(ast: &'a DeriveInput, macro_name: &str) -> Vec<&'a Ident> {
    let name = &ast.ident;

    let Data::Enum(data) = &ast.data else {
        panic!("{macro_name} derive macro can only be applied to enums; {name} is not an enum");
    };

    data.variants
        .iter()
        .map(|variant| {
            let variant_name = &variant.ident;
            assert!(
                variant.fields.is_empty(),
                "{macro_name} macro only supports enums with only fieldless variants; {name}::{variant_name} has fields"
            );
            variant_name
        })
        .collect()
}

pub fn enum_display(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("unable to parse input");

    let name = &ast.ident;
    let match_arms = fieldless_variants(&ast, "EnumDisplay").into_iter().map(|variant_name| {
        let variant_name_str = variant_name.to_string();
        quote! {
            Self::#variant_name => #variant_name_str
        }
    });

    let expanded = quote! {
        impl #name {
            #[must_use]
            pub fn to_str(self) -> &'static str {
                match self {
                    #(#match_arms,)*
                }
            }
        }

        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.to_str())
            }
        }
    };

    expanded.into()
}

pub fn enum_from_str(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).expect("unable to parse input");

    let name = &ast.ident;
    let match_arms = fieldless_variants(&ast, "EnumFromStr").into_iter().map(|variant_name| {
        let variant_name_lowercase = variant_name.to_string().to_ascii_lowercase();
        quote! {
            #variant_name_lowercase => ::std::result::Result::Ok(Self::#variant_name)
        }
    });

    let err_fmt_string = format!("invalid {name} string: '{{}}'");
    let expanded = quote! {
        impl ::std::str::FromStr for #name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    #(#match_arms,)*
                    _ => ::std::result::Result::Err(::std::format!(#err_fmt_string, s))
                }
            }
        }
    };

    expanded.into()
}
