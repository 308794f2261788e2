//! Internal derive macros for clasp.
//!
//! Currently provides [`DocDefault`], which lets configuration structs document their own default
//! values in a doc comment and derives a matching `Default` impl from it, so the two can never
//! drift apart.
extern crate proc_macro;

use proc_macro2::TokenStream;
use quote::quote;
use regex::Regex;
use synstructure::decl_derive;

decl_derive!([DocDefault] => doc_default_derive);

/// Parses a `(Default: <value>)` annotation out of a field's doc comment and uses it as the
/// field's value in the derived `Default` impl.
///
/// Fields without such an annotation fall back to `Default::default()`.
fn doc_default_derive(s: synstructure::Structure) -> TokenStream {
    let marker = Regex::new(r"\(Default:\s*(.+?)\s*\)").expect("invalid regex");

    if s.variants().len() != 1 {
        panic!("DocDefault can only be derived for structs");
    }

    let variant = &s.variants()[0];

    let fields = variant.bindings().iter().map(|binding| {
        let field = binding.ast();
        let ident = field.ident.as_ref().expect("DocDefault requires named fields");

        let doc_value = field
            .attrs
            .iter()
            .filter_map(|attr| attr.interpret_meta())
            .find_map(|meta| match meta {
                syn::Meta::NameValue(nv) if nv.ident == "doc" => match nv.lit {
                    syn::Lit::Str(lit) => Some(lit.value()),
                    _ => None,
                },
                _ => None,
            })
            .and_then(|doc| {
                marker
                    .captures(&doc)
                    .map(|caps| caps.get(1).unwrap().as_str().to_owned())
            });

        match doc_value {
            Some(value) => {
                let parsed: TokenStream = value.parse().unwrap_or_else(|_| {
                    panic!("invalid default value `{}` for field `{}`", value, ident)
                });
                quote! { #ident: #parsed }
            }
            None => quote! { #ident: ::std::default::Default::default() },
        }
    });

    s.gen_impl(quote! {
        gen impl ::std::default::Default for @Self {
            fn default() -> Self {
                Self { #(#fields),* }
            }
        }
    })
}
