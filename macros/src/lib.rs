//! Marker attributes for build step methods.
//!
//! The attributes leave the annotated method untouched. `buildchain generate`
//! reads them from source and emits the registration code; here only the
//! argument syntax and the annotated item are checked, so mistakes surface at
//! compile time of the extension crate.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::ToTokens;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Ident, ImplItemFn, LitStr, Path, Token};

/// Mark a method as a build step.
///
/// Accepts any number of `capability = "name"` arguments.
#[proc_macro_attribute]
pub fn build_step(args: TokenStream, item: TokenStream) -> TokenStream {
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("capability") {
            meta.value()?.parse::<LitStr>()?;
            Ok(())
        } else {
            Err(meta.error("unsupported build_step argument, expected `capability = \"...\"`"))
        }
    });
    if let Err(e) = parser.parse(args) {
        return e.to_compile_error().into();
    }
    passthrough("build_step", item)
}

/// Mark a build step as recording deferred work: `#[record(static_init)]` or
/// `#[record(runtime_init)]`.
#[proc_macro_attribute]
pub fn record(args: TokenStream, item: TokenStream) -> TokenStream {
    let phase = match syn::parse::<Ident>(args) {
        Ok(phase) => phase,
        Err(e) => return e.to_compile_error().into(),
    };
    if phase != "static_init" && phase != "runtime_init" {
        return syn::Error::new(phase.span(), "expected `static_init` or `runtime_init`")
            .to_compile_error()
            .into();
    }
    passthrough("record", item)
}

/// Declare items a build step produces without returning them.
#[proc_macro_attribute]
pub fn produce(args: TokenStream, item: TokenStream) -> TokenStream {
    with_item_list("produce", args, item)
}

/// Declare items a build step produces weakly.
#[proc_macro_attribute]
pub fn produce_weak(args: TokenStream, item: TokenStream) -> TokenStream {
    with_item_list("produce_weak", args, item)
}

/// Declare items a build step must run after, without injecting them.
#[proc_macro_attribute]
pub fn consume(args: TokenStream, item: TokenStream) -> TokenStream {
    with_item_list("consume", args, item)
}

fn with_item_list(name: &str, args: TokenStream, item: TokenStream) -> TokenStream {
    match Punctuated::<Path, Token![,]>::parse_terminated.parse(args) {
        Ok(items) if items.is_empty() => {
            syn::Error::new(Span::call_site(), format!("`{}` expects at least one item type", name))
                .to_compile_error()
                .into()
        }
        Ok(_) => passthrough(name, item),
        Err(e) => e.to_compile_error().into(),
    }
}

fn passthrough(name: &str, item: TokenStream) -> TokenStream {
    match syn::parse::<ImplItemFn>(item) {
        Ok(method) => method.into_token_stream().into(),
        Err(e) => syn::Error::new(
            e.span(),
            format!("`#[{}]` can only be applied to methods in an `impl` block", name),
        )
        .to_compile_error()
        .into(),
    }
}
