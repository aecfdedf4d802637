//! The provider listing and the registry built from it.
//!
//! The listing is a plain text file with one crate-relative provider path per
//! line, so it belongs to exactly one crate. Repeated generation runs for
//! that crate merge into it and never drop an entry.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use quote::quote;

use crate::util::fs;

pub const LISTING_FILE_NAME: &str = "build-providers.list";

/// Generated file exposing `build_providers()`.
pub const REGISTRY_FILE_NAME: &str = "providers.rs";

/// Parse listing contents. Blank lines and `#` comments are skipped.
pub fn parse_listing(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn render_listing(providers: &BTreeSet<String>) -> String {
    let mut out = String::new();
    for provider in providers {
        out.push_str(provider);
        out.push('\n');
    }
    out
}

/// Merge `providers` into the listing at `path` and return the full set.
pub fn merge_listing(path: &Path, providers: &[String]) -> Result<BTreeSet<String>> {
    let mut merged = if path.exists() {
        parse_listing(&fs::read_to_string(path)?)
    } else {
        BTreeSet::new()
    };
    let before = merged.len();
    merged.extend(providers.iter().cloned());

    if fs::write_if_changed(path, &render_listing(&merged))? {
        tracing::debug!(
            "Listing {} now holds {} provider(s), {} new",
            path.display(),
            merged.len(),
            merged.len() - before
        );
    }
    Ok(merged)
}

/// Render `providers.rs`: one function registering every listed provider.
pub fn render_registry(providers: &BTreeSet<String>) -> Result<String> {
    let paths = providers
        .iter()
        .map(|p| syn::parse_str::<syn::Path>(p).with_context(|| format!("invalid provider path `{}`", p)))
        .collect::<Result<Vec<_>>>()?;

    let tokens = quote! {
        #[doc = "Every build provider generated for this crate."]
        #[allow(unused_mut)]
        pub fn build_providers() -> ::buildchain::ProviderRegistry {
            let mut registry = ::buildchain::ProviderRegistry::new();
            #(
                registry.register(::std::boxed::Box::new(<#paths as ::std::default::Default>::default()));
            )*
            registry
        }
    };
    let file: syn::File = syn::parse2(tokens).context("generated invalid provider registry")?;
    Ok(format!(
        "{}{}",
        crate::codegen::emit::GENERATED_HEADER,
        prettyplease::unparse(&file)
    ))
}
