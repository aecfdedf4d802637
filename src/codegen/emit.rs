//! Registration code emission.
//!
//! Each source module with step owners gets one `<module>.steps.rs` file,
//! meant to be `include!`d into that module. It holds:
//! - one `<Owner>BuildProvider` per owner type, which creates the owner
//!   through `Default` and registers every step of it
//! - one `BuildStep` struct per step method, which pulls the method's
//!   inputs out of the build context, calls it and produces its outputs

use anyhow::{Context, Result};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::Ident;

use crate::codegen::model::{Injection, ModuleModel, OwnerModel, Output, Pass, StepModel};

/// First line of every generated file.
pub const GENERATED_HEADER: &str = "// @generated by buildchain. Do not edit.\n\n";

/// File name of the generated code for `module`.
pub fn module_file_name(module: &str) -> String {
    if module.is_empty() {
        "crate.steps.rs".to_string()
    } else {
        format!("{}.steps.rs", module.replace("::", "__"))
    }
}

pub fn provider_name(owner: &str) -> String {
    format!("{}BuildProvider", owner)
}

/// Crate-relative path of an owner's provider, as listed in the provider
/// listing.
pub fn provider_path(module: &str, owner: &str) -> String {
    if module.is_empty() {
        format!("crate::{}", provider_name(owner))
    } else {
        format!("crate::{}::{}", module, provider_name(owner))
    }
}

/// Stable step id: module path, owner and method.
pub fn step_id(module: &str, step: &StepModel) -> String {
    let method = unraw(&step.method);
    if module.is_empty() {
        format!("{}::{}", step.owner, method)
    } else {
        format!("{}::{}::{}", module, step.owner, method)
    }
}

/// Render the generated file for one module.
pub fn render_module(module: &ModuleModel) -> Result<String> {
    let mut tokens = TokenStream::new();
    for owner in &module.owners {
        tokens.extend(owner_tokens(&module.module, owner)?);
    }
    let file: syn::File = syn::parse2(tokens)
        .with_context(|| format!("generated invalid code for module `{}`", module.module))?;
    Ok(format!("{}{}", GENERATED_HEADER, prettyplease::unparse(&file)))
}

fn owner_tokens(module: &str, owner: &OwnerModel) -> Result<TokenStream> {
    let owner_ty = format_ident!("{}", owner.name);
    let provider = format_ident!("{}", provider_name(&owner.name));
    let provider_path = provider_path(module, &owner.name);

    let mut registrations = Vec::new();
    let mut steps = Vec::new();
    for step in &owner.steps {
        let generated = StepTokens::new(module, &owner_ty, step)?;
        registrations.push(generated.registration);
        steps.push(generated.definition);
    }

    Ok(quote! {
        #[doc = "Registers the build steps of this module's step owner."]
        #[derive(Debug, Default, Clone, Copy)]
        pub struct #provider;

        impl ::buildchain::BuildProvider for #provider {
            fn name(&self) -> &str {
                #provider_path
            }

            fn install_into(
                &self,
                builder: &mut ::buildchain::BuildChainBuilder,
            ) -> ::std::result::Result<(), ::buildchain::ChainBuildError> {
                let owner = ::std::sync::Arc::new(<#owner_ty as ::std::default::Default>::default());
                #(#registrations)*
                Ok(())
            }
        }

        #(#steps)*
    })
}

struct StepTokens {
    registration: TokenStream,
    definition: TokenStream,
}

impl StepTokens {
    fn new(module: &str, owner_ty: &Ident, step: &StepModel) -> Result<Self> {
        let name = format_ident!("{}{}BuildStep", step.owner, camel_case(&step.method));
        let method = format_ident!("{}", step.method);
        let id = step_id(module, step);

        let mut declarations = Vec::new();
        let mut bindings = Vec::new();
        let mut recorder = None;
        let mut args = Vec::new();
        let mut drains = Vec::new();

        for (i, injection) in step.injections.iter().enumerate() {
            let var = format_ident!("arg{}", i);
            match injection {
                Injection::Simple {
                    item,
                    optional: false,
                    pass,
                } => {
                    let ty = parse_type(&item.path)?;
                    declarations.push(quote!(.consumes::<#ty>()));
                    bindings.push(quote!(let #var = ctx.consume::<#ty>()?;));
                    args.push(match pass {
                        Pass::Ref => quote!(&#var),
                        Pass::Arc => quote!(#var),
                    });
                }
                Injection::Simple {
                    item,
                    optional: true,
                    pass,
                } => {
                    let ty = parse_type(&item.path)?;
                    declarations.push(quote!(.consumes_optional::<#ty>()));
                    bindings.push(quote!(let #var = ctx.consume_optional::<#ty>()?;));
                    args.push(match pass {
                        Pass::Ref => quote!(#var.as_deref()),
                        Pass::Arc => quote!(#var),
                    });
                }
                Injection::Multi {
                    item,
                    optional: false,
                } => {
                    let ty = parse_type(&item.path)?;
                    declarations.push(quote!(.consumes::<#ty>()));
                    bindings.push(quote!(let #var = ctx.consume_multi::<#ty>()?;));
                    args.push(quote!(#var));
                }
                Injection::Multi {
                    item,
                    optional: true,
                } => {
                    let ty = parse_type(&item.path)?;
                    declarations.push(quote!(.consumes_optional::<#ty>()));
                    bindings.push(quote!(let #var = ctx.consume_multi::<#ty>()?;));
                    args.push(quote!((!#var.is_empty()).then_some(#var)));
                }
                Injection::Producer { item } => {
                    let ty = parse_type(&item.path)?;
                    declarations.push(quote!(.produces::<#ty>()));
                    bindings.push(quote!(let mut #var = ::buildchain::BuildProducer::<#ty>::new();));
                    args.push(quote!(&mut #var));
                    drains.push(quote!(ctx.produce_all(#var.into_items())?;));
                }
                Injection::Recorder => {
                    // Borrows the context mutably, so it is bound last.
                    recorder = Some(quote!(let #var = ctx.recorder()?;));
                    args.push(quote!(#var));
                }
                Injection::Executor => {
                    bindings.push(quote!(let #var = ctx.executor();));
                    args.push(quote!(#var));
                }
            }
        }
        bindings.extend(recorder);

        for item in &step.declared_consumes {
            let ty = parse_type(&item.path)?;
            declarations.push(quote!(.consumes::<#ty>()));
        }
        for item in &step.declared_produces {
            let ty = parse_type(&item.path)?;
            declarations.push(quote!(.produces::<#ty>()));
        }
        for item in &step.declared_weak_produces {
            let ty = parse_type(&item.path)?;
            declarations.push(quote!(.produces_weak::<#ty>()));
        }
        if let Some(item) = step.output.item() {
            let ty = parse_type(&item.path)?;
            declarations.push(quote!(.produces::<#ty>()));
        }
        if let Some(phase) = step.recording {
            let phase = format_ident!("{}", format!("{:?}", phase));
            declarations.push(quote!(.recording(::buildchain::ExecutionTime::#phase)));
        }
        for capability in &step.capabilities {
            declarations.push(quote!(.provides_capability(#capability)));
        }

        let try_op = step.fallible.then(|| quote!(?));
        let call = quote!(self.owner.#method(#(#args),*)#try_op);
        let invoke = match &step.output {
            Output::Unit => quote!(#call;),
            Output::Item(_) => quote! {
                let output = #call;
                ctx.produce(output)?;
            },
            Output::Optional(_) => quote! {
                if let Some(output) = #call {
                    ctx.produce(output)?;
                }
            },
            Output::List(_) => quote! {
                let output = #call;
                ctx.produce_all(output)?;
            },
        };

        let registration = quote! {
            builder
                .add_build_step(#name {
                    owner: ::std::sync::Arc::clone(&owner),
                })
                #(#declarations)*
                .build()?;
        };

        let definition = quote! {
            struct #name {
                owner: ::std::sync::Arc<#owner_ty>,
            }

            impl ::buildchain::BuildStep for #name {
                fn id(&self) -> ::std::string::String {
                    #id.to_string()
                }

                #[allow(unused_variables, unused_mut)]
                fn execute(
                    &self,
                    ctx: &mut ::buildchain::BuildContext<'_>,
                ) -> ::buildchain::anyhow::Result<()> {
                    #(#bindings)*
                    #invoke
                    #(#drains)*
                    Ok(())
                }
            }
        };

        Ok(StepTokens {
            registration,
            definition,
        })
    }
}

fn parse_type(path: &str) -> Result<syn::Type> {
    syn::parse_str(path).with_context(|| format!("invalid item type `{}`", path))
}

/// `r#match` is named `match` outside of call sites.
fn unraw(name: &str) -> &str {
    name.strip_prefix("r#").unwrap_or(name)
}

fn camel_case(name: &str) -> String {
    unraw(name)
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}
