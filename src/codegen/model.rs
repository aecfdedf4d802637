//! Language-neutral metadata model of step methods.
//!
//! The scanner turns each `#[build_step]` method into a [`StepModel`]: what
//! every parameter injects, what the return value produces, and the step's
//! recording phase and capabilities. Emission works from this model only.

use std::collections::BTreeMap;
use std::path::PathBuf;

use quote::ToTokens;
use serde::Serialize;
use syn::{GenericArgument, PathArguments, Type, TypePath};

use crate::codegen::errors::StepIssue;
use crate::core::item::Cardinality;
use crate::core::recorder::ExecutionTime;

/// An item type as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemType {
    /// Path as written, e.g. `Config` or `items::Config`
    pub path: String,
    pub cardinality: Cardinality,
}

/// How a simple item is handed to the step method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// `&T`
    Ref,
    /// `Arc<T>`
    Arc,
}

/// What a step parameter injects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Injection {
    /// `&T`, `Arc<T>`, `Option<&T>`, `Option<Arc<T>>`
    Simple {
        item: ItemType,
        optional: bool,
        pass: Pass,
    },
    /// `Vec<Arc<T>>`, `Option<Vec<Arc<T>>>`
    Multi { item: ItemType, optional: bool },
    /// `&mut BuildProducer<T>`
    Producer { item: ItemType },
    /// `&mut Recorder`
    Recorder,
    /// `&ThreadPool`
    Executor,
}

impl Injection {
    /// The item this injection consumes, with whether it is optional.
    pub fn consumed(&self) -> Option<(&ItemType, bool)> {
        match self {
            Injection::Simple { item, optional, .. } | Injection::Multi { item, optional } => {
                Some((item, *optional))
            }
            _ => None,
        }
    }
}

/// What a step's return value produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "item", rename_all = "snake_case")]
pub enum Output {
    /// `()` or no return type
    Unit,
    /// `T`
    Item(ItemType),
    /// `Option<T>`
    Optional(ItemType),
    /// `Vec<T>` of a multi item
    List(ItemType),
}

impl Output {
    pub fn item(&self) -> Option<&ItemType> {
        match self {
            Output::Unit => None,
            Output::Item(item) | Output::Optional(item) | Output::List(item) => Some(item),
        }
    }
}

/// One analysed step method.
#[derive(Debug, Clone, Serialize)]
pub struct StepModel {
    pub owner: String,
    pub method: String,
    pub injections: Vec<Injection>,
    pub output: Output,
    /// Whether the method returns `Result<_>`
    pub fallible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<ExecutionTime>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    /// Items from `#[produce(...)]`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub declared_produces: Vec<ItemType>,
    /// Items from `#[produce_weak(...)]`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub declared_weak_produces: Vec<ItemType>,
    /// Items from `#[consume(...)]`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub declared_consumes: Vec<ItemType>,
    pub location: String,
}

impl StepModel {
    /// Whether running this step can ever produce anything.
    pub fn can_produce(&self) -> bool {
        self.output != Output::Unit
            || self.recording.is_some()
            || !self.capabilities.is_empty()
            || !self.declared_produces.is_empty()
            || !self.declared_weak_produces.is_empty()
            || self
                .injections
                .iter()
                .any(|i| matches!(i, Injection::Producer { .. }))
    }

    pub fn uses_recorder(&self) -> bool {
        self.injections.contains(&Injection::Recorder)
    }
}

/// A type owning step methods, with its steps.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerModel {
    pub name: String,
    pub steps: Vec<StepModel>,
}

/// The step owners of one source module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleModel {
    /// Module path relative to the crate root, empty for the root
    pub module: String,
    pub file: PathBuf,
    pub owners: Vec<OwnerModel>,
}

impl ModuleModel {
    pub fn step_count(&self) -> usize {
        self.owners.iter().map(|o| o.steps.len()).sum()
    }
}

/// Known build item types, keyed by type name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemIndex {
    items: BTreeMap<String, Cardinality>,
}

impl ItemIndex {
    /// An index holding the items every chain knows about.
    pub fn with_builtins() -> Self {
        let mut index = ItemIndex::default();
        index.insert("CapabilityItem", Cardinality::Multi);
        index.insert("StaticRecorderItem", Cardinality::Multi);
        index.insert("MainRecorderItem", Cardinality::Multi);
        index
    }

    /// Record an item type. The first declaration of a name wins.
    pub fn insert(&mut self, name: impl Into<String>, cardinality: Cardinality) {
        let name = name.into();
        match self.items.get(&name) {
            Some(existing) if *existing != cardinality => {
                tracing::warn!(
                    "Item `{}` declared as both {} and {}; keeping {}",
                    name,
                    existing,
                    cardinality,
                    existing
                );
            }
            Some(_) => {}
            None => {
                self.items.insert(name, cardinality);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Cardinality> {
        self.items.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Cardinality)> {
        self.items.iter().map(|(name, c)| (name.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve a type written in a signature to a known item.
    fn resolve(&self, ty: &Type) -> Result<ItemType, StepIssue> {
        let Type::Path(path) = ty else {
            return Err(StepIssue::UnknownItem(type_string(ty)));
        };
        let Some(last) = path.path.segments.last() else {
            return Err(StepIssue::UnknownItem(type_string(ty)));
        };
        match self.get(&last.ident.to_string()) {
            Some(cardinality) => Ok(ItemType {
                path: type_string(ty),
                cardinality,
            }),
            None => Err(StepIssue::UnknownItem(type_string(ty))),
        }
    }

    fn resolve_simple(&self, ty: &Type, usage: &'static str) -> Result<ItemType, StepIssue> {
        let item = self.resolve(ty)?;
        expect_cardinality(item, Cardinality::Simple, usage)
    }

    fn resolve_multi(&self, ty: &Type, usage: &'static str) -> Result<ItemType, StepIssue> {
        let item = self.resolve(ty)?;
        expect_cardinality(item, Cardinality::Multi, usage)
    }

    /// Classify a step method parameter.
    pub fn analyze_param(&self, ty: &Type) -> Result<Injection, StepIssue> {
        match ty {
            Type::Reference(r) if r.mutability.is_some() => {
                if let Some(inner) = generic_arg(&r.elem, "BuildProducer") {
                    return Ok(Injection::Producer {
                        item: self.resolve(inner)?,
                    });
                }
                if is_named(&r.elem, "Recorder") {
                    return Ok(Injection::Recorder);
                }
                Err(StepIssue::UnsupportedParameter(type_string(ty)))
            }
            Type::Reference(r) => {
                if is_named(&r.elem, "ThreadPool") {
                    return Ok(Injection::Executor);
                }
                Ok(Injection::Simple {
                    item: self.resolve_simple(&r.elem, "consumed as a reference")?,
                    optional: false,
                    pass: Pass::Ref,
                })
            }
            Type::Path(_) => {
                if let Some(inner) = generic_arg(ty, "Arc") {
                    return Ok(Injection::Simple {
                        item: self.resolve_simple(inner, "consumed as `Arc<T>`")?,
                        optional: false,
                        pass: Pass::Arc,
                    });
                }
                if let Some(inner) = generic_arg(ty, "Vec") {
                    return Ok(Injection::Multi {
                        item: self.analyze_list(ty, inner)?,
                        optional: false,
                    });
                }
                if let Some(inner) = generic_arg(ty, "Option") {
                    return self.analyze_optional(ty, inner);
                }
                match self.resolve(ty) {
                    Ok(_) => Err(StepIssue::UnsupportedParameter(format!(
                        "{} (consume items as `&{}` or `Arc<{}>`)",
                        type_string(ty),
                        type_string(ty),
                        type_string(ty)
                    ))),
                    Err(_) => Err(StepIssue::UnsupportedParameter(type_string(ty))),
                }
            }
            _ => Err(StepIssue::UnsupportedParameter(type_string(ty))),
        }
    }

    fn analyze_optional(&self, outer: &Type, inner: &Type) -> Result<Injection, StepIssue> {
        match inner {
            Type::Reference(r) if r.mutability.is_none() => Ok(Injection::Simple {
                item: self.resolve_simple(&r.elem, "consumed as `Option<&T>`")?,
                optional: true,
                pass: Pass::Ref,
            }),
            _ => {
                if let Some(item) = generic_arg(inner, "Arc") {
                    return Ok(Injection::Simple {
                        item: self.resolve_simple(item, "consumed as `Option<Arc<T>>`")?,
                        optional: true,
                        pass: Pass::Arc,
                    });
                }
                if let Some(item) = generic_arg(inner, "Vec") {
                    return Ok(Injection::Multi {
                        item: self.analyze_list(inner, item)?,
                        optional: true,
                    });
                }
                Err(StepIssue::UnsupportedParameter(type_string(outer)))
            }
        }
    }

    /// `Vec<Arc<T>>` with `T` multi.
    fn analyze_list(&self, outer: &Type, inner: &Type) -> Result<ItemType, StepIssue> {
        match generic_arg(inner, "Arc") {
            Some(item) => self.resolve_multi(item, "consumed as a list"),
            None => Err(StepIssue::UnsupportedParameter(format!(
                "{} (lists of items are injected as `Vec<Arc<T>>`)",
                type_string(outer)
            ))),
        }
    }

    /// Classify a step method return type. Returns the output and whether the
    /// method is fallible.
    pub fn analyze_return(&self, ty: Option<&Type>) -> Result<(Output, bool), StepIssue> {
        let Some(ty) = ty else {
            return Ok((Output::Unit, false));
        };
        if let Some(inner) = generic_arg(ty, "Result") {
            return Ok((self.analyze_output(inner)?, true));
        }
        Ok((self.analyze_output(ty)?, false))
    }

    fn analyze_output(&self, ty: &Type) -> Result<Output, StepIssue> {
        if is_unit(ty) {
            return Ok(Output::Unit);
        }
        if is_primitive(ty) {
            return Err(StepIssue::PrimitiveReturn(type_string(ty)));
        }
        if let Some(inner) = generic_arg(ty, "Option") {
            return Ok(Output::Optional(self.resolve(inner)?));
        }
        if let Some(inner) = generic_arg(ty, "Vec") {
            return Ok(Output::List(self.resolve_multi(inner, "returned as a list")?));
        }
        if matches!(ty, Type::Path(_)) {
            return Ok(Output::Item(self.resolve(ty)?));
        }
        Err(StepIssue::UnsupportedReturn(type_string(ty)))
    }

    /// Resolve an item named in a `#[produce(...)]`-style attribute.
    pub fn resolve_path(&self, path: &syn::Path) -> Result<ItemType, StepIssue> {
        let ty = Type::Path(TypePath {
            qself: None,
            path: path.clone(),
        });
        self.resolve(&ty)
    }
}

fn expect_cardinality(
    item: ItemType,
    expected: Cardinality,
    usage: &'static str,
) -> Result<ItemType, StepIssue> {
    if item.cardinality == expected {
        Ok(item)
    } else {
        Err(StepIssue::CardinalityMismatch {
            cardinality: item.cardinality,
            item: item.path,
            usage,
        })
    }
}

/// Render a type the way it is written, without token spacing.
pub(crate) fn type_string(ty: &Type) -> String {
    let raw = ty.to_token_stream().to_string();
    let mut out = String::with_capacity(raw.len());
    for token in raw.split_whitespace() {
        let glue = matches!(out.chars().last(), Some('&' | '<' | ':' | ' '))
            || token.starts_with(|c: char| matches!(c, '<' | '>' | ':' | ','));
        if !out.is_empty() && !glue {
            out.push(' ');
        }
        out.push_str(token);
        if token == "," {
            out.push(' ');
        }
    }
    out.replace("& mut", "&mut")
}

/// The single generic argument of `ty` when its last segment is `name`.
fn generic_arg<'a>(ty: &'a Type, name: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != name {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

fn is_named(ty: &Type, name: &str) -> bool {
    matches!(ty, Type::Path(path) if path.path.segments.last().is_some_and(|s| s.ident == name))
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64",
    "u128", "usize", "f32", "f64",
];

fn is_primitive(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .get_ident()
            .is_some_and(|ident| PRIMITIVES.iter().any(|p| ident == *p)),
        Type::Reference(r) => is_primitive(&r.elem),
        _ => false,
    }
}
