//! Source scanning: item declarations and step methods.
//!
//! Scanning runs in two passes over the parsed files. The first collects
//! every `impl BuildItem for X` into the [`ItemIndex`]; the second analyses
//! the `#[build_step]` methods of inherent `impl` blocks against that index.
//! Step owners are only recognised at the top level of a file module, since
//! generated code is included at that level.

use std::path::{Path, PathBuf};

use syn::visit::{self, Visit};
use syn::{Attribute, FnArg, ImplItem, ImplItemFn, Item, ItemImpl, LitStr, Meta, Type, Visibility};

use crate::codegen::emit::GENERATED_HEADER;
use crate::codegen::errors::{RegistrationError, StepIssue};
use crate::codegen::model::{Injection, ItemIndex, ItemType, ModuleModel, OwnerModel, StepModel};
use crate::core::item::Cardinality;
use crate::core::recorder::ExecutionTime;
use crate::util::diagnostic::Diagnostic;
use crate::util::fs;

/// A parsed source file.
pub struct SourceFile {
    pub path: PathBuf,
    /// Module path relative to the crate root, empty for the root
    pub module: String,
    pub syntax: syn::File,
}

/// Everything a scan found.
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub items: ItemIndex,
    pub modules: Vec<ModuleModel>,
    pub errors: Vec<RegistrationError>,
    pub warnings: Vec<Diagnostic>,
}

impl ScanOutput {
    pub fn step_count(&self) -> usize {
        self.modules.iter().map(ModuleModel::step_count).sum()
    }

    /// Every analysed step, in module order.
    pub fn steps(&self) -> impl Iterator<Item = &StepModel> {
        self.modules
            .iter()
            .flat_map(|m| m.owners.iter())
            .flat_map(|o| o.steps.iter())
    }
}

/// Scan every Rust file below `root`.
///
/// `items` pre-seeds the item index, for items declared in other crates.
pub fn scan_dir(root: &Path, items: ItemIndex) -> anyhow::Result<ScanOutput> {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    let mut skipped = Vec::new();

    let sources = fs::rust_sources(root)?;
    if sources.is_empty() {
        anyhow::bail!("no Rust sources found under {}", root.display());
    }
    let has_lib = root.join("lib.rs").is_file();
    for path in sources {
        let source = fs::read_to_string(&path)?;
        if is_binary_source(root, &path, has_lib) {
            tracing::debug!("Skipping binary crate source {}", path.display());
            if source.contains("#[build_step") {
                skipped.push(path);
            }
            continue;
        }
        if source.starts_with(GENERATED_HEADER) {
            continue;
        }
        let module = module_path(root, &path);
        match parse_source(&path, &source, module) {
            Ok(file) => files.push(file),
            Err(e) => errors.push(e),
        }
    }
    tracing::debug!("Parsed {} source file(s) under {}", files.len(), root.display());

    let mut output = scan_files(&files, items);
    errors.append(&mut output.errors);
    output.errors = errors;
    for path in skipped {
        output.warnings.push(
            Diagnostic::warning(format!(
                "build steps in {} are not registered: it belongs to a binary crate",
                path.display()
            ))
            .with_suggestion("Move the step owner into the library crate"),
        );
    }
    Ok(output)
}

/// Whether `path` belongs to a binary crate rather than the crate rooted at
/// `root`: everything under `bin/`, and `main.rs` next to a `lib.rs`.
pub fn is_binary_source(root: &Path, path: &Path, has_lib: bool) -> bool {
    let relative = fs::relative_path(root, path);
    let mut components = relative.components().map(|c| c.as_os_str());
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first == "bin",
        (Some(only), None) => has_lib && only == "main.rs",
        _ => false,
    }
}

/// Parse one file.
pub fn parse_source(
    path: &Path,
    source: &str,
    module: String,
) -> Result<SourceFile, RegistrationError> {
    match syn::parse_file(source) {
        Ok(syntax) => Ok(SourceFile {
            path: path.to_path_buf(),
            module,
            syntax,
        }),
        Err(e) => {
            let start = e.span().start();
            Err(RegistrationError::Parse {
                path: path.to_path_buf(),
                line: start.line,
                column: start.column + 1,
                message: e.to_string(),
            })
        }
    }
}

/// Analyse parsed files.
pub fn scan_files(files: &[SourceFile], mut items: ItemIndex) -> ScanOutput {
    for file in files {
        let mut collector = ItemCollector { items: &mut items };
        collector.visit_file(&file.syntax);
    }

    let mut output = ScanOutput::default();
    for file in files {
        let mut owners: Vec<OwnerModel> = Vec::new();
        for item in &file.syntax.items {
            let Item::Impl(block) = item else {
                continue;
            };
            if block.trait_.is_some() {
                continue;
            }
            let Some(owner) = owner_name(&block.self_ty) else {
                continue;
            };
            for method in step_methods(block) {
                let location = method_location(&file.path, method);
                let analysed = if block.generics.params.is_empty() {
                    analyze_step(&items, &owner, method, location.clone())
                } else {
                    Err(StepIssue::GenericOwner(owner.clone()))
                };
                match analysed {
                    Ok(step) => {
                        if !step.can_produce() {
                            output.warnings.push(
                                Diagnostic::warning(format!(
                                    "build step `{}::{}` can produce nothing and will never run",
                                    owner, step.method
                                ))
                                .with_location(location.clone()),
                            );
                        }
                        match owners.iter_mut().find(|o| o.name == owner) {
                            Some(existing) => existing.steps.push(step),
                            None => owners.push(OwnerModel {
                                name: owner.clone(),
                                steps: vec![step],
                            }),
                        }
                    }
                    Err(issue) => output.errors.push(RegistrationError::Step {
                        owner: owner.clone(),
                        method: method.sig.ident.to_string(),
                        location,
                        issue,
                    }),
                }
            }
        }
        if owners.is_empty() {
            continue;
        }
        if let Some(existing) = output.modules.iter().find(|m| m.module == file.module) {
            output.errors.push(RegistrationError::ModuleConflict {
                module: file.module.clone(),
                first: existing.file.clone(),
                second: file.path.clone(),
            });
        } else {
            output.modules.push(ModuleModel {
                module: file.module.clone(),
                file: file.path.clone(),
                owners,
            });
        }
    }

    output.items = items;
    output
}

/// Collects `impl BuildItem for X { type Kind = ...; }` anywhere in a file.
struct ItemCollector<'a> {
    items: &'a mut ItemIndex,
}

impl<'ast> Visit<'ast> for ItemCollector<'_> {
    fn visit_item_impl(&mut self, block: &'ast ItemImpl) {
        if let Some((_, path, _)) = &block.trait_ {
            let is_build_item = path
                .segments
                .last()
                .is_some_and(|s| s.ident == "BuildItem");
            if is_build_item {
                if let (Some(name), Some(cardinality)) =
                    (owner_name(&block.self_ty), item_kind(block))
                {
                    self.items.insert(name, cardinality);
                }
            }
        }
        visit::visit_item_impl(self, block);
    }
}

fn item_kind(block: &ItemImpl) -> Option<Cardinality> {
    block.items.iter().find_map(|item| match item {
        ImplItem::Type(assoc) if assoc.ident == "Kind" => match &assoc.ty {
            Type::Path(path) => {
                let kind = path.path.segments.last()?;
                if kind.ident == "Simple" {
                    Some(Cardinality::Simple)
                } else if kind.ident == "Multi" {
                    Some(Cardinality::Multi)
                } else {
                    None
                }
            }
            _ => None,
        },
        _ => None,
    })
}

fn owner_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) if path.qself.is_none() => {
            path.path.segments.last().map(|s| s.ident.to_string())
        }
        _ => None,
    }
}

fn step_methods(block: &ItemImpl) -> impl Iterator<Item = &ImplItemFn> {
    block.items.iter().filter_map(|item| match item {
        ImplItem::Fn(method) if has_attr(&method.attrs, "build_step") => Some(method),
        _ => None,
    })
}

fn attr_name(attr: &Attribute) -> Option<String> {
    attr.path().segments.last().map(|s| s.ident.to_string())
}

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|a| attr_name(a).as_deref() == Some(name))
}

fn method_location(path: &Path, method: &ImplItemFn) -> String {
    format!("{}:{}", path.display(), method.sig.ident.span().start().line)
}

fn analyze_step(
    items: &ItemIndex,
    owner: &str,
    method: &ImplItemFn,
    location: String,
) -> Result<StepModel, StepIssue> {
    let sig = &method.sig;
    if matches!(method.vis, Visibility::Inherited) {
        return Err(StepIssue::NotPublic);
    }
    if !sig.generics.params.is_empty() {
        return Err(StepIssue::Generic);
    }
    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => return Err(StepIssue::InvalidReceiver),
    }

    let mut injections = Vec::new();
    for input in sig.inputs.iter().skip(1) {
        match input {
            FnArg::Typed(arg) => injections.push(items.analyze_param(&arg.ty)?),
            FnArg::Receiver(_) => return Err(StepIssue::InvalidReceiver),
        }
    }

    let output_ty = match &sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => Some(ty.as_ref()),
    };
    let (output, fallible) = items.analyze_return(output_ty)?;

    let mut capabilities = Vec::new();
    let mut recording = None;
    let mut declared_produces = Vec::new();
    let mut declared_weak_produces = Vec::new();
    let mut declared_consumes = Vec::new();
    for attr in &method.attrs {
        match attr_name(attr).as_deref() {
            Some("build_step") => capabilities.extend(step_capabilities(attr)?),
            Some("record") => {
                if recording.is_some() {
                    return Err(StepIssue::InvalidAttribute(
                        "`#[record]` may only appear once".to_string(),
                    ));
                }
                recording = Some(record_phase(attr)?);
            }
            Some("produce") => declared_produces.extend(attr_items(items, attr)?),
            Some("produce_weak") => declared_weak_produces.extend(attr_items(items, attr)?),
            Some("consume") => declared_consumes.extend(attr_items(items, attr)?),
            _ => {}
        }
    }

    let has_recorder = injections.contains(&Injection::Recorder);
    match (recording.is_some(), has_recorder) {
        (true, false) => return Err(StepIssue::RecordWithoutRecorder),
        (false, true) => return Err(StepIssue::RecorderWithoutRecord),
        _ => {}
    }
    if injections.iter().filter(|i| **i == Injection::Recorder).count() > 1 {
        return Err(StepIssue::InvalidAttribute(
            "a step takes at most one `&mut Recorder`".to_string(),
        ));
    }

    Ok(StepModel {
        owner: owner.to_string(),
        method: sig.ident.to_string(),
        injections,
        output,
        fallible,
        recording,
        capabilities,
        declared_produces,
        declared_weak_produces,
        declared_consumes,
        location,
    })
}

fn step_capabilities(attr: &Attribute) -> Result<Vec<String>, StepIssue> {
    let mut capabilities = Vec::new();
    if !matches!(attr.meta, Meta::List(_)) {
        return Ok(capabilities);
    }
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("capability") {
            let name: LitStr = meta.value()?.parse()?;
            capabilities.push(name.value());
            Ok(())
        } else {
            Err(meta.error("unsupported build_step argument"))
        }
    })
    .map_err(|e| StepIssue::InvalidAttribute(e.to_string()))?;
    Ok(capabilities)
}

fn record_phase(attr: &Attribute) -> Result<ExecutionTime, StepIssue> {
    let phase: syn::Ident = attr.parse_args().map_err(|_| {
        StepIssue::InvalidAttribute(
            "expected `#[record(static_init)]` or `#[record(runtime_init)]`".to_string(),
        )
    })?;
    ExecutionTime::from_attr(&phase.to_string()).ok_or_else(|| {
        StepIssue::InvalidAttribute(format!("unknown execution time `{}`", phase))
    })
}

fn attr_items(items: &ItemIndex, attr: &Attribute) -> Result<Vec<ItemType>, StepIssue> {
    let paths = attr
        .parse_args_with(
            syn::punctuated::Punctuated::<syn::Path, syn::Token![,]>::parse_terminated,
        )
        .map_err(|e| StepIssue::InvalidAttribute(e.to_string()))?;
    paths.iter().map(|path| items.resolve_path(path)).collect()
}

/// Module path of a file relative to the source root: `lib.rs` and `main.rs`
/// are the root, `a/mod.rs` is `a`, `a/b.rs` is `a::b`.
pub fn module_path(root: &Path, file: &Path) -> String {
    let relative = fs::relative_path(root, file);
    let mut segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(last) = segments.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        let is_root = segments.is_empty() && (stem == "lib" || stem == "main");
        if stem != "mod" && !is_root {
            segments.push(stem);
        }
    }
    segments.join("::")
}
