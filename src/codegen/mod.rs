//! Registration code generation.
//!
//! Build steps are plain methods on a step owner type, marked with
//! `#[build_step]`. The generator reads them from source and writes the code
//! that registers them, so no runtime reflection is involved:
//!
//! ```text
//! src/**/*.rs --scan--> ModuleModel --emit--> <module>.steps.rs
//!                                        \--> build-providers.list --> providers.rs
//! ```
//!
//! It runs from a `build.rs` ([`generate_for_build_script`]) or through
//! `buildchain generate`.

pub mod emit;
pub mod errors;
pub mod listing;
pub mod model;
pub mod scan;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::item::Cardinality;
use crate::util::diagnostic::Diagnostic;
use crate::util::fs;

pub use errors::{RegistrationError, RegistrationErrors, StepIssue};
pub use model::{ItemIndex, ModuleModel, OwnerModel, StepModel};
pub use scan::ScanOutput;

/// Options for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Source root to scan
    pub src: PathBuf,
    /// Directory the generated files go to
    pub out: PathBuf,
    /// Provider listing (default: `<out>/build-providers.list`)
    pub listing: Option<PathBuf>,
    /// Items declared outside `src`
    pub items: Vec<(String, Cardinality)>,
}

impl GenerateOptions {
    pub fn new(src: impl Into<PathBuf>, out: impl Into<PathBuf>) -> Self {
        GenerateOptions {
            src: src.into(),
            out: out.into(),
            listing: None,
            items: Vec::new(),
        }
    }

    pub fn with_listing(mut self, listing: impl Into<PathBuf>) -> Self {
        self.listing = Some(listing.into());
        self
    }

    /// Declare an item type defined in another crate.
    pub fn with_item(mut self, name: impl Into<String>, cardinality: Cardinality) -> Self {
        self.items.push((name.into(), cardinality));
        self
    }

    pub fn listing_path(&self) -> PathBuf {
        self.listing
            .clone()
            .unwrap_or_else(|| self.out.join(listing::LISTING_FILE_NAME))
    }

    fn item_index(&self) -> ItemIndex {
        let mut index = ItemIndex::with_builtins();
        for (name, cardinality) in &self.items {
            index.insert(name.clone(), *cardinality);
        }
        index
    }
}

/// What a generation run wrote.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Generated module files, written or already up to date
    pub files: Vec<PathBuf>,
    /// How many files actually changed
    pub written: usize,
    pub steps: usize,
    /// Providers generated by this run
    pub providers: Vec<String>,
    /// Full provider set after merging the listing
    pub listed: usize,
    pub listing: PathBuf,
    pub registry: PathBuf,
    pub warnings: Vec<Diagnostic>,
}

/// Scan `options.src`, then write the registration code and merge the
/// listing.
///
/// Registration errors abort the run before anything is written; they are
/// returned together as [`RegistrationErrors`].
pub fn generate(options: &GenerateOptions) -> Result<GenerationReport> {
    let output = scan::scan_dir(&options.src, options.item_index())?;
    if !output.errors.is_empty() {
        return Err(RegistrationErrors(output.errors).into());
    }
    for warning in &output.warnings {
        tracing::warn!("{}", warning.message);
    }

    fs::ensure_dir(&options.out)?;
    let mut report = GenerationReport {
        steps: output.step_count(),
        listing: options.listing_path(),
        registry: options.out.join(listing::REGISTRY_FILE_NAME),
        warnings: output.warnings.clone(),
        ..GenerationReport::default()
    };

    for module in &output.modules {
        let contents = emit::render_module(module)?;
        let path = options.out.join(emit::module_file_name(&module.module));
        if fs::write_if_changed(&path, &contents)? {
            tracing::debug!("Wrote {}", path.display());
            report.written += 1;
        }
        report.files.push(path);
        report.providers.extend(
            module
                .owners
                .iter()
                .map(|owner| emit::provider_path(&module.module, &owner.name)),
        );
    }

    let merged = listing::merge_listing(&report.listing, &report.providers)?;
    report.listed = merged.len();
    if fs::write_if_changed(&report.registry, &listing::render_registry(&merged)?)? {
        report.written += 1;
    }

    tracing::info!(
        "Generated {} step(s) in {} module(s), {} provider(s) listed",
        report.steps,
        report.files.len(),
        report.listed
    );
    Ok(report)
}

/// Run the generator from a build script: scans `<manifest dir>/src` and
/// writes to `OUT_DIR`.
///
/// Include the results with
/// `include!(concat!(env!("OUT_DIR"), "/<module>.steps.rs"));` in each step
/// module and `include!(concat!(env!("OUT_DIR"), "/providers.rs"));` once.
pub fn generate_for_build_script() -> Result<GenerationReport> {
    let manifest_dir = std::env::var_os("CARGO_MANIFEST_DIR")
        .context("CARGO_MANIFEST_DIR is not set; call this from a build script")?;
    let out_dir =
        std::env::var_os("OUT_DIR").context("OUT_DIR is not set; call this from a build script")?;
    let src = Path::new(&manifest_dir).join("src");

    let report = generate(&GenerateOptions::new(&src, out_dir))?;
    println!("cargo:rerun-if-changed={}", src.display());
    for warning in &report.warnings {
        println!("cargo:warning={}", warning.message);
    }
    Ok(report)
}
