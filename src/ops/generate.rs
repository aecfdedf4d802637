//! `buildchain generate`: registration code for a source tree.

use std::fmt::Write;

use anyhow::Result;

use crate::codegen::{self, GenerateOptions, GenerationReport};
use crate::util::config::ChainConfig;

/// Generate registration code, with item declarations and the listing
/// location filled in from `config` where `options` leaves them open.
pub fn generate_sources(options: GenerateOptions, config: &ChainConfig) -> Result<GenerationReport> {
    let mut options = options;
    for (name, cardinality) in &config.codegen.items {
        options = options.with_item(name.clone(), *cardinality);
    }
    if options.listing.is_none() {
        options.listing = config.codegen.listing.clone();
    }
    codegen::generate(&options)
}

/// Human-readable summary of a generation run.
pub fn format_report(report: &GenerationReport, verbose: bool) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Generated {} build step(s) in {} file(s) ({} changed)",
        report.steps,
        report.files.len(),
        report.written
    );
    if verbose {
        for file in &report.files {
            let _ = writeln!(output, "  {}", file.display());
        }
        for provider in &report.providers {
            let _ = writeln!(output, "  provider {}", provider);
        }
    }
    let _ = writeln!(
        output,
        "Listed {} provider(s) in {}",
        report.listed,
        report.listing.display()
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Cardinality;
    use crate::test_support::{SourceTreeFixture, ITEMS_SOURCE};
    use tempfile::TempDir;

    const EXTERNAL_STEPS: &str = r#"
        use buildchain::build_step;

        #[derive(Default)]
        pub struct Steps;

        impl Steps {
            #[build_step]
            pub fn port(&self, config: &ExternalConfig) -> AppConfig {
                AppConfig { port: config.port }
            }
        }
    "#;

    #[test]
    fn test_config_items_and_listing() {
        let tmp = TempDir::new().unwrap();
        let src = SourceTreeFixture::new()
            .with_file("lib.rs", ITEMS_SOURCE.replace("pub mod web;", ""))
            .with_file("steps.rs", EXTERNAL_STEPS)
            .write(tmp.path());

        let mut config = ChainConfig::default();
        config
            .codegen
            .items
            .insert("ExternalConfig".to_string(), Cardinality::Simple);
        config.codegen.listing = Some(tmp.path().join("providers.list"));

        let report =
            generate_sources(GenerateOptions::new(&src, tmp.path().join("gen")), &config).unwrap();
        assert_eq!(report.steps, 1);
        assert_eq!(report.listing, tmp.path().join("providers.list"));

        let summary = format_report(&report, true);
        assert!(summary.contains("Generated 1 build step(s) in 1 file(s)"));
        assert!(summary.contains("provider crate::steps::StepsBuildProvider"));
    }

    #[test]
    fn test_unknown_external_item_fails() {
        let tmp = TempDir::new().unwrap();
        let src = SourceTreeFixture::new()
            .with_file("lib.rs", ITEMS_SOURCE.replace("pub mod web;", ""))
            .with_file("steps.rs", EXTERNAL_STEPS)
            .write(tmp.path());

        let result = generate_sources(
            GenerateOptions::new(&src, tmp.path().join("gen")),
            &ChainConfig::default(),
        );
        assert!(result.is_err());
    }
}
