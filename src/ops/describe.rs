//! `buildchain describe`: the metadata model of a source tree.
//!
//! Shows how every step method was analysed (what it consumes and produces,
//! its phase and capabilities) without writing anything. Registration errors
//! are part of the description rather than a failure.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::codegen::emit;
use crate::codegen::model::{Injection, ItemIndex, ItemType, StepModel};
use crate::codegen::scan;
use crate::core::item::Cardinality;
use crate::util::config::ChainConfig;

/// Everything `describe` reports.
#[derive(Debug, Serialize)]
pub struct Description {
    pub src: PathBuf,
    pub items: Vec<ItemEntry>,
    pub steps: Vec<StepEntry>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemEntry {
    pub name: String,
    pub cardinality: Cardinality,
}

/// One analysed step.
#[derive(Debug, Serialize)]
pub struct StepEntry {
    pub id: String,
    pub provider: String,
    #[serde(flatten)]
    pub model: StepModel,
}

impl StepEntry {
    /// Every item the step consumes, with whether it is optional.
    pub fn consumes(&self) -> Vec<(&ItemType, bool)> {
        self.model
            .injections
            .iter()
            .filter_map(Injection::consumed)
            .chain(self.model.declared_consumes.iter().map(|item| (item, false)))
            .collect()
    }

    /// Every item the step produces, with whether it is weak.
    pub fn produces(&self) -> Vec<(&ItemType, bool)> {
        let mut produced: Vec<(&ItemType, bool)> = self
            .model
            .injections
            .iter()
            .filter_map(|i| match i {
                Injection::Producer { item } => Some((item, false)),
                _ => None,
            })
            .collect();
        produced.extend(self.model.output.item().map(|item| (item, false)));
        produced.extend(self.model.declared_produces.iter().map(|item| (item, false)));
        produced.extend(self.model.declared_weak_produces.iter().map(|item| (item, true)));
        produced
    }
}

impl Description {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Scan `src` and describe what the generator would see.
pub fn describe(src: &Path, config: &ChainConfig) -> Result<Description> {
    let mut index = ItemIndex::with_builtins();
    for (name, cardinality) in &config.codegen.items {
        index.insert(name.clone(), *cardinality);
    }

    let output = scan::scan_dir(src, index)?;

    let mut items: Vec<ItemEntry> = output
        .items
        .iter()
        .map(|(name, cardinality)| ItemEntry {
            name: name.to_string(),
            cardinality,
        })
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));

    let mut steps = Vec::new();
    for module in &output.modules {
        for owner in &module.owners {
            for step in &owner.steps {
                steps.push(StepEntry {
                    id: emit::step_id(&module.module, step),
                    provider: emit::provider_path(&module.module, &owner.name),
                    model: step.clone(),
                });
            }
        }
    }

    Ok(Description {
        src: src.to_path_buf(),
        items,
        steps,
        errors: output.errors.iter().map(ToString::to_string).collect(),
        warnings: output.warnings.iter().map(|w| w.message.clone()).collect(),
    })
}

/// Plain-text rendering of a description.
pub fn format_description(description: &Description) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Items ({}):", description.items.len());
    for item in &description.items {
        let _ = writeln!(output, "  {} ({})", item.name, item.cardinality);
    }

    let _ = writeln!(output, "\nSteps ({}):", description.steps.len());
    for step in &description.steps {
        let _ = writeln!(output, "  {}  [{}]", step.id, step.model.location);
        for (item, optional) in step.consumes() {
            let qualifier = if optional { ", optional" } else { "" };
            let _ = writeln!(
                output,
                "    consumes {} ({}{})",
                item.path, item.cardinality, qualifier
            );
        }
        for (item, weak) in step.produces() {
            let qualifier = if weak { ", weak" } else { "" };
            let _ = writeln!(
                output,
                "    produces {} ({}{})",
                item.path, item.cardinality, qualifier
            );
        }
        if let Some(phase) = step.model.recording {
            let _ = writeln!(output, "    records {:?}", phase);
        }
        for capability in &step.model.capabilities {
            let _ = writeln!(output, "    capability {}", capability);
        }
    }

    if !description.warnings.is_empty() {
        let _ = writeln!(output, "\nWarnings:");
        for warning in &description.warnings {
            let _ = writeln!(output, "  {}", warning);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_step_crate, SourceTreeFixture};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_describe_step_crate() {
        let tmp = TempDir::new().unwrap();
        let src = write_step_crate(tmp.path());

        let description = describe(&src, &ChainConfig::default()).unwrap();
        assert!(!description.has_errors());

        let ids: Vec<&str> = description.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["web::WebSteps::health_route", "web::WebSteps::router"]);

        let router = &description.steps[1];
        let consumed: Vec<&str> = router.consumes().iter().map(|(i, _)| i.path.as_str()).collect();
        assert_eq!(consumed, vec!["AppConfig", "Route"]);
        assert_eq!(router.produces()[0].0.path, "Router");

        let text = format_description(&description);
        assert!(text.contains("  Route (multi)"));
        assert!(text.contains("    produces Route (multi)"));
        assert!(text.contains("    capability web"));

        let json: serde_json::Value = serde_json::from_str(&description.to_json().unwrap()).unwrap();
        assert_eq!(json["steps"][1]["provider"], "crate::web::WebStepsBuildProvider");
        assert_eq!(json["steps"][1]["method"], "router");
    }

    #[test]
    fn test_describe_keeps_errors() {
        let tmp = TempDir::new().unwrap();
        let src = SourceTreeFixture::new()
            .with_file(
                "lib.rs",
                r#"
                pub struct Steps;
                impl Steps {
                    #[build_step]
                    pub fn broken(&self, value: &Unknown) {}
                }
                "#,
            )
            .write(tmp.path());

        let description = describe(&src, &ChainConfig::default()).unwrap();
        assert!(description.has_errors());
        assert!(description.errors[0].contains("`Unknown` is not a known build item"));
    }
}
