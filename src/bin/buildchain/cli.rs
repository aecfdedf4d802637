//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use buildchain::Cardinality;

/// buildchain - generate and inspect build step registrations
#[derive(Parser)]
#[command(name = "buildchain")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate registration code for the build steps under a source root
    Generate(GenerateArgs),

    /// Show how every build step under a source root is analysed
    Describe(DescribeArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Source root to scan
    #[arg(long, default_value = "src")]
    pub src: PathBuf,

    /// Directory to write generated files to
    #[arg(long)]
    pub out: PathBuf,

    /// Provider listing to merge into
    #[arg(long)]
    pub listing: Option<PathBuf>,

    /// Item declared in another crate, as NAME=simple or NAME=multi
    #[arg(long = "item", value_parser = parse_item)]
    pub items: Vec<(String, Cardinality)>,
}

#[derive(Args)]
pub struct DescribeArgs {
    /// Source root to scan
    #[arg(long, default_value = "src")]
    pub src: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Item declared in another crate, as NAME=simple or NAME=multi
    #[arg(long = "item", value_parser = parse_item)]
    pub items: Vec<(String, Cardinality)>,
}

fn parse_item(s: &str) -> Result<(String, Cardinality), String> {
    let (name, kind) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=simple or NAME=multi, got `{}`", s))?;
    let cardinality = match kind.trim() {
        "simple" => Cardinality::Simple,
        "multi" => Cardinality::Multi,
        other => return Err(format!("unknown cardinality `{}`", other)),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("item name cannot be empty".to_string());
    }
    Ok((name.to_string(), cardinality))
}
