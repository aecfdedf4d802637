//! `buildchain generate` command

use anyhow::Result;

use crate::cli::GenerateArgs;
use buildchain::codegen::GenerateOptions;
use buildchain::ops::{format_report, generate_sources};

pub fn execute(args: GenerateArgs, verbose: bool) -> Result<()> {
    super::check_src(&args.src)?;
    let config = super::command_config(args.items)?;

    let mut options = GenerateOptions::new(&args.src, &args.out);
    if let Some(listing) = args.listing {
        options = options.with_listing(listing);
    }

    let report = generate_sources(options, &config)?;
    print!("{}", format_report(&report, verbose));
    Ok(())
}
