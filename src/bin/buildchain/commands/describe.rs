//! `buildchain describe` command

use anyhow::Result;

use crate::cli::DescribeArgs;
use buildchain::ops::{describe, format_description};

pub fn execute(args: DescribeArgs) -> Result<()> {
    super::check_src(&args.src)?;
    let config = super::command_config(args.items)?;

    let description = describe(&args.src, &config)?;
    if args.json {
        println!("{}", description.to_json()?);
    } else {
        print!("{}", format_description(&description));
    }

    if description.has_errors() {
        for error in &description.errors {
            eprintln!("error: {}", error);
        }
        anyhow::bail!("{} build step registration error(s)", description.errors.len());
    }
    Ok(())
}
