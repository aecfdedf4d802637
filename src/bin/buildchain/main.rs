//! buildchain CLI - registration code generation for build steps

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use buildchain::codegen::RegistrationErrors;
use buildchain::util::diagnostic;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli) {
        report(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("buildchain=debug")
    } else {
        EnvFilter::new("buildchain=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, cli.verbose),
        Commands::Describe(args) => commands::describe::execute(args),
    }
}

fn report(error: &anyhow::Error, color: bool) {
    if let Some(errors) = error.downcast_ref::<RegistrationErrors>() {
        for err in &errors.0 {
            diagnostic::emit(&err.to_diagnostic(), color);
        }
    }
    eprintln!("error: {:#}", error);
}
