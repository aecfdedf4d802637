//! High-level operations.
//!
//! This module contains the implementation of buildchain commands.

pub mod describe;
pub mod generate;

pub use describe::{describe, format_description, Description, StepEntry};
pub use generate::{format_report, generate_sources};
