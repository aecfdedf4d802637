//! Shared utilities

pub mod config;
pub mod diagnostic;
pub mod fs;

pub use config::ChainConfig;
pub use diagnostic::Diagnostic;
