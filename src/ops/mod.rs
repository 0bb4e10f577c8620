//! High-level operations.

pub mod configure;
pub mod help;

pub use configure::{configure, ConfigureOptions, Configured, ResolutionContext, Summary};
