//! autoprobe - configure-time feature checks for C projects
//!
//! This crate evaluates an ordered list of checks against the host
//! (compiler tests, pkg-config queries, tool lookups), resolves their
//! dependencies, and writes `config.h`, `config.mak` and `build.ninja`.

pub mod builder;
pub mod core;
pub mod emit;
pub mod ops;
pub mod util;

pub use crate::core::catalogue::Catalogue;
pub use crate::core::check::{CheckDescriptor, Outcome, Probe, Verdict};
pub use crate::core::errors::ConfigureError;
pub use ops::configure::{configure, ConfigureOptions, Configured, ResolutionContext};
