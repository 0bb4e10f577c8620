//! Core data structures for autoprobe.
//!
//! - Check descriptors, outcomes and verdicts
//! - Command-line intents and install-path variables
//! - The dependency registry and the TOML catalogue

pub mod catalogue;
pub mod check;
pub mod errors;
pub mod install_paths;
pub mod intent;
pub mod registry;

pub use catalogue::Catalogue;
pub use check::{CheckDescriptor, DefaultPolicy, Outcome, Probe, Verdict};
pub use errors::ConfigureError;
pub use install_paths::InstallPathTable;
pub use intent::{Intent, Invocation};
pub use registry::DependencyRegistry;
