//! Shared utilities

pub mod diagnostic;
pub mod env;
pub mod fs;
pub mod log;
pub mod process;
pub mod shell;

pub use diagnostic::Diagnostic;
pub use env::Environment;
pub use shell::Shell;
