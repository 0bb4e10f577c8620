//! Probe plumbing.
//!
//! Flag state with transactional snapshots, compiler test programs, and the
//! tool table.

pub mod flags;
pub mod probe;
pub mod programs;

pub use flags::{FlagStack, FlagState};
pub use probe::{CompileProbe, ProcessOutcome};
pub use programs::ProgramTable;
