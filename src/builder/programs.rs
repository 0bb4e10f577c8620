//! Build tool lookup.
//!
//! Tools are referred to by symbolic variable names (`CC`, `PKG_CONFIG`).
//! The command line for a tool comes from the environment variable of the
//! same name, or from the default prefixed with the cross-compile prefix.

use std::path::Path;

use crate::core::errors::ConfigureError;
use crate::util::env::Environment;

/// Builtin tools and their default commands.
pub const BUILTIN_PROGRAMS: &[(&str, &str)] = &[
    ("CC", "cc"),
    ("CLANG", "clang"),
    ("GCC", "gcc"),
    ("PKG_CONFIG", "pkg-config"),
    ("WAYSCAN", "wayland-scanner"),
    ("GIT", "git"),
    ("NINJA", "ninja"),
];

const COMPILER_VAR: &str = "CC";
const CCACHE: &str = "ccache";

/// Declared tool variables and their defaults, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramTable {
    entries: Vec<(String, String)>,
}

impl ProgramTable {
    pub fn with_builtins() -> Self {
        let mut table = ProgramTable::default();
        for (name, default) in BUILTIN_PROGRAMS {
            table.declare(name, default);
        }
        table
    }

    /// Declare a tool; redeclaring replaces the default.
    pub fn declare(&mut self, name: &str, default: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = default.to_string(),
            None => self.entries.push((name.to_string(), default.to_string())),
        }
    }

    pub fn default_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }

    /// The command line to try for `name`, before any ccache wrapping.
    pub fn candidate(&self, name: &str, env: &Environment) -> Result<String, ConfigureError> {
        let default = self
            .default_for(name)
            .ok_or_else(|| ConfigureError::UnknownProgram {
                name: name.to_string(),
            })?;

        if let Some(value) = env.get(name) {
            return Ok(value.to_string());
        }

        // Cross toolchains generally ship only a `-gcc` driver.
        let prefix = env.cross_prefix();
        let default = if !prefix.is_empty() && default == "cc" {
            "gcc"
        } else {
            default
        };
        Ok(format!("{}{}", prefix, default))
    }
}

/// Whether the first word of a command line is ccache.
pub fn starts_with_ccache(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .and_then(|first| Path::new(first).file_name())
        .is_some_and(|name| name == CCACHE)
}

/// Why ccache wrapping was or was not considered for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcacheDecision {
    /// Only the C compiler is wrapped
    NotCompiler,
    DisabledByEnv,
    AlreadyPresent,
    /// Wrap if `ccache -V` succeeds
    Try,
}

pub fn ccache_decision(name: &str, command: &str, env: &Environment) -> CcacheDecision {
    if name != COMPILER_VAR {
        CcacheDecision::NotCompiler
    } else if env.ccache_disabled() {
        CcacheDecision::DisabledByEnv
    } else if starts_with_ccache(command) {
        CcacheDecision::AlreadyPresent
    } else {
        CcacheDecision::Try
    }
}

/// Prefix a command line with ccache.
pub fn wrap_ccache(command: &str) -> String {
    format!("{} {}", CCACHE, command)
}

/// The ccache version query used to detect it.
pub fn ccache_probe_command() -> [&'static str; 2] {
    [CCACHE, "-V"]
}
