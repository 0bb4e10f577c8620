//! Install-path variables.
//!
//! Values may reference other variables with make syntax (`$(PREFIX)/etc`).
//! Resolution substitutes repeatedly until nothing changes, capped at
//! [`MAX_SUBSTITUTION_ROUNDS`] so reference cycles terminate.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Upper bound on substitution rounds.
pub const MAX_SUBSTITUTION_ROUNDS: usize = 10;

/// Project name variable; accepted on the command line but not listed.
pub const PROJNAME_VAR: &str = "PROJNAME";

/// Builtin install-path variables and their defaults.
pub const INSTALL_PATHS: &[(&str, &str)] = &[
    ("PREFIX", "/usr/local"),
    ("CONFDIR", "$(PREFIX)/etc"),
    ("CONFLOADDIR", "$(CONFDIR)"),
];

static VAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([^)]+)\)").expect("valid variable reference regex"));

/// One declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPath {
    pub name: String,
    pub default: String,
    pub value: String,
    /// Shown in help output and written to the variable file
    pub listed: bool,
}

/// Result of resolving a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value: String,
    /// False when references were still being substituted at the cap
    pub converged: bool,
}

/// Ordered table of install-path variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPathTable {
    entries: Vec<InstallPath>,
}

impl InstallPathTable {
    /// An empty table.
    pub fn new() -> Self {
        InstallPathTable::default()
    }

    /// The builtin variables plus `PROJNAME`.
    pub fn with_defaults(project_name: &str) -> Self {
        let mut table = InstallPathTable::new();
        table.entries.push(InstallPath {
            name: PROJNAME_VAR.to_string(),
            default: project_name.to_string(),
            value: project_name.to_string(),
            listed: false,
        });
        for (name, default) in INSTALL_PATHS {
            table.declare(name, default);
        }
        table
    }

    /// Declare a listed variable. Names are stored uppercase so they match
    /// `--name=` arguments in any case. Redeclaring replaces the default and
    /// value.
    pub fn declare(&mut self, name: &str, default: &str) {
        let name = name.to_ascii_uppercase();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.default = default.to_string();
                entry.value = default.to_string();
            }
            None => self.entries.push(InstallPath {
                name,
                default: default.to_string(),
                value: default.to_string(),
                listed: true,
            }),
        }
    }

    /// Override a value. Returns false if the variable is not declared.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.value = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Unresolved value of a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    /// Listed variables in declaration order.
    pub fn listed(&self) -> impl Iterator<Item = &InstallPath> {
        self.entries.iter().filter(|e| e.listed)
    }

    /// Substitute `$(NAME)` references until a fixed point.
    ///
    /// References to undeclared variables are left as they are, so
    /// downstream tools may still expand them.
    pub fn resolve(&self, value: &str) -> Resolution {
        let mut current = value.to_string();

        for _ in 0..MAX_SUBSTITUTION_ROUNDS {
            let mut changed = false;
            let next = VAR_REF.replace_all(&current, |caps: &Captures| match self.get(&caps[1]) {
                Some(v) => {
                    changed = true;
                    v.to_string()
                }
                None => caps[0].to_string(),
            })
            .into_owned();

            if !changed {
                return Resolution {
                    value: current,
                    converged: true,
                };
            }
            current = next;
        }

        let converged = !VAR_REF
            .captures_iter(&current)
            .any(|caps| self.contains(&caps[1]));
        Resolution {
            value: current,
            converged,
        }
    }

    /// Resolve a declared variable by name.
    pub fn resolve_var(&self, name: &str) -> Option<Resolution> {
        self.get(name).map(|v| self.resolve(v))
    }
}
