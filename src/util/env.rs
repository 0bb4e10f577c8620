//! Snapshot of the process environment.
//!
//! Configuration reads tool overrides, flag variables, and cross-compile
//! prefixes from the environment. Capturing them once keeps a run
//! deterministic and lets tests supply their own values.

use std::collections::BTreeMap;

/// Variables listed in help output that are not tool or path overrides.
pub const OTHER_ENV_VARS: &[(&str, &str)] = &[
    ("CFLAGS", "User C compiler flags to append."),
    ("CPPFLAGS", "Also treated as C compiler flags."),
    ("LDFLAGS", "C compiler flags for link command."),
    ("CCACHE", "Set to 'no' to disable automatic ccache detection."),
    ("TARGET", "Prefix for default build tools (for cross compilation)"),
    ("CROSS_COMPILE", "Same as TARGET."),
];

/// Immutable view of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    ///
    /// Variables whose names or values are not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Environment { vars }
    }

    /// Build an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Environment {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Look up a variable, treating an unset variable as empty.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Split a variable into whitespace-separated flags.
    pub fn flags(&self, name: &str) -> Vec<String> {
        self.get_or_empty(name)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Cross-compilation prefix from `TARGET`, falling back to `CROSS_COMPILE`.
    pub fn cross_prefix(&self) -> &str {
        self.get("TARGET")
            .or_else(|| self.get("CROSS_COMPILE"))
            .unwrap_or("")
    }

    /// Whether automatic ccache wrapping was switched off via `CCACHE`.
    pub fn ccache_disabled(&self) -> bool {
        matches!(
            self.get_or_empty("CCACHE").to_ascii_lowercase().as_str(),
            "no" | "0" | "false"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_splitting() {
        let env = Environment::from_pairs([("CFLAGS", "  -O2   -g "), ("LDFLAGS", "")]);
        assert_eq!(env.flags("CFLAGS"), vec!["-O2", "-g"]);
        assert!(env.flags("LDFLAGS").is_empty());
        assert!(env.flags("CPPFLAGS").is_empty());
    }

    #[test]
    fn test_cross_prefix_precedence() {
        let env = Environment::from_pairs([("TARGET", "arm-linux-"), ("CROSS_COMPILE", "x-")]);
        assert_eq!(env.cross_prefix(), "arm-linux-");

        let env = Environment::from_pairs([("CROSS_COMPILE", "x-")]);
        assert_eq!(env.cross_prefix(), "x-");

        assert_eq!(Environment::default().cross_prefix(), "");
    }

    #[test]
    fn test_ccache_opt_out() {
        for value in ["no", "NO", "0", "False"] {
            assert!(Environment::from_pairs([("CCACHE", value)]).ccache_disabled());
        }
        assert!(!Environment::from_pairs([("CCACHE", "yes")]).ccache_disabled());
        assert!(!Environment::default().ccache_disabled());
    }
}
