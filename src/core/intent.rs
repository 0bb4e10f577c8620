//! Command-line intent parsing.
//!
//! Arguments are classified into a small closed set of kinds and applied to
//! an [`Invocation`]: feature intents, install-path overrides, the build
//! directory, and help mode. Nothing here probes the host.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::core::errors::ConfigureError;
use crate::core::install_paths::InstallPathTable;

/// Variable that selects the build directory instead of an install path.
pub const BUILD_DIR_VAR: &str = "BUILDDIR";

/// What the user asked for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// `--enable-x` / `--with-x=yes`: force enable, failure is fatal
    Enabled,
    /// `--disable-x` / `--with-x=no`
    Disabled,
    /// `--with-x=auto`: detect, even if disabled by default
    Auto,
    /// `--with-x=default` or not given
    Unset,
}

impl Intent {
    fn from_with_value(value: &str) -> Option<Intent> {
        match value {
            "yes" => Some(Intent::Enabled),
            "no" => Some(Intent::Disabled),
            "auto" => Some(Intent::Auto),
            "default" => Some(Intent::Unset),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Enabled => write!(f, "yes"),
            Intent::Disabled => write!(f, "no"),
            Intent::Auto => write!(f, "auto"),
            Intent::Unset => write!(f, "default"),
        }
    }
}

/// One classified command-line argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Help,
    Enable(String),
    Disable(String),
    With { feature: String, intent: Intent },
    /// `--NAME=value`; `name` is uppercased
    Assign { name: String, value: String },
    /// Anything not starting with `-`
    Positional(String),
}

impl Argument {
    /// Classify a raw argument. One or two leading dashes are accepted.
    pub fn classify(raw: &str) -> Result<Argument, ConfigureError> {
        let Some(flag) = raw.strip_prefix('-') else {
            return Ok(Argument::Positional(raw.to_string()));
        };
        let flag = flag.strip_prefix('-').unwrap_or(flag);

        let (name, value) = match flag.split_once('=') {
            Some((name, value)) => (name, value),
            None => (flag, ""),
        };

        let no_value = |arg: Argument| {
            if value.is_empty() {
                Ok(arg)
            } else {
                Err(ConfigureError::OptionTakesNoValue {
                    option: name.to_string(),
                })
            }
        };

        if name == "help" {
            return no_value(Argument::Help);
        }
        if let Some(feature) = name.strip_prefix("enable-") {
            return no_value(Argument::Enable(feature.to_string()));
        }
        if let Some(feature) = name.strip_prefix("disable-") {
            return no_value(Argument::Disable(feature.to_string()));
        }
        if let Some(feature) = name.strip_prefix("with-") {
            let intent = Intent::from_with_value(value).ok_or_else(|| {
                ConfigureError::InvalidWithValue {
                    option: name.to_string(),
                    value: value.to_string(),
                }
            })?;
            return Ok(Argument::With {
                feature: feature.to_string(),
                intent,
            });
        }

        Ok(Argument::Assign {
            name: name.to_ascii_uppercase(),
            value: value.to_string(),
        })
    }
}

/// Feature intents keyed by option name; each entry is consumed at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureIntents {
    intents: BTreeMap<String, Intent>,
}

impl FeatureIntents {
    pub fn new() -> Self {
        FeatureIntents::default()
    }

    /// Record an intent; a later argument for the same feature wins.
    pub fn set(&mut self, feature: impl Into<String>, intent: Intent) {
        self.intents.insert(feature.into(), intent);
    }

    /// Remove and return the intent for `feature` (`Unset` when absent).
    pub fn take(&mut self, feature: &str) -> Intent {
        self.intents.remove(feature).unwrap_or(Intent::Unset)
    }

    /// Entries no check consumed, in name order.
    pub fn unconsumed(&self) -> impl Iterator<Item = (&str, Intent)> {
        self.intents.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

/// Parsed command line.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Raw arguments, kept for the `CONFIGURATION` define
    pub args: Vec<String>,
    pub help: bool,
    pub features: FeatureIntents,
    /// Install-path overrides (uppercase name, value), in argument order
    pub install_paths: Vec<(String, String)>,
    pub build_dir: Option<PathBuf>,
}

impl Invocation {
    /// Parse configure arguments.
    ///
    /// `known` decides which `--NAME=value` assignments are valid install
    /// path variables; `BUILDDIR` is always accepted.
    pub fn parse<I, S>(args: I, known: &InstallPathTable) -> Result<Invocation, ConfigureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inv = Invocation::default();

        for raw in args {
            let raw = raw.into();
            match Argument::classify(&raw)? {
                Argument::Help => inv.help = true,
                Argument::Enable(feature) => inv.features.set(feature, Intent::Enabled),
                Argument::Disable(feature) => inv.features.set(feature, Intent::Disabled),
                Argument::With { feature, intent } => inv.features.set(feature, intent),
                Argument::Assign { name, value } => {
                    let is_build_dir = name == BUILD_DIR_VAR;
                    if !is_build_dir && !known.contains(&name) {
                        return Err(ConfigureError::UnknownOption { arg: raw });
                    }
                    if value.is_empty() {
                        return Err(ConfigureError::OptionRequiresValue {
                            option: name.to_ascii_lowercase(),
                        });
                    }
                    if is_build_dir {
                        inv.build_dir = Some(PathBuf::from(value));
                    } else {
                        inv.install_paths.push((name, value));
                    }
                }
                Argument::Positional(arg) => {
                    tracing::warn!("ignoring argument `{}`", arg);
                }
            }
            inv.args.push(raw);
        }

        Ok(inv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, ConfigureError> {
        Invocation::parse(args.iter().copied(), &InstallPathTable::with_defaults("demo"))
    }

    #[test]
    fn test_classify_kinds() {
        assert_eq!(Argument::classify("--help").unwrap(), Argument::Help);
        assert_eq!(Argument::classify("-help").unwrap(), Argument::Help);
        assert_eq!(
            Argument::classify("--enable-lua").unwrap(),
            Argument::Enable("lua".into())
        );
        assert_eq!(
            Argument::classify("--disable-gl-x11").unwrap(),
            Argument::Disable("gl-x11".into())
        );
        assert_eq!(
            Argument::classify("--with-zlib=auto").unwrap(),
            Argument::With {
                feature: "zlib".into(),
                intent: Intent::Auto
            }
        );
        assert_eq!(
            Argument::classify("--prefix=/opt").unwrap(),
            Argument::Assign {
                name: "PREFIX".into(),
                value: "/opt".into()
            }
        );
        assert_eq!(
            Argument::classify("CC=gcc").unwrap(),
            Argument::Positional("CC=gcc".into())
        );
    }

    #[test]
    fn test_flags_without_values() {
        assert!(matches!(
            Argument::classify("--help=yes"),
            Err(ConfigureError::OptionTakesNoValue { .. })
        ));
        assert!(matches!(
            Argument::classify("--enable-lua=yes"),
            Err(ConfigureError::OptionTakesNoValue { .. })
        ));
    }

    #[test]
    fn test_with_values() {
        for (value, intent) in [
            ("yes", Intent::Enabled),
            ("no", Intent::Disabled),
            ("auto", Intent::Auto),
            ("default", Intent::Unset),
        ] {
            let arg = format!("--with-lua={}", value);
            assert_eq!(
                Argument::classify(&arg).unwrap(),
                Argument::With {
                    feature: "lua".into(),
                    intent
                }
            );
        }

        assert!(matches!(
            Argument::classify("--with-lua=maybe"),
            Err(ConfigureError::InvalidWithValue { .. })
        ));
        assert!(matches!(
            Argument::classify("--with-lua"),
            Err(ConfigureError::InvalidWithValue { .. })
        ));
    }

    #[test]
    fn test_invocation_features_last_wins() {
        let mut inv = parse(&["--enable-lua", "--disable-lua", "--with-zlib=auto"]).unwrap();
        assert!(!inv.help);
        assert_eq!(inv.features.take("lua"), Intent::Disabled);
        assert_eq!(inv.features.take("lua"), Intent::Unset);
        assert_eq!(inv.features.take("zlib"), Intent::Auto);
        assert!(inv.features.is_empty());
    }

    #[test]
    fn test_invocation_variables_case_insensitive() {
        let inv = parse(&["--prefix=/opt/demo", "--BuildDir=out", "--ConfDir=/etc/demo"]).unwrap();
        assert_eq!(
            inv.install_paths,
            vec![
                ("PREFIX".to_string(), "/opt/demo".to_string()),
                ("CONFDIR".to_string(), "/etc/demo".to_string()),
            ]
        );
        assert_eq!(inv.build_dir, Some(PathBuf::from("out")));
        assert_eq!(inv.args.len(), 3);
    }

    #[test]
    fn test_invocation_errors() {
        assert!(matches!(
            parse(&["--frobnicate"]),
            Err(ConfigureError::UnknownOption { .. })
        ));
        assert!(matches!(
            parse(&["--nosuchdir=/x"]),
            Err(ConfigureError::UnknownOption { .. })
        ));
        assert!(matches!(
            parse(&["--prefix"]),
            Err(ConfigureError::OptionRequiresValue { .. })
        ));
        assert!(matches!(
            parse(&["--builddir="]),
            Err(ConfigureError::OptionRequiresValue { .. })
        ));
    }

    #[test]
    fn test_help_mode() {
        let inv = parse(&["--help", "--enable-lua"]).unwrap();
        assert!(inv.help);
    }
}
