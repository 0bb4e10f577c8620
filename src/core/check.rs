//! Check descriptors and verdicts.
//!
//! A check is one declared unit of feature detection: it may carry an
//! identifier other checks depend on, an option identity the user can
//! override on the command line, a `HAVE_*` define, dependency lists, a
//! probe, and source files contributed when it ends up enabled.

use std::fmt;

use anyhow::Result;

use crate::ops::configure::ResolutionContext;

/// Something that decides whether a check is feasible.
///
/// Probes run inside a flag transaction: returning `Ok(false)` rolls back
/// every flag, define, variable and program the probe added. Errors abort
/// the whole run.
pub trait Probe {
    fn run(&self, cx: &mut ResolutionContext) -> Result<bool>;
}

impl<F> Probe for F
where
    F: Fn(&mut ResolutionContext) -> Result<bool>,
{
    fn run(&self, cx: &mut ResolutionContext) -> Result<bool> {
        self(cx)
    }
}

/// Identity derived from a check name such as `-zlib*`.
///
/// A leading `-` generates `--enable-`/`--disable-`/`--with-` options (with
/// `_` spelled as `-`); a trailing `*` emits `HAVE_<NAME>` to the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckName {
    /// Dependency identifier used by other checks
    pub identifier: String,
    /// Command-line option name, if options are generated
    pub option: Option<String>,
    /// Preprocessor define name, if one is emitted
    pub define: Option<String>,
}

impl CheckName {
    /// Parse a flagged check name.
    pub fn parse(raw: &str) -> CheckName {
        let (has_option, rest) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (has_define, identifier) = match rest.strip_suffix('*') {
            Some(ident) => (true, ident),
            None => (false, rest),
        };

        CheckName {
            identifier: identifier.to_string(),
            option: has_option.then(|| identifier.replace('_', "-")),
            define: has_define.then(|| format!("HAVE_{}", identifier.replace('-', "_").to_uppercase())),
        }
    }
}

/// How a check is enabled before options, dependencies and probes apply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DefaultPolicy {
    /// Enabled unless something disables it.
    #[default]
    SoftEnable,
    /// Disabled unless the user enables it.
    SoftDisable,
    /// Enabled, and failing to enable it aborts the run.
    Required { message: Option<String> },
}

/// Terminal state of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Enabled,
    DisabledByOption,
    DisabledByDefault,
    /// A `none-of` dependency is enabled.
    Conflict(String),
    /// No `any-of` dependency is enabled.
    MissingAny(Vec<String>),
    /// An `all-of` dependency is disabled.
    MissingAll(String),
    ProbeFailed,
    /// Help mode: the check was described, not evaluated.
    ProbeSkipped,
}

impl Outcome {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Outcome::Enabled)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Enabled => write!(f, "yes"),
            Outcome::DisabledByOption | Outcome::DisabledByDefault => write!(f, "disabled"),
            Outcome::Conflict(dep) => write!(f, "conflicts with {}", dep),
            Outcome::MissingAny(deps) => write!(f, "not any of {} found", deps.join(", ")),
            Outcome::MissingAll(dep) => write!(f, "{} not found", dep),
            Outcome::ProbeFailed => write!(f, "no"),
            Outcome::ProbeSkipped => write!(f, "skipped"),
        }
    }
}

/// Final result of evaluating one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub identifier: Option<String>,
    pub outcome: Outcome,
    /// Whether a disabled outcome was fatal
    pub hard_required: bool,
}

impl Verdict {
    pub fn enabled(&self) -> bool {
        self.outcome.is_enabled()
    }
}

/// A dependency-gated group of sources: `dep` of `_` always matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePick {
    pub dep: String,
    pub sources: Vec<String>,
}

/// Declaration of a single check.
pub struct CheckDescriptor {
    pub name: Option<CheckName>,
    pub desc: Option<String>,
    pub policy: DefaultPolicy,
    /// `all-of`
    pub deps: Vec<String>,
    /// `any-of`
    pub deps_any: Vec<String>,
    /// `none-of`
    pub deps_neg: Vec<String>,
    pub sources: Vec<String>,
    /// Evaluated in order when enabled; first matching group wins.
    pub pick: Vec<SourcePick>,
    pub probe: Option<Box<dyn Probe>>,
}

impl fmt::Debug for CheckDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckDescriptor")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("policy", &self.policy)
            .field("deps", &self.deps)
            .field("deps_any", &self.deps_any)
            .field("deps_neg", &self.deps_neg)
            .field("sources", &self.sources)
            .field("pick", &self.pick)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl CheckDescriptor {
    /// A named check (see [`CheckName::parse`] for the flag syntax).
    pub fn new(name: &str) -> Self {
        CheckDescriptor {
            name: Some(CheckName::parse(name)),
            ..Self::anonymous()
        }
    }

    /// A check without dependency identity.
    pub fn anonymous() -> Self {
        CheckDescriptor {
            name: None,
            desc: None,
            policy: DefaultPolicy::SoftEnable,
            deps: Vec::new(),
            deps_any: Vec::new(),
            deps_neg: Vec::new(),
            sources: Vec::new(),
            pick: Vec::new(),
            probe: None,
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Disabled unless enabled on the command line.
    pub fn disabled_by_default(mut self) -> Self {
        self.policy = DefaultPolicy::SoftDisable;
        self
    }

    /// Abort the run if the check ends up disabled.
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.policy = DefaultPolicy::Required {
            message: Some(message.into()),
        };
        self
    }

    pub fn policy(mut self, policy: DefaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = strings(deps);
        self
    }

    pub fn deps_any<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps_any = strings(deps);
        self
    }

    pub fn deps_neg<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps_neg = strings(deps);
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = strings(sources);
        self
    }

    pub fn pick<I, S>(mut self, dep: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pick.push(SourcePick {
            dep: dep.into(),
            sources: strings(sources),
        });
        self
    }

    pub fn probe<F>(self, probe: F) -> Self
    where
        F: Fn(&mut ResolutionContext) -> Result<bool> + 'static,
    {
        self.probe_with(probe)
    }

    pub fn probe_with(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        self.name.as_ref().map(|n| n.identifier.as_str())
    }

    pub fn option_name(&self) -> Option<&str> {
        self.name.as_ref().and_then(|n| n.option.as_deref())
    }

    pub fn define_name(&self) -> Option<&str> {
        self.name.as_ref().and_then(|n| n.define.as_deref())
    }

    /// Text shown in `Checking for ...`; defaults to the identifier.
    pub fn display_desc(&self) -> Option<&str> {
        self.desc.as_deref().or_else(|| self.identifier())
    }

    /// All referenced dependency identifiers, in evaluation order.
    pub fn referenced_deps(&self) -> impl Iterator<Item = &str> {
        self.deps_neg
            .iter()
            .chain(&self.deps_any)
            .chain(&self.deps)
            .map(String::as_str)
    }

    /// The `--help` line for this check, if it has an option identity.
    pub fn help_line(&self) -> Option<String> {
        let option = self.option_name()?;

        let default_action = match self.policy {
            DefaultPolicy::Required { .. } => "enable",
            DefaultPolicy::SoftDisable => "disable",
            DefaultPolicy::SoftEnable
                if !self.deps.is_empty()
                    || !self.deps_any.is_empty()
                    || !self.deps_neg.is_empty()
                    || self.probe.is_some() =>
            {
                "autodetect"
            }
            DefaultPolicy::SoftEnable => "enable",
        };
        let action = if default_action == "disable" {
            "enable"
        } else {
            "disable"
        };

        let flag = format!("--{}-{}", action, option);
        Some(format!(
            "  {:<30} {} {} [{}]",
            flag,
            action,
            self.display_desc().unwrap_or(option),
            default_action
        ))
    }
}
