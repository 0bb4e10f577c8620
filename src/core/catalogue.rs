//! `configure.toml` check catalogue.
//!
//! The catalogue declares a project's tools, install paths and checks. It is
//! turned into [`ConfigureOptions`] and an ordered list of
//! [`CheckDescriptor`]s; nothing here runs a probe.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::builder::probe::CompileProbe;
use crate::core::check::{CheckDescriptor, DefaultPolicy, Probe};
use crate::core::install_paths::PROJNAME_VAR;
use crate::emit::{ExeFormat, Variable};
use crate::ops::configure::{ConfigureOptions, ResolutionContext};
use crate::util::env::Environment;
use crate::util::fs::read_to_string;

/// Default catalogue file name, looked up in the project root.
pub const CATALOGUE_FILE: &str = "configure.toml";

/// A parsed catalogue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalogue {
    #[serde(default)]
    pub project: ProjectSection,

    /// Extra tools: `NAME = "default command"`
    #[serde(default)]
    pub programs: BTreeMap<String, String>,

    /// Extra install-path variables: `NAME = "$(PREFIX)/..."`
    #[serde(default, rename = "install-paths")]
    pub install_paths: BTreeMap<String, String>,

    #[serde(default, rename = "check")]
    pub checks: Vec<CheckSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectSection {
    pub name: Option<String>,
    pub exe_format: Option<ExeFormat>,
}

/// `required = true` or `required = "message shown on failure"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Required {
    Flag(bool),
    Message(String),
}

/// One `[[check]]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CheckSpec {
    /// Flagged name, e.g. `-zlib*`; absent for anonymous checks
    pub name: Option<String>,
    pub desc: Option<String>,
    pub default: Option<bool>,
    pub required: Option<Required>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub deps_any: Vec<String>,
    #[serde(default)]
    pub deps_neg: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    /// Flags contributed when the check succeeds
    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
    #[serde(default)]
    pub pick: Vec<PickSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PickSpec {
    pub dep: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// A declarative probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProbeSpec {
    /// Compile (and optionally link) a test program with `CC`.
    Cc(CompileProbe),
    PkgConfig {
        args: Vec<String>,
    },
    /// Query a pkg-config variable, optionally exporting it to `config.mak`.
    PkgConfigVariable {
        package: String,
        variable: String,
        #[serde(default)]
        export: Option<String>,
    },
    /// Resolve a declared tool.
    Program {
        name: String,
    },
    /// Look up a binary in PATH.
    Binary {
        name: String,
    },
    /// Unconditional flags.
    Flags {
        #[serde(default)]
        cflags: Vec<String>,
        #[serde(default)]
        ldflags: Vec<String>,
    },
}

impl Probe for ProbeSpec {
    fn run(&self, cx: &mut ResolutionContext) -> Result<bool> {
        match self {
            ProbeSpec::Cc(probe) => cx.check_cc(probe),
            ProbeSpec::PkgConfig { args } => cx.check_pkg_config(args.iter().cloned()),
            ProbeSpec::PkgConfigVariable {
                package,
                variable,
                export,
            } => match cx.pkg_config_variable(package, variable)? {
                Some(value) => {
                    if let Some(name) = export {
                        cx.add_variable(Variable::text(name.as_str(), value));
                    }
                    Ok(true)
                }
                None => Ok(false),
            },
            ProbeSpec::Program { name } => cx.check_program(name),
            ProbeSpec::Binary { name } => Ok(cx.check_binary_exists(name)?),
            ProbeSpec::Flags { cflags, ldflags } => {
                cx.add_cflags(cflags.iter().cloned());
                cx.add_ldflags(ldflags.iter().cloned());
                Ok(true)
            }
        }
    }
}

/// Probes of one check; all must succeed, evaluated in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeChain(pub Vec<ProbeSpec>);

impl Probe for ProbeChain {
    fn run(&self, cx: &mut ResolutionContext) -> Result<bool> {
        for probe in &self.0 {
            if !probe.run(cx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl CheckSpec {
    /// `required` wins over `default = false`.
    pub fn policy(&self) -> DefaultPolicy {
        match &self.required {
            Some(Required::Message(message)) => DefaultPolicy::Required {
                message: Some(message.clone()),
            },
            Some(Required::Flag(true)) => DefaultPolicy::Required { message: None },
            _ if self.default == Some(false) => DefaultPolicy::SoftDisable,
            _ => DefaultPolicy::SoftEnable,
        }
    }

    pub fn into_descriptor(self) -> CheckDescriptor {
        let policy = self.policy();
        let mut check = match &self.name {
            Some(name) => CheckDescriptor::new(name),
            None => CheckDescriptor::anonymous(),
        };
        if let Some(desc) = self.desc {
            check = check.desc(desc);
        }
        check = check
            .policy(policy)
            .deps(self.deps)
            .deps_any(self.deps_any)
            .deps_neg(self.deps_neg)
            .sources(self.sources);
        for pick in self.pick {
            check = check.pick(pick.dep, pick.sources);
        }

        let mut probes = self.probes;
        if !self.cflags.is_empty() {
            probes.insert(
                0,
                ProbeSpec::Flags {
                    cflags: self.cflags,
                    ldflags: Vec::new(),
                },
            );
        }
        if !probes.is_empty() {
            check = check.probe_with(ProbeChain(probes));
        }
        check
    }
}

impl Catalogue {
    /// Load a catalogue from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string(path)?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse catalogue: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let catalogue: Catalogue = toml::from_str(content)?;
        Ok(catalogue)
    }

    /// Project name: `PROJNAME` from the environment, then the catalogue,
    /// then the root directory's name.
    pub fn project_name(&self, env: &Environment, root: &Path) -> String {
        env.get(PROJNAME_VAR)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| self.project.name.clone())
            .or_else(|| {
                root.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
    }

    /// Options for a run in `root` with these tools and install paths.
    pub fn options(
        &self,
        root: impl Into<PathBuf>,
        args: Vec<String>,
        env: Environment,
    ) -> ConfigureOptions {
        let root = root.into();
        let project = self.project_name(&env, &root);
        let mut opts = ConfigureOptions::new(root, project).args(args).env(env);

        for (name, default) in &self.programs {
            opts.programs.declare(name, default);
        }
        for (name, default) in &self.install_paths {
            opts.install_paths.declare(name, default);
        }
        if let Some(format) = self.project.exe_format {
            opts.exe_format = format;
        }
        opts
    }

    /// Check descriptors in declaration order.
    pub fn into_checks(self) -> Vec<CheckDescriptor> {
        self.checks
            .into_iter()
            .map(CheckSpec::into_descriptor)
            .collect()
    }
}
