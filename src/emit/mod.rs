//! Generated build artifacts.
//!
//! Resolved state is first collected into an [`ArtifactSet`] of typed
//! entries; each output format has its own serializer:
//!
//! - [`header`]: `config.h`
//! - [`makefile`]: `config.mak`
//! - [`ninja`]: `build.ninja`

pub mod header;
pub mod makefile;
pub mod ninja;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::builder::flags::FlagState;
use crate::core::errors::ConfigureError;
use crate::core::install_paths::InstallPathTable;
use crate::util::env::Environment;
use crate::util::fs::write_string;

pub use header::HeaderFile;
pub use makefile::MakeFile;
pub use ninja::NinjaFile;

/// File names of the generated artifacts inside the build directory.
pub const HEADER_FILE: &str = "config.h";
pub const MAKE_FILE: &str = "config.mak";
pub const NINJA_FILE: &str = "build.ninja";
pub const LOG_FILE: &str = "config.log";

/// Every file a run produces; removed at startup so failures leave nothing stale.
pub const ALL_ARTIFACTS: &[&str] = &[HEADER_FILE, MAKE_FILE, NINJA_FILE, LOG_FILE];

/// Value of a preprocessor define.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineValue {
    Int(i64),
    /// Rendered as a C string literal
    Str(String),
    /// `#define NAME` with no value
    Empty,
}

/// A preprocessor define.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: DefineValue,
}

impl Define {
    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Define {
            name: name.into(),
            value: DefineValue::Int(value),
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define {
            name: name.into(),
            value: DefineValue::Str(value.into()),
        }
    }

    /// Whether this is a `HAVE_*` feature-presence define.
    pub fn is_feature(&self) -> bool {
        self.name.starts_with("HAVE_") && is_identifier(&self.name)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.value, DefineValue::Int(_))
    }
}

fn join_flags<const N: usize>(groups: [&Vec<String>; N]) -> String {
    groups
        .iter()
        .flat_map(|g| g.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value of a build variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    /// Arbitrary text; backslashes and quotes are escaped
    Text(String),
    /// Written verbatim (flag lists, numbers, make references)
    Raw(String),
}

/// A `NAME = value` build variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: VariableValue,
}

impl Variable {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            value: VariableValue::Text(value.into()),
        }
    }

    pub fn raw(name: impl Into<String>, value: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            value: VariableValue::Raw(value.into()),
        }
    }
}

/// Executable format of the target; decides `EXESUF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExeFormat {
    #[default]
    Elf,
    Pe,
    Macho,
}

impl ExeFormat {
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            ExeFormat::Pe => ".exe",
            ExeFormat::Elf | ExeFormat::Macho => "",
        }
    }
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").expect("valid character class regex"));

/// Whether `s` is a valid C identifier.
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// Canonical `HAVE_*` define name for a feature identifier.
///
/// Identifiers that already are `HAVE_`-prefixed C identifiers are kept;
/// anything else has non-alphanumerics replaced by `_`, is uppercased and
/// prefixed. Lowercase macros like `alsa` would collide with code.
pub fn feature_define_name(identifier: &str) -> String {
    if identifier.starts_with("HAVE_") && is_identifier(identifier) {
        return identifier.to_string();
    }
    let canon = NON_ALNUM.replace_all(identifier, "_").to_uppercase();
    if canon.starts_with("HAVE_") {
        canon
    } else {
        format!("HAVE_{}", canon)
    }
}

/// Normalize a contributed source path to a `$(ROOT)` or `$(BUILD)` prefix.
pub fn normalize_source(source: &str) -> Result<String, ConfigureError> {
    if source.starts_with("$(BUILD)") {
        return Ok(source.to_string());
    }
    if source.starts_with('$') {
        return Err(ConfigureError::InvalidSourcePath {
            path: source.to_string(),
        });
    }
    if source.starts_with("generated/") {
        Ok(format!("$(BUILD)/{}", source))
    } else {
        Ok(format!("$(ROOT)/{}", source))
    }
}

/// Normalize, deduplicate and sort contributed sources.
pub fn normalize_sources<'a, I>(sources: I) -> Result<Vec<String>, ConfigureError>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut unique = BTreeSet::new();
    for source in sources {
        unique.insert(normalize_source(source)?);
    }
    Ok(unique.into_iter().collect())
}

/// `<PROJECT>_CONFDIR` style define name for a project.
pub fn project_define_name(project: &str, suffix: &str) -> String {
    format!("{}_{}", NON_ALNUM.replace_all(project, "_").to_uppercase(), suffix)
}

/// Everything the emitters need from a finished run.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedConfig<'a> {
    pub project: &'a str,
    /// Full command line, recorded as `CONFIGURATION`
    pub command_line: &'a str,
    pub state: &'a FlagState,
    /// Enabled check identifiers, sorted
    pub enabled: &'a [&'a str],
    pub sources: &'a [String],
    pub install_paths: &'a InstallPathTable,
    pub build_dir: &'a Path,
    pub root_dir: &'a Path,
    pub exe_format: ExeFormat,
    pub env: &'a Environment,
}

/// The three rendered artifacts of a configuration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub header: HeaderFile,
    pub makefile: MakeFile,
    pub ninja: NinjaFile,
    /// Deduplicated, normalized, sorted sources
    pub sources: Vec<String>,
    /// Install-path variables whose substitution did not converge
    pub unresolved: Vec<String>,
}

impl ArtifactSet {
    /// Assemble the artifacts for a finished run.
    pub fn build(cfg: &ResolvedConfig<'_>) -> Result<ArtifactSet, ConfigureError> {
        let sources = normalize_sources(cfg.sources)?;
        let mut unresolved = Vec::new();
        let mut resolve = |name: &str| {
            let res = cfg.install_paths.resolve_var(name)?;
            if !res.converged && !unresolved.iter().any(|n| n == name) {
                unresolved.push(name.to_string());
            }
            Some(res.value)
        };

        let mut header = HeaderFile::new();
        for define in cfg.state.defines.iter().filter(|d| d.is_numeric()) {
            header.define(define);
        }
        for id in cfg.enabled {
            let name = feature_define_name(id);
            if !header.contains(&name) {
                header.define(&Define::int(name, 1));
            }
        }
        header.define(&Define::string("CONFIGURATION", cfg.command_line));
        header.define(&Define::string("FULLCONFIG", cfg.enabled.join(" ")));
        let confdir = resolve("CONFLOADDIR").unwrap_or_default();
        header.define(&Define::string(
            project_define_name(cfg.project, "CONFDIR"),
            confdir,
        ));
        for define in cfg.state.defines.iter().filter(|d| !d.is_numeric()) {
            header.define(define);
        }

        let mut makefile = MakeFile::new();
        for variable in &cfg.state.variables {
            makefile.var(variable.clone());
        }
        for variable in header.feature_mirrors() {
            makefile.var(variable);
        }
        makefile.var(Variable::text("BUILD", cfg.build_dir.display().to_string()));
        makefile.var(Variable::text("ROOT", cfg.root_dir.display().to_string()));
        makefile.blank();
        makefile.var(Variable::raw("EXESUF", cfg.exe_format.exe_suffix()));
        let listed: Vec<String> = cfg.install_paths.listed().map(|p| p.name.clone()).collect();
        let mut prefix = String::new();
        for name in &listed {
            let value = resolve(name).unwrap_or_default();
            if name == "PREFIX" {
                prefix = value.clone();
            }
            makefile.var(Variable::text(name.as_str(), value));
        }
        makefile.blank();

        let cflags = join_flags([
            &cfg.state.cflags,
            &cfg.env.flags("CPPFLAGS"),
            &cfg.env.flags("CFLAGS"),
        ]);
        let ldflags = join_flags([&cfg.state.ldflags, &cfg.env.flags("LDFLAGS")]);
        makefile.var(Variable::raw("CFLAGS", cflags.clone()));
        makefile.blank();
        makefile.var(Variable::raw("LDFLAGS", ldflags.clone()));
        makefile.blank();
        makefile.list("SOURCES", sources.clone());

        let ninja = NinjaFile {
            project: cfg.project.to_string(),
            build_dir: cfg.build_dir.display().to_string(),
            root_dir: cfg.root_dir.display().to_string(),
            cc: cfg
                .state
                .programs
                .get("CC")
                .cloned()
                .unwrap_or_else(|| "cc".to_string()),
            cflags,
            ldflags,
            exe_suffix: cfg.exe_format.exe_suffix().to_string(),
            prefix,
            sources: sources.clone(),
        };

        Ok(ArtifactSet {
            header,
            makefile,
            ninja,
            sources,
            unresolved,
        })
    }

    /// Write every artifact into `build_dir`; returns the written paths.
    pub fn write(&self, build_dir: &Path) -> Result<Vec<PathBuf>> {
        let outputs = [
            (HEADER_FILE, self.header.render()),
            (MAKE_FILE, self.makefile.render()),
            (NINJA_FILE, self.ninja.render()),
        ];

        let mut written = Vec::with_capacity(outputs.len());
        for (name, contents) in outputs {
            let path = build_dir.join(name);
            write_string(&path, &contents)?;
            tracing::debug!("wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}
