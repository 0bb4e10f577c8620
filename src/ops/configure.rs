//! The configuration run.
//!
//! A [`ResolutionContext`] owns all state of one run: parsed intents, the
//! flag stack, the dependency registry, collected sources and the log.
//! Checks are evaluated strictly in the order they are submitted; a check
//! may only depend on identifiers recorded before it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::builder::flags::FlagStack;
use crate::builder::probe::{run_logged, split_flags, CompileProbe, ProcessOutcome, TEST_SOURCE};
use crate::builder::programs::{
    ccache_decision, ccache_probe_command, wrap_ccache, CcacheDecision, ProgramTable,
};
use crate::core::check::{CheckDescriptor, DefaultPolicy, Outcome, Probe, SourcePick, Verdict};
use crate::core::errors::ConfigureError;
use crate::core::install_paths::InstallPathTable;
use crate::core::intent::{FeatureIntents, Intent, Invocation};
use crate::core::registry::DependencyRegistry;
use crate::emit::{
    ArtifactSet, Define, DefineValue, ExeFormat, ResolvedConfig, Variable, ALL_ARTIFACTS,
    LOG_FILE,
};
use crate::ops::help;
use crate::util::env::Environment;
use crate::util::fs::{ensure_dir, remove_file_if_exists, write_string};
use crate::util::log::{ConfigLog, LogEntry};
use crate::util::process::{find_executable, ProcessBuilder};
use crate::util::shell::Shell;

/// Identifier of the always-matching entry in a source pick.
pub const PICK_ALWAYS: &str = "_";

const DEFAULT_BUILD_DIR: &str = "build";
const PROBE_DIR_PREFIX: &str = "autoprobe-configure-";

/// Inputs of a configuration run.
#[derive(Debug, Clone)]
pub struct ConfigureOptions {
    /// Top-level source directory
    pub root_dir: PathBuf,
    pub project: String,
    /// Configure arguments, without the program name
    pub args: Vec<String>,
    pub env: Environment,
    pub programs: ProgramTable,
    pub install_paths: InstallPathTable,
    pub exe_format: ExeFormat,
}

impl ConfigureOptions {
    pub fn new(root_dir: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        let project = project.into();
        ConfigureOptions {
            root_dir: root_dir.into(),
            install_paths: InstallPathTable::with_defaults(&project),
            project,
            args: Vec::new(),
            env: Environment::default(),
            programs: ProgramTable::with_builtins(),
            exe_format: ExeFormat::default(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }
}

/// Result of a finished run.
#[derive(Debug)]
pub enum Configured {
    /// `--help` was given; nothing was probed or written.
    Help(String),
    Done(Summary),
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct Summary {
    pub build_dir: PathBuf,
    pub artifacts: Vec<PathBuf>,
    /// Enabled identifiers, sorted
    pub enabled: Vec<String>,
    pub verdicts: Vec<Verdict>,
}

enum Mode {
    Help { lines: Vec<String> },
    Running { probe_dir: TempDir },
}

/// State of one configuration run.
pub struct ResolutionContext {
    mode: Mode,
    shell: Shell,
    log: ConfigLog,
    env: Environment,
    programs: ProgramTable,
    install_paths: InstallPathTable,
    features: FeatureIntents,
    flags: FlagStack,
    registry: DependencyRegistry,
    sources: Vec<String>,
    verdicts: Vec<Verdict>,
    project: String,
    command_line: String,
    root_dir: PathBuf,
    build_dir: PathBuf,
    exe_format: ExeFormat,
}

impl ResolutionContext {
    /// Parse arguments and prepare the run.
    ///
    /// Outside help mode this creates the build directory, removes artifacts
    /// of a previous run, opens `config.log` and creates the private probe
    /// directory.
    pub fn begin(opts: ConfigureOptions, shell: Shell) -> Result<Self> {
        let ConfigureOptions {
            root_dir,
            project,
            args,
            env,
            programs,
            mut install_paths,
            exe_format,
        } = opts;

        let invocation = Invocation::parse(args, &install_paths)?;
        for (name, value) in &invocation.install_paths {
            install_paths.set(name, value);
        }

        let build_dir = match invocation.build_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => root_dir.join(dir),
            None => root_dir.join(DEFAULT_BUILD_DIR),
        };
        let command_line = std::iter::once(env!("CARGO_PKG_NAME").to_string())
            .chain(invocation.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        let (mode, log) = if invocation.help {
            let lines = help::usage_header(&programs, &install_paths);
            (Mode::Help { lines }, ConfigLog::in_memory())
        } else {
            ensure_dir(&build_dir)?;
            for name in ALL_ARTIFACTS {
                if remove_file_if_exists(&build_dir.join(name))? {
                    tracing::debug!("removed stale {}", name);
                }
            }
            let log = ConfigLog::create(&build_dir.join(LOG_FILE))?;
            let probe_dir = tempfile::Builder::new()
                .prefix(PROBE_DIR_PREFIX)
                .tempdir()
                .context("failed to create temporary probe directory")?;
            tracing::debug!("probe directory: {}", probe_dir.path().display());
            (Mode::Running { probe_dir }, log)
        };

        Ok(ResolutionContext {
            mode,
            shell,
            log,
            env,
            programs,
            install_paths,
            features: invocation.features,
            flags: FlagStack::new(),
            registry: DependencyRegistry::new(),
            sources: Vec::new(),
            verdicts: Vec::new(),
            project,
            command_line,
            root_dir,
            build_dir,
            exe_format,
        })
    }

    /// Whether checks actually run (false in help mode).
    pub fn is_running(&self) -> bool {
        matches!(self.mode, Mode::Running { .. })
    }

    fn probe_dir(&self, operation: &'static str) -> Result<&Path, ConfigureError> {
        match &self.mode {
            Mode::Running { probe_dir } => Ok(probe_dir.path()),
            Mode::Help { .. } => Err(ConfigureError::NotRunning { operation }),
        }
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), ConfigureError> {
        self.probe_dir(operation).map(|_| ())
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn shell_mut(&mut self) -> &mut Shell {
        &mut self.shell
    }

    pub fn log(&self) -> &ConfigLog {
        &self.log
    }

    /// Verdicts of the checks evaluated so far, in order.
    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn flags(&self) -> &FlagStack {
        &self.flags
    }

    /// Record a note in `config.log`.
    pub fn note(&mut self, note: impl Into<String>) {
        self.log.note(note);
    }

    pub fn set_exe_format(&mut self, format: ExeFormat) {
        self.exe_format = format;
    }

    pub fn add_cflags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.state_mut().add_cflags(flags);
    }

    pub fn add_ldflags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.state_mut().add_ldflags(flags);
    }

    /// Add a define to the header. Strings are quoted as C literals.
    pub fn add_define(&mut self, name: impl Into<String>, value: DefineValue) {
        self.flags.state_mut().add_define(Define {
            name: name.into(),
            value,
        });
    }

    /// Add a variable to `config.mak`.
    pub fn add_variable(&mut self, variable: Variable) {
        self.flags.state_mut().add_variable(variable);
    }

    /// Add sources to the build. Sources are not rolled back with flags.
    pub fn add_sources<I, S>(&mut self, sources: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
    }

    /// Whether every listed identifier is enabled. Unknown identifiers are
    /// internal errors.
    pub fn dep_enabled<'a, I>(&self, ids: I) -> Result<bool, ConfigureError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.registry.all_enabled(ids)
    }

    /// Add the sources of the first group whose dependency is enabled
    /// (`_` always matches). Every named dependency is validated.
    pub fn pick_first_matching_dep(&mut self, picks: &[SourcePick]) -> Result<bool, ConfigureError> {
        let mut winner = None;
        for pick in picks {
            let matches = pick.dep == PICK_ALWAYS || self.registry.is_enabled(&pick.dep)?;
            if matches && winner.is_none() {
                winner = Some(pick);
            }
        }
        match winner {
            Some(pick) => {
                self.sources.extend(pick.sources.iter().cloned());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run `f` inside a flag transaction: keep its changes on `Ok(true)`,
    /// roll them back otherwise. Errors still propagate.
    pub fn transaction<F>(&mut self, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Self) -> Result<bool>,
    {
        self.flags.push();
        match f(self) {
            Ok(true) => {
                self.flags.pop_merge()?;
                Ok(true)
            }
            Ok(false) => {
                self.flags.pop_discard()?;
                Ok(false)
            }
            Err(err) => {
                self.flags.pop_discard()?;
                Err(err)
            }
        }
    }

    /// The resolved command line of a tool.
    pub fn program(&self, name: &str) -> Result<&str, ConfigureError> {
        if self.programs.default_for(name).is_none() {
            return Err(ConfigureError::UnknownProgram {
                name: name.to_string(),
            });
        }
        self.flags
            .state()
            .programs
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigureError::ProgramNotResolved {
                name: name.to_string(),
            })
    }

    /// Resolve a tool and record it in the program table and `config.mak`.
    ///
    /// Returns false when the command cannot be started. A tool is resolved
    /// at most once per run; later calls reuse the recorded command.
    pub fn check_program(&mut self, name: &str) -> Result<bool> {
        self.ensure_running("check_program")?;
        if let Some(value) = self.flags.state().programs.get(name) {
            tracing::debug!("{} already resolved as {}", name, value);
            return Ok(true);
        }
        let mut value = self.programs.candidate(name, &self.env)?;

        match ccache_decision(name, &value, &self.env) {
            CcacheDecision::Try => {
                let [ccache, version] = ccache_probe_command();
                let probe = ProcessBuilder::new(ccache).arg(version);
                match run_logged(&mut self.log, &probe)? {
                    ProcessOutcome::Success { .. } => {
                        value = wrap_ccache(&value);
                        self.log.note("ccache detected, enabling automatic caching");
                    }
                    _ => self.log.note("ccache not found, proceeding without caching"),
                }
            }
            CcacheDecision::DisabledByEnv => {
                self.log.note("ccache explicitly disabled via CCACHE")
            }
            CcacheDecision::AlreadyPresent => {
                self.log.note("ccache already present in CC, not adding again")
            }
            CcacheDecision::NotCompiler => {}
        }

        self.shell.aside(&value);
        self.log
            .note(format!("Trying '{}' for '{}'...", value, name));

        let Ok(cmd) = ProcessBuilder::from_command_line(&value) else {
            self.log.note(format!("empty command for '{}'", name));
            return Ok(false);
        };
        if !run_logged(&mut self.log, &cmd)?.started() {
            return Ok(false);
        }

        tracing::debug!("{} = {}", name, value);
        let state = self.flags.state_mut();
        state.programs.insert(name.to_string(), value.clone());
        state.add_variable(Variable::text(name, value));
        Ok(true)
    }

    /// Compile (and optionally link) a synthesized test program.
    ///
    /// On success the probe's `flags` are appended to CFLAGS and its `link`
    /// entries to LDFLAGS.
    pub fn check_cc(&mut self, probe: &CompileProbe) -> Result<bool> {
        let dir = self.probe_dir("check_cc")?.to_path_buf();
        let cc = self.program("CC")?.to_string();

        let source = probe.source();
        let source_path = dir.join(TEST_SOURCE);
        write_string(&source_path, &source)?;
        self.log.append(LogEntry::TestSource {
            path: source_path,
            contents: source,
        });

        let state = self.flags.state();
        let cmd = probe.command(&cc, &state.cflags, &state.ldflags, &dir)?;
        if !run_logged(&mut self.log, &cmd)?.succeeded() {
            return Ok(false);
        }

        self.add_cflags(probe.flags.iter().cloned());
        if let Some(libs) = &probe.link {
            self.add_ldflags(libs.iter().cloned());
        }
        Ok(true)
    }

    /// Query pkg-config for `--cflags` and `--libs` and append both.
    pub fn check_pkg_config<I, S>(&mut self, args: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_running("check_pkg_config")?;
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let pkg_config = self.program("PKG_CONFIG")?.to_string();

        let mut results = Vec::with_capacity(2);
        for query in ["--cflags", "--libs"] {
            let cmd = ProcessBuilder::from_command_line(&pkg_config)?
                .arg(query)
                .args(&args);
            match run_logged(&mut self.log, &cmd)?.into_stdout() {
                Some(out) => results.push(split_flags(&out)),
                None => return Ok(false),
            }
        }

        let mut results = results.into_iter();
        self.add_cflags(results.next().unwrap_or_default());
        self.add_ldflags(results.next().unwrap_or_default());
        Ok(true)
    }

    /// Value of a pkg-config variable, trimmed; `None` if the query fails.
    pub fn pkg_config_variable(&mut self, package: &str, variable: &str) -> Result<Option<String>> {
        self.ensure_running("pkg_config_variable")?;
        let pkg_config = self.program("PKG_CONFIG")?.to_string();
        let cmd = ProcessBuilder::from_command_line(&pkg_config)?
            .arg(format!("--variable={}", variable))
            .arg(package);
        Ok(run_logged(&mut self.log, &cmd)?
            .into_stdout()
            .map(|out| out.trim().to_string()))
    }

    /// Look for a binary in PATH without executing it.
    pub fn check_binary_exists(&mut self, name: &str) -> Result<bool, ConfigureError> {
        self.ensure_running("check_binary_exists")?;
        self.log
            .note(format!("Checking for binary '{}' in PATH...", name));
        match find_executable(name) {
            Some(path) => {
                self.log
                    .note(format!("Found '{}' at '{}'", name, path.display()));
                Ok(true)
            }
            None => {
                self.log.note(format!("Binary '{}' not found in PATH", name));
                Ok(false)
            }
        }
    }

    /// Evaluate one check.
    ///
    /// In help mode the check is only described. A disabled hard-required
    /// check is a fatal [`ConfigureError::RequiredFeature`].
    pub fn check(&mut self, desc: CheckDescriptor) -> Result<Verdict> {
        let identifier = desc.identifier().map(str::to_string);

        if let Mode::Help { lines } = &mut self.mode {
            lines.extend(desc.help_line());
            let verdict = Verdict {
                identifier,
                outcome: Outcome::ProbeSkipped,
                hard_required: false,
            };
            self.verdicts.push(verdict.clone());
            return Ok(verdict);
        }

        if let Some(id) = &identifier {
            if self.registry.contains(id) {
                return Err(ConfigureError::DuplicateCheck { name: id.clone() }.into());
            }
        }

        self.log.append(LogEntry::Test {
            name: identifier.clone(),
        });
        if let Some(text) = desc.display_desc() {
            self.shell.checking(text);
        }

        let mut hard_required = matches!(desc.policy, DefaultPolicy::Required { .. });
        let mut enabled = !matches!(desc.policy, DefaultPolicy::SoftDisable);
        let mut by_option = false;

        if let Some(option) = desc.option_name() {
            match self.features.take(option) {
                Intent::Enabled => {
                    enabled = true;
                    hard_required = true;
                }
                Intent::Disabled => {
                    enabled = false;
                    hard_required = false;
                    by_option = true;
                }
                Intent::Auto => enabled = true,
                Intent::Unset => {}
            }
        }

        let outcome = self.gate(&desc, enabled, by_option)?;
        let outcome = match (outcome, desc.probe.as_ref()) {
            (Outcome::Enabled, Some(probe)) => {
                if self.transaction(|cx| Probe::run(&**probe, cx))? {
                    Outcome::Enabled
                } else {
                    Outcome::ProbeFailed
                }
            }
            (outcome, _) => outcome,
        };
        let enabled = outcome.is_enabled();

        if let Some(id) = &identifier {
            self.registry.record(id, enabled)?;
        }
        if let Some(define) = desc.define_name() {
            self.add_define(define, DefineValue::Int(i64::from(enabled)));
        }
        if enabled {
            self.add_sources(desc.sources.iter().cloned());
            self.pick_first_matching_dep(&desc.pick)?;
        }

        self.shell.outcome(&outcome);
        self.log.append(LogEntry::Outcome {
            name: identifier.clone(),
            outcome: outcome.to_string(),
            enabled,
        });
        tracing::debug!(
            "check {}: {}",
            identifier.as_deref().unwrap_or("(unnamed)"),
            outcome
        );

        let message = match &desc.policy {
            DefaultPolicy::Required { message } => message.clone(),
            _ => None,
        };
        if !enabled {
            if let Some(message) = &message {
                self.shell.warn(message);
            }
        }

        let verdict = Verdict {
            identifier,
            outcome,
            hard_required,
        };
        self.verdicts.push(verdict.clone());

        if hard_required && !enabled {
            return Err(ConfigureError::RequiredFeature {
                check: desc
                    .display_desc()
                    .unwrap_or("(unnamed)")
                    .to_string(),
                outcome: verdict.outcome.to_string(),
                message,
            }
            .into());
        }
        Ok(verdict)
    }

    /// Dependency gate: validate every referenced identifier, then apply
    /// none-of, any-of and all-of in that order.
    fn gate(
        &self,
        desc: &CheckDescriptor,
        enabled: bool,
        by_option: bool,
    ) -> Result<Outcome, ConfigureError> {
        for dep in desc.referenced_deps() {
            self.registry.is_enabled(dep)?;
        }

        if !enabled {
            return Ok(if by_option {
                Outcome::DisabledByOption
            } else {
                Outcome::DisabledByDefault
            });
        }

        for dep in &desc.deps_neg {
            if self.registry.is_enabled(dep)? {
                return Ok(Outcome::Conflict(dep.clone()));
            }
        }

        if !desc.deps_any.is_empty() {
            let mut any = false;
            for dep in &desc.deps_any {
                any |= self.registry.is_enabled(dep)?;
            }
            if !any {
                return Ok(Outcome::MissingAny(desc.deps_any.clone()));
            }
        }

        for dep in &desc.deps {
            if !self.registry.is_enabled(dep)? {
                return Ok(Outcome::MissingAll(dep.clone()));
            }
        }

        Ok(Outcome::Enabled)
    }

    /// Evaluate checks in order, stopping at the first fatal error.
    pub fn run_checks<I>(&mut self, checks: I) -> Result<()>
    where
        I: IntoIterator<Item = CheckDescriptor>,
    {
        for check in checks {
            if let Err(err) = self.check(check) {
                return Err(self.stop(err));
            }
        }
        Ok(())
    }

    fn stop(&mut self, err: anyhow::Error) -> anyhow::Error {
        self.log.append(LogEntry::Stopping {
            message: format!("{:#}", err),
        });
        err
    }

    /// Report unconsumed intents, then render and write the artifacts.
    pub fn finish(mut self) -> Result<Configured> {
        if let Mode::Help { lines } = &self.mode {
            return Ok(Configured::Help(help::render(lines)));
        }
        match self.write_artifacts() {
            Ok(summary) => Ok(Configured::Done(summary)),
            Err(err) => Err(self.stop(err)),
        }
    }

    fn write_artifacts(&mut self) -> Result<Summary> {
        let mut forced = Vec::new();
        let unknown: Vec<(String, Intent)> = self
            .features
            .unconsumed()
            .map(|(name, intent)| (name.to_string(), intent))
            .collect();
        for (name, intent) in unknown {
            self.shell
                .warn(format!("Unknown feature set on command line: {}", name));
            if intent == Intent::Enabled {
                forced.push(name);
            }
        }
        if !forced.is_empty() {
            return Err(ConfigureError::UnknownFeatureForced { features: forced }.into());
        }

        let state = std::mem::take(&mut self.flags).into_state()?;
        let enabled: Vec<&str> = self.registry.enabled().collect();
        let cfg = ResolvedConfig {
            project: &self.project,
            command_line: &self.command_line,
            state: &state,
            enabled: &enabled,
            sources: &self.sources,
            install_paths: &self.install_paths,
            build_dir: &self.build_dir,
            root_dir: &self.root_dir,
            exe_format: self.exe_format,
            env: &self.env,
        };
        let artifacts = ArtifactSet::build(&cfg)?;
        let enabled: Vec<String> = enabled.into_iter().map(str::to_string).collect();

        for name in &artifacts.unresolved {
            let msg = format!("install path {} did not resolve completely", name);
            tracing::warn!("{}", msg);
            self.log.note(msg.clone());
            self.shell.warn(msg);
        }

        let written = artifacts.write(&self.build_dir)?;
        for path in &written {
            self.shell.note(format!("Wrote {}", path.display()));
        }
        self.log.append(LogEntry::Finished);
        self.shell.status(format!(
            "Done. You can run 'ninja -C {}' now.",
            self.build_dir.display()
        ));

        Ok(Summary {
            build_dir: self.build_dir.clone(),
            artifacts: written,
            enabled,
            verdicts: self.verdicts.clone(),
        })
    }
}

/// Run a full configuration: begin, evaluate `checks` in order, finish.
pub fn configure<I>(opts: ConfigureOptions, shell: Shell, checks: I) -> Result<Configured>
where
    I: IntoIterator<Item = CheckDescriptor>,
{
    let mut cx = ResolutionContext::begin(opts, shell)?;
    cx.run_checks(checks)?;
    cx.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;

    use crate::util::shell::Verbosity;

    fn options(root: &Path, args: &[&str]) -> ConfigureOptions {
        ConfigureOptions::new(root, "demo")
            .args(args.iter().copied())
            .env(Environment::from_pairs([
                ("CC", "true"),
                ("CCACHE", "no"),
                ("PKG_CONFIG", "false"),
            ]))
    }

    fn context(root: &Path, args: &[&str]) -> ResolutionContext {
        ResolutionContext::begin(options(root, args), Shell::buffered(Verbosity::Normal)).unwrap()
    }

    fn counting_probe(result: bool) -> (Rc<Cell<u32>>, impl Fn(&mut ResolutionContext) -> Result<bool>) {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let probe = move |cx: &mut ResolutionContext| -> Result<bool> {
            seen.set(seen.get() + 1);
            cx.add_cflags(["-DPROBED"]);
            Ok(result)
        };
        (calls, probe)
    }

    fn read(path: PathBuf) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_enabled_check_with_define() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        let (calls, probe) = counting_probe(true);

        let verdict = cx.check(CheckDescriptor::new("-zlib*").probe(probe)).unwrap();
        assert!(verdict.enabled());
        assert_eq!(calls.get(), 1);
        assert_eq!(cx.flags().state().cflags, ["-DPROBED"]);

        let Configured::Done(summary) = cx.finish().unwrap() else {
            panic!("expected a configured run");
        };
        assert_eq!(summary.enabled, ["zlib"]);
        let header = read(summary.build_dir.join("config.h"));
        assert!(header.contains("#define HAVE_ZLIB 1\n"));
    }

    #[test]
    fn test_disable_option_skips_probe() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &["--disable-zlib"]);
        let (calls, probe) = counting_probe(true);

        let verdict = cx.check(CheckDescriptor::new("-zlib*").probe(probe)).unwrap();
        assert_eq!(verdict.outcome, Outcome::DisabledByOption);
        assert_eq!(calls.get(), 0);

        let Configured::Done(summary) = cx.finish().unwrap() else {
            panic!("expected a configured run");
        };
        let header = read(summary.build_dir.join("config.h"));
        assert!(header.contains("#define HAVE_ZLIB 0\n"));
    }

    #[test]
    fn test_missing_all_without_probe() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        let (calls, probe) = counting_probe(true);

        let a = cx.check(CheckDescriptor::new("a").disabled_by_default()).unwrap();
        assert_eq!(a.outcome, Outcome::DisabledByDefault);

        let b = cx
            .check(CheckDescriptor::new("b").deps(["a"]).probe(probe))
            .unwrap();
        assert_eq!(b.outcome, Outcome::MissingAll("a".into()));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_conflict_short_circuits() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        let (calls, probe) = counting_probe(true);

        cx.check(CheckDescriptor::new("gles")).unwrap();
        let gl = cx
            .check(CheckDescriptor::new("gl").deps_neg(["gles"]).probe(probe))
            .unwrap();
        assert_eq!(gl.outcome, Outcome::Conflict("gles".into()));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_any_of() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        cx.check(CheckDescriptor::new("x11").disabled_by_default()).unwrap();
        cx.check(CheckDescriptor::new("wayland").disabled_by_default()).unwrap();
        let vo = cx
            .check(CheckDescriptor::new("vo").deps_any(["x11", "wayland"]))
            .unwrap();
        assert_eq!(
            vo.outcome,
            Outcome::MissingAny(vec!["x11".into(), "wayland".into()])
        );

        cx.check(CheckDescriptor::new("drm")).unwrap();
        let kms = cx
            .check(CheckDescriptor::new("kms").deps_any(["x11", "drm"]))
            .unwrap();
        assert!(kms.enabled());
    }

    #[test]
    fn test_unknown_dependency_even_when_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        let err = cx
            .check(CheckDescriptor::new("x").disabled_by_default().deps(["nope"]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigureError>(),
            Some(ConfigureError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_duplicate_check() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        cx.check(CheckDescriptor::new("libm")).unwrap();
        let err = cx.check(CheckDescriptor::new("libm")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigureError>(),
            Some(ConfigureError::DuplicateCheck { .. })
        ));
    }

    #[test]
    fn test_failed_probe_rolls_back() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        cx.add_cflags(["-O2"]);
        let before = cx.flags().state().clone();

        let verdict = cx
            .check(CheckDescriptor::new("-lua*").probe(|cx| {
                cx.add_cflags(["-I/usr/include/lua"]);
                cx.add_ldflags(["-llua"]);
                cx.add_variable(Variable::raw("LUA", "5.4"));
                cx.add_define("LUA_API_LEVEL", DefineValue::Int(4));
                Ok(false)
            }))
            .unwrap();

        assert_eq!(verdict.outcome, Outcome::ProbeFailed);
        let mut expected = before;
        expected.add_define(Define::int("HAVE_LUA", 0));
        assert_eq!(cx.flags().state(), &expected);
    }

    #[test]
    fn test_probe_error_discards_and_propagates() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        let err = cx
            .check(CheckDescriptor::new("broken").probe(|cx| {
                cx.add_cflags(["-DBROKEN"]);
                Err(ConfigureError::UnknownProgram {
                    name: "FOO".into(),
                }
                .into())
            }))
            .unwrap_err();
        assert!(err.downcast_ref::<ConfigureError>().is_some());
        assert!(cx.flags().state().cflags.is_empty());
        assert_eq!(cx.flags().depth(), 0);
    }

    #[test]
    fn test_required_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        let err = cx
            .check(
                CheckDescriptor::new("c")
                    .required("C is needed")
                    .probe(|_| Ok(false)),
            )
            .unwrap_err();
        match err.downcast_ref::<ConfigureError>() {
            Some(ConfigureError::RequiredFeature { outcome, message, .. }) => {
                assert_eq!(outcome, "no");
                assert_eq!(message.as_deref(), Some("C is needed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_disabling_required_check_only_warns() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &["--disable-libc"]);

        let verdict = cx
            .check(CheckDescriptor::new("-libc").required("libc is needed"))
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::DisabledByOption);
        assert!(!verdict.hard_required);
        assert!(cx.shell_mut().captured().contains("Warning: libc is needed"));
    }

    #[test]
    fn test_enable_option_makes_failure_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &["--enable-lua"]);

        let err = cx
            .check(CheckDescriptor::new("-lua").disabled_by_default().probe(|_| Ok(false)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigureError>(),
            Some(ConfigureError::RequiredFeature { .. })
        ));
    }

    #[test]
    fn test_auto_enables_soft_disabled_check() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &["--with-debug=auto"]);

        let verdict = cx
            .check(CheckDescriptor::new("-debug").disabled_by_default().probe(|_| Ok(false)))
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::ProbeFailed);
        assert!(!verdict.hard_required);
    }

    #[test]
    fn test_sources_and_pick() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        cx.check(CheckDescriptor::new("x11").disabled_by_default()).unwrap();
        cx.check(
            CheckDescriptor::new("vo")
                .sources(["video/out.c"])
                .pick("x11", ["video/x11.c"])
                .pick(PICK_ALWAYS, ["video/null.c"]),
        )
        .unwrap();
        cx.check(
            CheckDescriptor::new("off")
                .disabled_by_default()
                .sources(["off.c"]),
        )
        .unwrap();

        assert_eq!(cx.sources(), ["video/out.c", "video/null.c"]);
    }

    #[test]
    fn test_pick_validates_every_dependency() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        let picks = vec![
            SourcePick {
                dep: PICK_ALWAYS.into(),
                sources: vec!["a.c".into()],
            },
            SourcePick {
                dep: "missing".into(),
                sources: vec!["b.c".into()],
            },
        ];
        assert!(cx.pick_first_matching_dep(&picks).is_err());
    }

    #[test]
    fn test_unknown_forced_feature_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let cx = context(tmp.path(), &["--enable-nope"]);
        let err = cx.finish().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigureError>(),
            Some(ConfigureError::UnknownFeatureForced { .. })
        ));
        assert!(!tmp.path().join("build/config.h").exists());
        assert!(read(tmp.path().join("build/config.log")).contains("--- Stopping due to error"));
    }

    #[test]
    fn test_unknown_disabled_feature_only_warns() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &["--disable-nope"]);
        cx.check(CheckDescriptor::new("libm")).unwrap();
        assert!(matches!(cx.finish().unwrap(), Configured::Done(_)));
    }

    #[test]
    fn test_stale_artifacts_removed_at_start() {
        let tmp = TempDir::new().unwrap();
        let build = tmp.path().join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("config.h"), "stale").unwrap();
        fs::write(build.join("keep.txt"), "mine").unwrap();

        let _cx = context(tmp.path(), &[]);
        assert!(!build.join("config.h").exists());
        assert!(build.join("keep.txt").exists());
        assert!(build.join("config.log").exists());
    }

    #[test]
    fn test_builddir_and_prefix_arguments() {
        let tmp = TempDir::new().unwrap();
        let cx = context(tmp.path(), &["--builddir=out", "--prefix=/opt/demo"]);
        assert_eq!(cx.build_dir(), tmp.path().join("out"));

        let Configured::Done(summary) = cx.finish().unwrap() else {
            panic!("expected a configured run");
        };
        let header = read(summary.build_dir.join("config.h"));
        assert!(header.contains("#define DEMO_CONFDIR \"/opt/demo/etc\"\n"));
        assert!(header.contains("#define CONFIGURATION \"autoprobe --builddir=out --prefix=/opt/demo\"\n"));
    }

    #[test]
    fn test_help_mode_describes_checks() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &["--help"]);
        assert!(!cx.is_running());
        let (calls, probe) = counting_probe(true);

        let verdict = cx
            .check(CheckDescriptor::new("-zlib*").desc("zlib").probe(probe))
            .unwrap();
        assert_eq!(verdict.outcome, Outcome::ProbeSkipped);
        assert_eq!(calls.get(), 0);
        assert!(cx.check_program("CC").is_err());

        let Configured::Help(text) = cx.finish().unwrap() else {
            panic!("expected help output");
        };
        assert!(text.contains("--disable-zlib"));
        assert!(text.ends_with("[autodetect]\n"));
        assert!(!tmp.path().join("build").exists());
    }

    #[test]
    fn test_check_program_records_variable() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        assert!(matches!(
            cx.program("CC"),
            Err(ConfigureError::ProgramNotResolved { .. })
        ));
        assert!(cx.check_program("CC").unwrap());
        assert_eq!(cx.program("CC").unwrap(), "true");
        assert!(cx
            .flags()
            .state()
            .variables
            .contains(&Variable::text("CC", "true")));
        assert!(matches!(
            cx.program("FORTRAN"),
            Err(ConfigureError::UnknownProgram { .. })
        ));
    }

    #[test]
    fn test_check_program_spawn_failure() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path(), &[]).env(Environment::from_pairs([(
            "GIT",
            "autoprobe-no-such-git",
        )]));
        let mut cx = ResolutionContext::begin(opts, Shell::buffered(Verbosity::Quiet)).unwrap();

        assert!(!cx.check_program("GIT").unwrap());
        assert!(cx
            .log()
            .entries()
            .iter()
            .any(|e| matches!(e, LogEntry::SpawnFailed { .. })));
    }

    #[test]
    fn test_check_program_resolves_once() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);

        assert!(cx.check_program("CC").unwrap());
        assert!(cx.check_program("CC").unwrap());

        let cc_vars = cx
            .flags()
            .state()
            .variables
            .iter()
            .filter(|v| **v == Variable::text("CC", "true"))
            .count();
        assert_eq!(cc_vars, 1);
        let spawns = cx
            .log()
            .entries()
            .iter()
            .filter(|e| matches!(e, LogEntry::Command { .. }))
            .count();
        assert_eq!(spawns, 1);
    }

    #[test]
    fn test_shared_program_written_once() {
        let tmp = TempDir::new().unwrap();
        let checks = vec![
            CheckDescriptor::new("cc").probe(|cx| cx.check_program("CC")),
            CheckDescriptor::new("cc-again").probe(|cx| cx.check_program("CC")),
        ];
        let result = configure(
            options(tmp.path(), &[]),
            Shell::buffered(Verbosity::Quiet),
            checks,
        )
        .unwrap();

        let Configured::Done(summary) = result else {
            panic!("expected a configured run");
        };
        let mak = read(summary.build_dir.join("config.mak"));
        assert_eq!(mak.matches("CC = true\n").count(), 1);
    }

    #[test]
    fn test_check_cc_with_fake_compiler() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        cx.check_program("CC").unwrap();

        let probe = CompileProbe::new()
            .include("stdio.h")
            .flags(["-DX"])
            .link(["-lm"]);
        assert!(cx.check_cc(&probe).unwrap());
        assert_eq!(cx.flags().state().cflags, ["-DX"]);
        assert_eq!(cx.flags().state().ldflags, ["-lm"]);
        assert!(cx
            .log()
            .entries()
            .iter()
            .any(|e| matches!(e, LogEntry::TestSource { .. })));
    }

    #[test]
    fn test_check_pkg_config_failure() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        cx.check_program("PKG_CONFIG").unwrap();

        assert!(!cx.check_pkg_config(["zlib"]).unwrap());
        assert_eq!(cx.pkg_config_variable("zlib", "prefix").unwrap(), None);
        assert!(cx.flags().state().cflags.is_empty());
    }

    #[test]
    fn test_check_pkg_config_appends_flags() {
        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("fake-pkg-config");
        fs::write(
            &script,
            "case \"$1\" in\n\
             --cflags) echo '-I/opt/z/include' ;;\n\
             --libs) echo '-L/opt/z/lib -lz' ;;\n\
             --variable=prefix) echo ' /opt/z ' ;;\n\
             esac\n",
        )
        .unwrap();

        let opts = ConfigureOptions::new(tmp.path(), "demo").env(Environment::from_pairs([
            ("PKG_CONFIG", format!("sh {}", script.display())),
            ("CCACHE", "no".to_string()),
        ]));
        let mut cx = ResolutionContext::begin(opts, Shell::buffered(Verbosity::Quiet)).unwrap();
        cx.check_program("PKG_CONFIG").unwrap();

        assert!(cx.check_pkg_config(["zlib"]).unwrap());
        assert_eq!(cx.flags().state().cflags, ["-I/opt/z/include"]);
        assert_eq!(cx.flags().state().ldflags, ["-L/opt/z/lib", "-lz"]);
        assert_eq!(
            cx.pkg_config_variable("zlib", "prefix").unwrap().as_deref(),
            Some("/opt/z")
        );
    }

    #[test]
    fn test_binary_exists() {
        let tmp = TempDir::new().unwrap();
        let mut cx = context(tmp.path(), &[]);
        assert!(cx.check_binary_exists("sh").unwrap());
        assert!(!cx.check_binary_exists("autoprobe-no-such-binary").unwrap());
    }

    #[test]
    fn test_configure_runs_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let checks = vec![
            CheckDescriptor::new("-zlib*").probe(|_| Ok(true)),
            CheckDescriptor::new("-gl-x11").sources(["video/gl_x11.c"]),
        ];
        let result = configure(
            options(tmp.path(), &[]),
            Shell::buffered(Verbosity::Normal),
            checks,
        )
        .unwrap();

        let Configured::Done(summary) = result else {
            panic!("expected a configured run");
        };
        assert_eq!(summary.artifacts.len(), 3);
        assert_eq!(summary.enabled, ["gl-x11", "zlib"]);

        let mak = read(summary.build_dir.join("config.mak"));
        assert!(mak.contains("   $(ROOT)/video/gl_x11.c \\\n"));
        let log = read(summary.build_dir.join("config.log"));
        assert!(log.contains("--- Finishing successfully."));
    }

    #[test]
    fn test_configure_required_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let checks = vec![CheckDescriptor::new("c").required("need c").probe(|_| Ok(false))];
        let err = configure(
            options(tmp.path(), &[]),
            Shell::buffered(Verbosity::Quiet),
            checks,
        )
        .unwrap_err();

        assert!(err.downcast_ref::<ConfigureError>().is_some());
        for name in ["config.h", "config.mak", "build.ninja"] {
            assert!(!tmp.path().join("build").join(name).exists());
        }
    }
}
